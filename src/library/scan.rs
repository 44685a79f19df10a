use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::{Error, Result};

use super::display::render_fields;
use super::model::Track;
use super::tags::{LoftyReader, TagReader, fallback_tags, split_artist_title};

pub(super) fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

/// Name prefix of the directories downloads are staged in under the library
/// root. Never indexed, even with `include_hidden`.
pub const STAGING_PREFIX: &str = ".cadence-download-";

pub fn is_staging_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with(STAGING_PREFIX))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Modification time of `path`, used as the track's `added_at`.
pub(super) fn modified_at(path: &Path) -> DateTime<Utc> {
    let mtime = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    DateTime::<Utc>::from(mtime)
}

/// Scan `dir` for audio files using the `lofty` tag reader.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Result<Vec<Track>> {
    scan_with(dir, settings, &LoftyReader)
}

/// Scan `dir` for audio files, reading tags through `reader`.
///
/// Unreadable tags never abort the scan; the file is indexed with fallback
/// metadata instead. The result is deduplicated by path and sorted by the
/// case-insensitive display string.
pub fn scan_with(
    dir: &Path,
    settings: &LibrarySettings,
    reader: &dyn TagReader,
) -> Result<Vec<Track>> {
    let mut tracks: Vec<Track> = collect_audio_paths(dir, settings)?
        .iter()
        .map(|path| read_track(path, settings, reader))
        .collect();

    sort_tracks(&mut tracks);
    debug!(dir = %dir.display(), count = tracks.len(), "scan finished");
    Ok(tracks)
}

/// Walk `dir` according to `settings` and return every audio file once.
pub(super) fn collect_audio_paths(dir: &Path, settings: &LibrarySettings) -> Result<Vec<PathBuf>> {
    if fs::read_dir(dir).is_err() {
        return Err(Error::MissingDirectory(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    for entry in walker
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || (!is_staging_dir(e.path()) && (settings.include_hidden || !is_hidden(e.path())))
        })
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                None
            }
        })
    {
        let path = entry.path();
        if path.is_file() && is_audio_file(path, settings) && seen.insert(path.to_path_buf()) {
            paths.push(path.to_path_buf());
        }
    }

    Ok(paths)
}

/// Build a `Track` for one file, degrading to fallback metadata on tag errors.
pub(super) fn read_track(path: &Path, settings: &LibrarySettings, reader: &dyn TagReader) -> Track {
    let info = match reader.read(path) {
        Ok(info) => info,
        Err(err) => {
            warn!(error = %err, "using fallback metadata");
            fallback_tags(path)
        }
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    let guess = split_artist_title(&stem);

    let title = info
        .title
        .or_else(|| guess.map(|(_, t)| t.to_string()))
        .unwrap_or_else(|| stem.clone());
    let artist = info.artist.or_else(|| {
        // Only trust the filename when the title also came from it.
        guess
            .filter(|(_, t)| *t == title)
            .map(|(a, _)| a.to_string())
    });

    let mut track = Track {
        path: path.to_path_buf(),
        title,
        artist,
        album: info.album,
        genre: info.genre,
        duration: info.duration,
        added_at: modified_at(path),
        display: String::new(),
    };
    track.display = render_fields(&track, &settings.display_fields, &settings.display_separator);
    track
}

pub(super) fn sort_tracks(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| {
        a.display
            .to_lowercase()
            .cmp(&b.display.to_lowercase())
            .then_with(|| a.path.cmp(&b.path))
    });
}
