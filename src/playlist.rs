//! Named playlists saved as one TOML file each.
//!
//! A playlist is an ordered list of library paths. Loading one resolves the
//! paths against the current library; files that are gone are skipped.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Longest accepted playlist name, in characters.
pub const MAX_NAME_LEN: usize = 100;

const EXTENSION: &str = "toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<PathBuf>,
}

/// Directory of `<name>.toml` playlist files.
#[derive(Debug, Clone)]
pub struct PlaylistStore {
    dir: PathBuf,
}

impl PlaylistStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of every saved playlist, sorted case-insensitively. A missing
    /// directory means there are none yet.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == EXTENSION))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|name| validate_name(name).is_ok())
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok_and(|name| self.path_for(name).is_file())
    }

    /// Write `tracks` as playlist `name`, replacing any playlist of that name.
    pub fn save(&self, name: &str, tracks: &[PathBuf]) -> Result<Playlist> {
        let playlist = Playlist {
            name: validate_name(name)?.to_string(),
            tracks: tracks.to_vec(),
        };
        self.write(&playlist)?;
        info!(playlist = %playlist.name, tracks = playlist.tracks.len(), "playlist saved");
        Ok(playlist)
    }

    pub fn load(&self, name: &str) -> Result<Playlist> {
        let name = validate_name(name)?;
        let path = self.path_for(name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::UnknownPlaylist(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut playlist: Playlist = toml::from_str(&text).map_err(|e| Error::CorruptPlaylist {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        // The file name is authoritative.
        playlist.name = name.to_string();
        Ok(playlist)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => {
                info!(playlist = name, "playlist deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::UnknownPlaylist(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `track` to playlist `name`, creating the playlist when needed.
    /// Returns `false` when the track was already in it.
    pub fn add_track(&self, name: &str, track: &Path) -> Result<bool> {
        let mut playlist = match self.load(name) {
            Ok(p) => p,
            Err(Error::UnknownPlaylist(_)) => Playlist {
                name: validate_name(name)?.to_string(),
                tracks: Vec::new(),
            },
            Err(e) => return Err(e),
        };
        if playlist.tracks.iter().any(|t| t == track) {
            return Ok(false);
        }
        playlist.tracks.push(track.to_path_buf());
        self.write(&playlist)?;
        debug!(playlist = %playlist.name, track = %track.display(), "track added to playlist");
        Ok(true)
    }

    /// Drop `track` from playlist `name`. Returns `false` when it was not there.
    pub fn remove_track(&self, name: &str, track: &Path) -> Result<bool> {
        let mut playlist = self.load(name)?;
        let before = playlist.tracks.len();
        playlist.tracks.retain(|t| t != track);
        if playlist.tracks.len() == before {
            return Ok(false);
        }
        self.write(&playlist)?;
        debug!(playlist = %playlist.name, track = %track.display(), "track removed from playlist");
        Ok(true)
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    /// Replace the playlist file in one rename so a crash never leaves half
    /// a file behind.
    fn write(&self, playlist: &Playlist) -> Result<()> {
        let path = self.path_for(&playlist.name);
        let text = toml::to_string_pretty(playlist).map_err(|e| Error::CorruptPlaylist {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Trimmed `name` when it can be used as a file stem.
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let ok = !trimmed.is_empty()
        && trimmed.chars().count() <= MAX_NAME_LEN
        && !trimmed.starts_with('.')
        && !trimmed.chars().any(|c| c == '/' || c == '\\' || c.is_control());
    if ok {
        Ok(trimmed)
    } else {
        Err(Error::InvalidPlaylistName(name.to_string()))
    }
}
