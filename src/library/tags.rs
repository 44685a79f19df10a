//! Tag reading for library files.
//!
//! `TagReader` is the seam between the scanner and the tagging library.
//! Production code uses `LoftyReader`; tests substitute their own reader.

use std::path::Path;
use std::time::Duration;

use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};

use crate::error::{Error, Result};

/// Metadata extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration: Duration,
}

pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<TagInfo>;
}

/// `TagReader` backed by `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyReader;

impl TagReader for LoftyReader {
    fn read(&self, path: &Path) -> Result<TagInfo> {
        let tagged = lofty::read_from_path(path).map_err(|e| Error::UnreadableTags {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut info = TagInfo {
            duration: tagged.properties().duration(),
            ..TagInfo::default()
        };

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            info.title = non_blank(tag.title().as_deref());
            info.artist = non_blank(tag.artist().as_deref());
            info.album = non_blank(tag.album().as_deref());
            info.genre = non_blank(tag.genre().as_deref());
        }

        Ok(info)
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Split a filename stem shaped like `Artist - Title`.
///
/// Downloaded files are named this way, so it is the best guess for files
/// whose tags are present but blank.
pub fn split_artist_title(stem: &str) -> Option<(&str, &str)> {
    let (artist, title) = stem.split_once(" - ")?;
    let (artist, title) = (artist.trim(), title.trim());
    if artist.is_empty() || title.is_empty() {
        None
    } else {
        Some((artist, title))
    }
}

/// Metadata used when tags cannot be read: the file stem as title, zero duration.
pub fn fallback_tags(path: &Path) -> TagInfo {
    TagInfo {
        title: path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string),
        ..TagInfo::default()
    }
}
