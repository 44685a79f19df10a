use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// One indexed audio file. `path` is unique within a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    /// Zero when the tags could not be read.
    pub duration: Duration,
    /// When the file landed in the library (its modification time).
    pub added_at: DateTime<Utc>,
    pub display: String,
}

impl Track {
    pub fn has_known_duration(&self) -> bool {
        !self.duration.is_zero()
    }
}
