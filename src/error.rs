//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("library directory {} is missing or unreadable", .0.display())]
    MissingDirectory(PathBuf),

    #[error("index {index} is out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("the queue is empty, nothing to play")]
    EmptyQueue,

    #[error("playback of {} failed: {reason}", path.display())]
    PlaybackFailed { path: PathBuf, reason: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("cannot read tags from {}: {reason}", path.display())]
    UnreadableTags { path: PathBuf, reason: String },

    #[error("download URL is empty")]
    EmptyUrl,

    #[error("{} is not in the library", .0.display())]
    UnknownTrack(PathBuf),

    #[error("no download job #{0}")]
    UnknownJob(u64),

    #[error("no playlist named {0:?}")]
    UnknownPlaylist(String),

    #[error("invalid playlist name {0:?}")]
    InvalidPlaylistName(String),

    #[error("playlist file {} is unreadable: {reason}", path.display())]
    CorruptPlaylist { path: PathBuf, reason: String },

    #[error("no extractor available: {0}")]
    ExtractorNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ::config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
