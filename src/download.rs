//! Fetching remote audio into the library.

mod extractor;
mod filename;
mod job;
mod manager;

pub use extractor::{
    CancelFlag, Extractor, FetchProgress, FetchRequest, MissingExtractor, YtDlp, parse_line, parse_progress,
};
pub use filename::{library_stem, normalize_title, sanitize, truncate, unique_destination};
pub use job::{DownloadJob, JobId, JobStatus};
pub use manager::DownloadManager;

#[cfg(test)]
mod tests;
