use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

use super::extractor::{CancelFlag, FetchProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "done",
            Self::Failed => "failed",
        }
    }
}

/// One download request and what became of it.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: JobId,
    pub url: String,
    /// Filename the user asked for, before sanitising.
    pub filename: Option<String>,
    /// Every entry of a playlist URL rather than a single video.
    pub playlist: bool,
    pub status: JobStatus,
    /// 0 - 100 over the whole job. Playlists stay below 100 until done.
    pub progress: u8,
    /// Playlist item being fetched and the item count, 1-based.
    pub item: Option<(usize, usize)>,
    /// Library paths of the resulting tracks. Set only on success.
    pub tracks: Vec<PathBuf>,
    /// Extractor or filesystem message. Set only on failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub(super) cancel: CancelFlag,
}

impl DownloadJob {
    pub(super) fn new(id: JobId, url: String, filename: Option<String>, playlist: bool) -> Self {
        Self {
            id,
            url,
            filename,
            playlist,
            status: JobStatus::Pending,
            progress: 0,
            item: None,
            tracks: Vec::new(),
            error: None,
            created_at: Utc::now(),
            finished_at: None,
            cancel: CancelFlag::default(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// First resulting track, the one a single download produced.
    pub fn track(&self) -> Option<&Path> {
        self.tracks.first().map(PathBuf::as_path)
    }

    /// Whether a cancel was requested and the worker has not reported yet.
    pub fn is_cancelling(&self) -> bool {
        !self.is_terminal() && self.cancel.is_cancelled()
    }

    /// `None` while in flight; the track paths or a `DownloadFailed` once done.
    pub fn result(&self) -> Option<Result<&[PathBuf]>> {
        match self.status {
            JobStatus::Succeeded => Some(Ok(&self.tracks)),
            JobStatus::Failed => Some(Err(Error::DownloadFailed(
                self.error.clone().unwrap_or_default(),
            ))),
            JobStatus::Pending | JobStatus::Running => None,
        }
    }

    pub(super) fn start(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
        }
    }

    pub(super) fn advance(&mut self, progress: FetchProgress) {
        self.start();
        match progress {
            FetchProgress::Item { index, count } => {
                self.item = Some((index, count));
                self.progress = overall_progress(self.item, 0);
            }
            FetchProgress::Percent(pct) => self.progress = overall_progress(self.item, pct),
        }
    }

    pub(super) fn succeed(&mut self, tracks: Vec<PathBuf>) {
        self.status = JobStatus::Succeeded;
        self.progress = 100;
        self.tracks = tracks;
        self.error = None;
        self.finished_at = Some(Utc::now());
    }

    pub(super) fn fail(&mut self, reason: String) {
        self.status = JobStatus::Failed;
        self.tracks.clear();
        self.error = Some(reason);
        self.finished_at = Some(Utc::now());
    }
}

/// Job-wide percentage: finished items plus the share of the current one.
/// With more than one item the result is capped at 99.
pub fn overall_progress(item: Option<(usize, usize)>, pct: u8) -> u8 {
    let pct = f64::from(pct.min(100));
    match item {
        Some((index, count)) if count > 1 => {
            let done = index.clamp(1, count) - 1;
            let overall = (done as f64 + pct / 100.0) / count as f64 * 100.0;
            overall.min(99.0) as u8
        }
        _ => pct as u8,
    }
}
