use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info, warn};

use crate::config::DownloadSettings;
use crate::error::{Error, Result};
use crate::library::{LibraryIndex, STAGING_PREFIX, is_staging_dir};

use super::extractor::{CANCELLED, CancelFlag, Extractor, FetchProgress, FetchRequest};
use super::filename::{library_stem, unique_destination};
use super::job::{DownloadJob, JobId};

/// Worker to primary-thread handoff.
#[derive(Debug)]
enum JobMsg {
    Started(JobId),
    Progress(JobId, FetchProgress),
    Finished(JobId, std::result::Result<Vec<PathBuf>, String>),
}

/// Everything a worker needs, moved onto its thread.
struct Work {
    id: JobId,
    url: String,
    filename: Option<String>,
    playlist: bool,
    root: PathBuf,
    settings: DownloadSettings,
    extractor: Arc<dyn Extractor>,
    placement: Arc<Mutex<()>>,
    cancel: CancelFlag,
    tx: Sender<JobMsg>,
}

/// Runs downloads on worker threads and folds their results into the
/// library on the caller's thread.
///
/// Workers never touch the job list or the index; they post `JobMsg`s that
/// `poll` applies. Each worker stages its files in a hidden directory under
/// the library root so the final move is a rename on one filesystem.
pub struct DownloadManager {
    root: PathBuf,
    settings: DownloadSettings,
    extractor: Arc<dyn Extractor>,
    jobs: Vec<DownloadJob>,
    next_id: u64,
    /// Serialises picking a free filename and moving into it.
    placement: Arc<Mutex<()>>,
    tx: Sender<JobMsg>,
    rx: Receiver<JobMsg>,
}

impl DownloadManager {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: DownloadSettings,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let root = root.into();
        sweep_staging(&root);
        let (tx, rx) = mpsc::channel();
        Self {
            root,
            settings,
            extractor,
            jobs: Vec::new(),
            next_id: 1,
            placement: Arc::new(Mutex::new(())),
            tx,
            rx,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start fetching `url` into the library.
    ///
    /// Returns immediately with a `Pending` job. A URL that already has a job
    /// in flight gets that job's id back instead of a second download.
    pub fn request_download(&mut self, url: &str, filename: Option<&str>) -> Result<JobId> {
        self.request(url, filename, false)
    }

    /// Fetch every entry of a playlist URL. Files keep the playlist order
    /// as a `[NNN] ` prefix; entries that fail are skipped.
    pub fn request_playlist(&mut self, url: &str) -> Result<JobId> {
        self.request(url, None, true)
    }

    fn request(&mut self, url: &str, filename: Option<&str>, playlist: bool) -> Result<JobId> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::EmptyUrl);
        }

        if let Some(active) = self.jobs.iter().find(|j| j.url == url && !j.is_terminal()) {
            info!(job = %active.id, url, "download already in flight");
            return Ok(active.id);
        }

        let id = JobId(self.next_id);
        self.next_id += 1;

        let filename = filename
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let job = DownloadJob::new(id, url.to_string(), filename.clone(), playlist);
        let work = Work {
            id,
            url: url.to_string(),
            filename,
            playlist,
            root: self.root.clone(),
            settings: self.settings.clone(),
            extractor: Arc::clone(&self.extractor),
            placement: Arc::clone(&self.placement),
            cancel: job.cancel.clone(),
            tx: self.tx.clone(),
        };
        thread::Builder::new()
            .name(format!("download-{}", id.0))
            .spawn(move || run(work))?;
        self.jobs.push(job);

        info!(job = %id, url, playlist, "download requested");
        Ok(id)
    }

    /// Ask the worker behind `id` to stop. The child process is killed and
    /// staging is removed; the job ends `Failed` with a cancellation reason
    /// on a later `poll`. Returns `false` when the job already finished.
    pub fn cancel(&mut self, id: JobId) -> Result<bool> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or(Error::UnknownJob(id.0))?;
        if job.is_terminal() {
            return Ok(false);
        }
        job.cancel.cancel();
        info!(job = %id, "download cancel requested");
        Ok(true)
    }

    /// Apply everything the workers reported since the last call.
    ///
    /// Finished files are brought into `library` with a rescan. Returns the
    /// ids of jobs that reached a terminal state during this call.
    pub fn poll(&mut self, library: &mut LibraryIndex) -> Vec<JobId> {
        let mut finished = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                JobMsg::Started(id) => {
                    if let Some(job) = self.job_mut(id) {
                        job.start();
                    }
                }
                JobMsg::Progress(id, progress) => {
                    if let Some(job) = self.job_mut(id) {
                        job.advance(progress);
                    }
                }
                JobMsg::Finished(id, outcome) => {
                    let outcome = outcome.and_then(|paths| incorporate(library, &paths));
                    let Some(job) = self.job_mut(id) else {
                        continue;
                    };
                    match outcome {
                        Ok(paths) => {
                            info!(job = %id, tracks = paths.len(), "download finished");
                            job.succeed(paths);
                        }
                        Err(reason) => {
                            warn!(job = %id, reason = %reason, "download failed");
                            job.fail(reason);
                        }
                    }
                    finished.push(id);
                }
            }
        }
        finished
    }

    pub fn jobs(&self) -> &[DownloadJob] {
        &self.jobs
    }

    pub fn job(&self, id: JobId) -> Option<&DownloadJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|j| !j.is_terminal()).count()
    }

    /// Forget succeeded and failed jobs.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|j| !j.is_terminal());
        before - self.jobs.len()
    }

    fn job_mut(&mut self, id: JobId) -> Option<&mut DownloadJob> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == id && !j.is_terminal())
    }
}

/// Remove staging directories an earlier run left behind.
fn sweep_staging(root: &Path) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        if path.is_dir() && is_staging_dir(&path) {
            match fs::remove_dir_all(&path) {
                Ok(()) => info!(dir = %path.display(), "removed stale download staging"),
                Err(e) => warn!(dir = %path.display(), error = %e, "cannot remove stale staging"),
            }
        }
    }
}

/// Rescan once and keep the files the index picked up; the rest are
/// removed. Fails only when nothing was indexed.
fn incorporate(library: &mut LibraryIndex, paths: &[PathBuf]) -> std::result::Result<Vec<PathBuf>, String> {
    let indexed = match library.incorporate(paths) {
        Ok(indexed) => indexed,
        Err(e) => {
            for path in paths {
                let _ = fs::remove_file(path);
            }
            return Err(e.to_string());
        }
    };

    let rejected: Vec<&PathBuf> = paths.iter().filter(|p| !indexed.contains(p)).collect();
    for path in &rejected {
        let _ = fs::remove_file(path);
    }
    if !rejected.is_empty() {
        debug!(count = rejected.len(), "downloaded files not indexed");
    }

    match (indexed.is_empty(), rejected.first()) {
        (true, Some(path)) => Err(format!(
            "{} is not indexed by the library (check library.extensions)",
            path.display()
        )),
        (true, None) => Err("download produced no files".to_string()),
        (false, _) => Ok(indexed),
    }
}

fn run(work: Work) {
    let _ = work.tx.send(JobMsg::Started(work.id));
    let outcome = fetch_into_library(&work);
    let _ = work.tx.send(JobMsg::Finished(work.id, outcome));
}

fn fetch_into_library(work: &Work) -> std::result::Result<Vec<PathBuf>, String> {
    if work.cancel.is_cancelled() {
        return Err(CANCELLED.to_string());
    }

    // Dropped (and deleted) on every path out of this function.
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&work.root)
        .map_err(|e| format!("cannot create staging dir in {}: {e}", work.root.display()))?;

    let request = FetchRequest {
        url: work.url.clone(),
        staging_dir: staging.path().to_path_buf(),
        audio_format: work.settings.audio_format.clone(),
        audio_quality: work.settings.audio_quality.clone(),
        playlist: work.playlist,
        cancel: work.cancel.clone(),
    };

    let tx = work.tx.clone();
    let id = work.id;
    let fetched = work.extractor.fetch(&request, &mut |progress| {
        let _ = tx.send(JobMsg::Progress(id, progress));
    })?;

    let _guard = work
        .placement
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if work.cancel.is_cancelled() {
        return Err(CANCELLED.to_string());
    }

    let mut placed = Vec::with_capacity(fetched.len());
    for file in &fetched {
        match place(work, file) {
            Ok(dest) => placed.push(dest),
            Err(e) => {
                for dest in &placed {
                    let _ = fs::remove_file(dest);
                }
                return Err(e);
            }
        }
    }
    Ok(placed)
}

/// Move one staged file to a free library path. The caller holds the
/// placement lock.
fn place(work: &Work, fetched: &Path) -> std::result::Result<PathBuf, String> {
    let title = fetched
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let ext = fetched
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(&work.settings.audio_format)
        .to_string();
    // Playlist items keep their `[NNN] title` name as is.
    let custom = if work.playlist {
        Some(title.as_str())
    } else {
        work.filename.as_deref()
    };
    let stem = library_stem(
        custom,
        &title,
        &work.settings.audio_format,
        work.settings.max_filename_len,
    );

    let dest = unique_destination(&work.root, &stem, &ext);
    // Staging lives under the root, so this never crosses filesystems.
    fs::rename(fetched, &dest)
        .map_err(|e| format!("cannot move download into {}: {e}", work.root.display()))?;
    Ok(dest)
}
