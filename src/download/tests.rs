use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::{TempDir, tempdir};

use super::*;
use crate::config::{DownloadSettings, LibrarySettings};
use crate::error::Error;
use crate::library::{LibraryIndex, STAGING_PREFIX, scan};
use super::extractor::{CANCELLED, FetchProgress};

/// Writes `<staging>/<title>.<ext>` after reporting some progress.
struct FakeYtDlp {
    title: &'static str,
    ext: &'static str,
}

impl Extractor for FakeYtDlp {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String> {
        for pct in [10, 55, 100] {
            progress(FetchProgress::Percent(pct));
        }
        let out = request
            .staging_dir
            .join(format!("{}.{}", self.title, self.ext));
        fs::write(&out, b"fake audio").map_err(|e| e.to_string())?;
        Ok(vec![out])
    }
}

/// Leaves a partial file behind in staging and then fails.
struct BrokenYtDlp;

impl Extractor for BrokenYtDlp {
    fn fetch(
        &self,
        request: &FetchRequest,
        _progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String> {
        let _ = fs::write(request.staging_dir.join("half.webm.part"), b"partial");
        Err(format!("ERROR: Unsupported URL: {}", request.url))
    }
}

/// Remembers where it was asked to stage, then behaves like `FakeYtDlp`.
#[derive(Default)]
struct StagingSpy {
    seen: Arc<Mutex<Option<(PathBuf, bool)>>>,
}

impl Extractor for StagingSpy {
    fn fetch(
        &self,
        request: &FetchRequest,
        _progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String> {
        let existed = request.staging_dir.is_dir();
        *self.seen.lock().unwrap() = Some((request.staging_dir.clone(), existed));
        let out = request.staging_dir.join("Spy - Song.mp3");
        fs::write(&out, b"fake audio").map_err(|e| e.to_string())?;
        Ok(vec![out])
    }
}

/// Writes a partial file and waits until cancelled.
struct StalledYtDlp;

impl Extractor for StalledYtDlp {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String> {
        let _ = fs::write(request.staging_dir.join("slow.mp3.part"), b"partial");
        progress(FetchProgress::Percent(5));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !request.cancel.is_cancelled() {
            if Instant::now() > deadline {
                return Err("never cancelled".to_string());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(CANCELLED.to_string())
    }
}

/// A three-item playlist whose second entry is unavailable.
struct FakePlaylist;

impl Extractor for FakePlaylist {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String> {
        if !request.playlist {
            return Err("expected a playlist request".to_string());
        }
        let mut out = Vec::new();
        for (index, title) in [(1, Some("Intro")), (2, None), (3, Some("Outro: Reprise"))] {
            progress(FetchProgress::Item { index, count: 3 });
            progress(FetchProgress::Percent(100));
            if let Some(title) = title {
                let path = request.staging_dir.join(format!("[{index:03}] {title}.mp3"));
                fs::write(&path, b"fake audio").map_err(|e| e.to_string())?;
                out.push(path);
            }
        }
        Ok(out)
    }
}

struct Fixture {
    dir: TempDir,
    library: LibraryIndex,
    manager: DownloadManager,
}

impl Fixture {
    fn new(extractor: impl Extractor + 'static) -> Self {
        let dir = tempdir().unwrap();
        let library = LibraryIndex::open(dir.path(), LibrarySettings::default()).unwrap();
        let manager = DownloadManager::new(
            dir.path(),
            DownloadSettings::default(),
            Arc::new(extractor),
        );
        Self {
            dir,
            library,
            manager,
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Poll until `id` is terminal or a few seconds pass.
    fn wait(&mut self, id: JobId) -> JobStatus {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            self.manager.poll(&mut self.library);
            let job = self.manager.job(id).unwrap();
            if job.is_terminal() {
                return job.status;
            }
            assert!(Instant::now() < deadline, "job {id} stuck in {:?}", job.status);
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn files_in_root(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[test]
fn new_job_is_pending_until_polled() {
    let mut fx = Fixture::new(FakeYtDlp {
        title: "Song",
        ext: "mp3",
    });
    let id = fx.manager.request_download("https://example.com/watch?v=1", None).unwrap();
    let job = fx.manager.job(id).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0);
    assert!(job.result().is_none());

    assert_eq!(fx.wait(id), JobStatus::Succeeded);
}

#[test]
fn successful_download_lands_under_root_and_is_indexed() {
    let mut fx = Fixture::new(FakeYtDlp {
        title: "Daft Punk: One More Time",
        ext: "mp3",
    });
    let id = fx.manager.request_download("https://example.com/watch?v=2", None).unwrap();
    assert_eq!(fx.wait(id), JobStatus::Succeeded);

    let job = fx.manager.job(id).unwrap();
    let track = job.track().unwrap().to_path_buf();
    assert_eq!(track, fx.root().join("Daft Punk - One More Time.mp3"));
    assert!(track.starts_with(fx.root()));
    assert_eq!(job.progress, 100);
    assert!(job.finished_at.is_some());
    assert!(job.error.is_none());
    assert!(matches!(job.result(), Some(Ok(paths)) if paths == [track.clone()]));

    assert!(fx.library.contains(&track));
    let rescanned = scan(fx.root(), &LibrarySettings::default()).unwrap();
    assert!(rescanned.iter().any(|t| t.path == track));
}

#[test]
fn custom_filename_wins_and_collisions_get_a_counter() {
    let mut fx = Fixture::new(FakeYtDlp {
        title: "whatever the video is called",
        ext: "mp3",
    });
    fs::write(fx.root().join("Road Trip.mp3"), b"already here").unwrap();
    fx.library.rescan().unwrap();

    let id = fx
        .manager
        .request_download("https://example.com/watch?v=3", Some(" Road Trip "))
        .unwrap();
    assert_eq!(fx.wait(id), JobStatus::Succeeded);

    assert_eq!(
        fx.manager.job(id).unwrap().track(),
        Some(fx.root().join("Road Trip (1).mp3").as_path())
    );
    assert_eq!(fx.files_in_root(), vec!["Road Trip (1).mp3", "Road Trip.mp3"]);
    assert_eq!(fx.library.len(), 2);
}

#[test]
fn failed_download_keeps_reason_and_leaves_no_files() {
    let mut fx = Fixture::new(BrokenYtDlp);
    let id = fx.manager.request_download("not a url", None).unwrap();
    assert_eq!(fx.wait(id), JobStatus::Failed);

    let job = fx.manager.job(id).unwrap();
    assert!(job.track().is_none());
    assert!(job.error.as_deref().unwrap().contains("Unsupported URL"));
    assert!(matches!(job.result(), Some(Err(Error::DownloadFailed(ref m))) if m.contains("not a url")));
    assert!(fx.files_in_root().is_empty());
    assert!(fx.library.is_empty());
}

#[test]
fn file_the_library_ignores_fails_and_is_removed() {
    let mut fx = Fixture::new(FakeYtDlp {
        title: "Artist - Video",
        ext: "webm",
    });
    let id = fx.manager.request_download("https://example.com/watch?v=4", None).unwrap();
    assert_eq!(fx.wait(id), JobStatus::Failed);
    assert!(fx.manager.job(id).unwrap().error.as_deref().unwrap().contains("not indexed"));
    assert!(fx.files_in_root().is_empty());
}

#[test]
fn missing_extractor_fails_every_job() {
    let mut fx = Fixture::new(MissingExtractor::new("yt-dlp: cannot find binary path"));
    let id = fx.manager.request_download("https://example.com/watch?v=5", None).unwrap();
    assert_eq!(fx.wait(id), JobStatus::Failed);
    assert_eq!(
        fx.manager.job(id).unwrap().error.as_deref(),
        Some("yt-dlp: cannot find binary path")
    );
}

#[test]
fn empty_url_is_rejected_up_front() {
    let mut fx = Fixture::new(BrokenYtDlp);
    assert!(matches!(fx.manager.request_download("   ", None), Err(Error::EmptyUrl)));
    assert!(fx.manager.jobs().is_empty());
}

#[test]
fn same_url_in_flight_is_not_downloaded_twice() {
    let mut fx = Fixture::new(FakeYtDlp {
        title: "Once",
        ext: "mp3",
    });
    let url = "https://example.com/watch?v=6";
    let first = fx.manager.request_download(url, None).unwrap();
    let again = fx.manager.request_download(&format!("  {url} "), Some("other")).unwrap();
    let different = fx
        .manager
        .request_download("https://example.com/watch?v=7", None)
        .unwrap();

    assert_eq!(first, again);
    assert_ne!(first, different);
    assert_eq!(fx.manager.jobs().len(), 2);
    assert_eq!(fx.manager.active_count(), 2);

    fx.wait(first);
    fx.wait(different);
    assert_eq!(fx.manager.active_count(), 0);

    // Finished jobs no longer block a fresh request for the same URL.
    let later = fx.manager.request_download(url, None).unwrap();
    assert_ne!(later, first);
    fx.wait(later);
}

#[test]
fn poll_reports_each_terminal_job_once_and_clear_finished_drops_them() {
    let mut fx = Fixture::new(FakeYtDlp {
        title: "Track",
        ext: "mp3",
    });
    let id = fx.manager.request_download("https://example.com/watch?v=8", None).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut reported = Vec::new();
    while reported.is_empty() {
        assert!(Instant::now() < deadline, "job never finished");
        reported = fx.manager.poll(&mut fx.library);
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(reported, vec![id]);
    assert!(fx.manager.poll(&mut fx.library).is_empty());

    assert_eq!(fx.manager.clear_finished(), 1);
    assert!(fx.manager.jobs().is_empty());
    assert!(fx.manager.job(id).is_none());
}

#[test]
fn staging_happens_in_a_hidden_dir_under_the_root() {
    let spy = StagingSpy::default();
    let seen = Arc::clone(&spy.seen);
    let mut fx = Fixture::new(spy);
    let id = fx.manager.request_download("https://example.com/watch?v=9", None).unwrap();
    assert_eq!(fx.wait(id), JobStatus::Succeeded);

    let (staging, existed) = seen.lock().unwrap().clone().unwrap();
    assert!(existed);
    assert_eq!(staging.parent(), Some(fx.root()));
    let name = staging.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with('.'), "{name} is not hidden");
    assert!(name.starts_with(STAGING_PREFIX));

    // Staging is gone and only the placed file remains.
    assert!(!staging.exists());
    assert_eq!(fx.files_in_root(), vec!["Spy - Song.mp3"]);
}

#[test]
fn stale_staging_dirs_are_swept_on_startup() {
    let dir = tempdir().unwrap();
    let stale = dir.path().join(format!("{STAGING_PREFIX}leftover"));
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("x.mp3.part"), b"partial").unwrap();
    fs::create_dir_all(dir.path().join(".keep-me")).unwrap();

    let _manager = DownloadManager::new(
        dir.path(),
        DownloadSettings::default(),
        Arc::new(BrokenYtDlp),
    );
    assert!(!stale.exists());
    assert!(dir.path().join(".keep-me").is_dir());
}

#[test]
fn cancel_stops_the_worker_and_cleans_staging() {
    let mut fx = Fixture::new(StalledYtDlp);
    let id = fx.manager.request_download("https://example.com/watch?v=10", None).unwrap();

    assert!(fx.manager.cancel(id).unwrap());
    assert!(fx.manager.job(id).unwrap().is_cancelling());
    assert_eq!(fx.wait(id), JobStatus::Failed);

    let job = fx.manager.job(id).unwrap();
    assert_eq!(job.error.as_deref(), Some(CANCELLED));
    assert!(!job.is_cancelling());
    assert!(fx.files_in_root().is_empty());
    assert!(fx.library.is_empty());

    // Finished jobs cannot be cancelled again; unknown ids are an error.
    assert!(!fx.manager.cancel(id).unwrap());
    assert!(matches!(fx.manager.cancel(JobId(99)), Err(Error::UnknownJob(99))));
}

#[test]
fn playlist_download_keeps_numbered_items_that_arrived() {
    let mut fx = Fixture::new(FakePlaylist);
    let id = fx.manager.request_playlist("https://example.com/playlist?list=1").unwrap();
    assert!(fx.manager.job(id).unwrap().playlist);
    assert_eq!(fx.wait(id), JobStatus::Succeeded);

    let job = fx.manager.job(id).unwrap();
    assert_eq!(
        job.tracks,
        vec![
            fx.root().join("[001] Intro.mp3"),
            fx.root().join("[003] Outro Reprise.mp3"),
        ]
    );
    assert_eq!(job.item, Some((3, 3)));
    assert_eq!(job.progress, 100);
    assert_eq!(fx.library.len(), 2);
    assert_eq!(fx.files_in_root(), vec!["[001] Intro.mp3", "[003] Outro Reprise.mp3"]);
}
