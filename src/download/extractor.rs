//! The external fetch-and-convert step.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::config::DownloadSettings;
use crate::error::{Error, Result};

static PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").expect("valid regex"));

static PLAYLIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+Downloading (?:item|video) (\d+) of (\d+)").expect("valid regex")
});

/// How many stderr lines are kept for the failure message.
const STDERR_TAIL: usize = 3;

/// How often a running child is checked for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Reason reported by a fetch that was cancelled.
pub const CANCELLED: &str = "download cancelled";

/// Output template for playlist items: `[007] Title.mp3`.
pub const PLAYLIST_TEMPLATE: &str = "[%(playlist_index)03d] %(title)s.%(ext)s";

/// Shared flag a worker checks to abandon its fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One fetch, written into a private staging directory.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub staging_dir: PathBuf,
    pub audio_format: String,
    pub audio_quality: String,
    /// Fetch every entry of a playlist URL instead of a single video.
    pub playlist: bool,
    pub cancel: CancelFlag,
}

/// What the extractor reports while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchProgress {
    /// Percent of the item being downloaded.
    Percent(u8),
    /// A playlist moved on to item `index` (1-based) of `count`.
    Item { index: usize, count: usize },
}

/// Something that can turn a URL into audio files.
///
/// `fetch` runs on a worker thread and writes into `request.staging_dir`.
/// A single fetch yields exactly one file named after the source title; a
/// playlist fetch yields one file per item that made it. Failures are
/// reported as the collaborator's message, or `CANCELLED`.
pub trait Extractor: Send + Sync {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String>;
}

/// `yt-dlp` (or a compatible fork) run as a child process.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>, ffmpeg_location: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_location,
        }
    }

    /// Use `extractor_path` when configured, otherwise search `PATH`.
    pub fn locate(settings: &DownloadSettings) -> Result<Self> {
        let binary = match &settings.extractor_path {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                return Err(Error::ExtractorNotFound(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            None => which::which(&settings.extractor_binary).map_err(|e| {
                Error::ExtractorNotFound(format!("{}: {e}", settings.extractor_binary))
            })?,
        };
        info!(binary = %binary.display(), "using extractor");
        Ok(Self::new(binary, settings.ffmpeg_location.clone()))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, request: &FetchRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-f", "bestaudio", "--extract-audio"])
            .args(["--audio-format", &request.audio_format])
            .args(["--audio-quality", &request.audio_quality]);
        if let Some(ffmpeg) = &self.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }
        let template = if request.playlist {
            // One broken entry must not sink the rest.
            cmd.args(["--yes-playlist", "--ignore-errors", "--no-abort-on-error"]);
            request.staging_dir.join(PLAYLIST_TEMPLATE)
        } else {
            cmd.arg("--no-playlist");
            request.staging_dir.join("%(title)s.%(ext)s")
        };
        cmd.args(["--newline", "-o"])
            .arg(template)
            .arg("--")
            .arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Extractor for YtDlp {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String> {
        let mut child = self
            .command(request)
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", self.binary.display()))?;

        // Drain stderr on its own thread so a chatty child cannot block on a full pipe.
        let stderr = child.stderr.take().map(|err| {
            thread::spawn(move || {
                BufReader::new(err)
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<String>>()
            })
        });

        // Stdout goes through a channel so the cancel flag is seen even
        // while the child is silent.
        let (line_tx, line_rx) = mpsc::channel::<String>();
        if let Some(out) = child.stdout.take() {
            thread::spawn(move || {
                for line in BufReader::new(out).lines().map_while(|l| l.ok()) {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            });
        } else {
            drop(line_tx);
        }

        loop {
            if request.cancel.is_cancelled() {
                kill(&mut child);
                return Err(CANCELLED.to_string());
            }
            match line_rx.recv_timeout(CANCEL_POLL) {
                Ok(line) => match parse_line(&line) {
                    Some(p) => progress(p),
                    None => debug!(line = %line, "extractor"),
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child
            .wait()
            .map_err(|e| format!("failed to wait for extractor: {e}"))?;
        let stderr_lines = stderr
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if request.cancel.is_cancelled() {
            return Err(CANCELLED.to_string());
        }

        if request.playlist {
            // Skipped entries make the exit status non-zero; whatever did
            // arrive still counts.
            let files = find_outputs(&request.staging_dir);
            if files.is_empty() {
                return Err(if status.success() {
                    "playlist produced no files".to_string()
                } else {
                    failure_message(&stderr_lines, &status.to_string())
                });
            }
            return Ok(files);
        }

        if !status.success() {
            return Err(failure_message(&stderr_lines, &status.to_string()));
        }

        find_output(&request.staging_dir, &request.audio_format).map(|p| vec![p])
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "extractor already gone");
    }
    let _ = child.wait();
}

/// Stand-in used when no extractor binary could be found.
#[derive(Debug, Clone)]
pub struct MissingExtractor {
    reason: String,
}

impl MissingExtractor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Extractor for MissingExtractor {
    fn fetch(
        &self,
        _request: &FetchRequest,
        _progress: &mut dyn FnMut(FetchProgress),
    ) -> std::result::Result<Vec<PathBuf>, String> {
        Err(self.reason.clone())
    }
}

/// Percentage from a `[download]  42.3% of ...` line.
pub fn parse_progress(line: &str) -> Option<u8> {
    let caps = PROGRESS.captures(line.trim_start())?;
    let pct: f32 = caps[1].parse().ok()?;
    Some(pct.clamp(0.0, 100.0) as u8)
}

/// A percentage or a `[download] Downloading item 3 of 12` marker.
pub fn parse_line(line: &str) -> Option<FetchProgress> {
    if let Some(pct) = parse_progress(line) {
        return Some(FetchProgress::Percent(pct));
    }
    let caps = PLAYLIST_ITEM.captures(line.trim_start())?;
    let index = caps[1].parse().ok()?;
    let count = caps[2].parse().ok()?;
    Some(FetchProgress::Item { index, count })
}

/// Prefer `ERROR:` lines, else the last few lines of stderr.
fn failure_message(stderr: &[String], status: &str) -> String {
    let errors: Vec<&str> = stderr
        .iter()
        .map(|l| l.trim())
        .filter(|l| l.starts_with("ERROR"))
        .collect();
    if let Some(last) = errors.last() {
        return (*last).to_string();
    }

    let tail: Vec<&str> = stderr
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if tail.is_empty() {
        format!("extractor failed ({status})")
    } else {
        tail[tail.len().saturating_sub(STDERR_TAIL)..].join(" | ")
    }
}

/// The converted file in `dir`: one with the requested extension, else any
/// finished file.
fn find_output(dir: &Path, audio_format: &str) -> std::result::Result<PathBuf, String> {
    let files = finished_files(dir).map_err(|e| format!("cannot read staging dir: {e}"))?;

    let wanted = files.iter().find(|p| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(audio_format))
    });
    wanted
        .or_else(|| files.first())
        .cloned()
        .ok_or_else(|| "extractor reported success but produced no file".to_string())
}

/// Every finished file in `dir`, in name order so `[001]` comes first.
fn find_outputs(dir: &Path) -> Vec<PathBuf> {
    let mut files = finished_files(dir).unwrap_or_default();
    files.sort();
    files
}

fn finished_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    Ok(fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            !p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "part" || e == "ytdl")
        })
        .collect())
}
