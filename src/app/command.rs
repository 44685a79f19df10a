//! Typed user actions and the shell that carries them out.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::audio::{LoopMode, MediaEngine, PlaybackController};
use crate::download::{DownloadManager, JobId};
use crate::error::{Error, Result};
use crate::library::LibraryIndex;
use crate::playlist::PlaylistStore;

/// Everything a user (keyboard or MPRIS) can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
    Resume,
    TogglePause,
    Stop,
    Next,
    Previous,
    /// Play the queue entry at this index.
    PlayQueueEntry(usize),
    /// Play a library track, enqueueing it first if needed.
    PlayTrack(PathBuf),
    Enqueue(PathBuf),
    EnqueueAll,
    Remove(usize),
    Reorder { from: usize, to: usize },
    Shuffle,
    ClearQueue,
    Seek(Duration),
    SeekBy(i64),
    SetVolume(u8),
    /// Relative volume change in percent points.
    AdjustVolume(i16),
    SetLoopMode(LoopMode),
    CycleLoopMode,
    Rescan,
    Download { url: String, filename: Option<String> },
    /// Fetch every entry of a playlist URL.
    DownloadPlaylist(String),
    CancelDownload(JobId),
    ClearFinishedDownloads,
    /// Save the queue as a named playlist.
    SavePlaylist(String),
    /// Replace the queue with a saved playlist.
    LoadPlaylist(String),
    DeletePlaylist(String),
    ListPlaylists,
    AddToPlaylist { name: String, path: PathBuf },
    RemoveFromPlaylist { name: String, path: PathBuf },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Something worth showing in the status line.
    Message(String),
    Quit,
}

/// Borrowed view over the model that executes `Command`s.
pub struct Shell<'a, E: MediaEngine> {
    pub controller: &'a mut PlaybackController<E>,
    pub library: &'a mut LibraryIndex,
    pub downloads: &'a mut DownloadManager,
    pub playlists: &'a PlaylistStore,
}

impl<'a, E: MediaEngine> Shell<'a, E> {
    pub fn new(
        controller: &'a mut PlaybackController<E>,
        library: &'a mut LibraryIndex,
        downloads: &'a mut DownloadManager,
        playlists: &'a PlaylistStore,
    ) -> Self {
        Self {
            controller,
            library,
            downloads,
            playlists,
        }
    }

    pub fn dispatch(&mut self, cmd: Command) -> Result<Outcome> {
        debug!(?cmd, "dispatch");
        match cmd {
            Command::Play => self.controller.play()?,
            Command::Pause => self.controller.pause(),
            Command::Resume => self.controller.resume(),
            Command::TogglePause => self.controller.toggle_pause()?,
            Command::Stop => self.controller.stop(),
            Command::Next => self.controller.next()?,
            Command::Previous => self.controller.previous()?,
            Command::PlayQueueEntry(index) => self.controller.seek_to_track(index)?,
            Command::PlayTrack(path) => {
                let index = match self
                    .controller
                    .queue()
                    .entries()
                    .iter()
                    .position(|t| t.path == path)
                {
                    Some(i) => i,
                    None => self.enqueue_path(path)?,
                };
                self.controller.seek_to_track(index)?;
            }
            Command::Enqueue(path) => {
                let index = self.enqueue_path(path)?;
                return Ok(Outcome::Message(format!("queued at position {}", index + 1)));
            }
            Command::EnqueueAll => {
                let tracks = self.library.tracks().to_vec();
                let n = tracks.len();
                self.controller.enqueue_all(tracks);
                return Ok(Outcome::Message(format!("queued {n} tracks")));
            }
            Command::Remove(index) => {
                let removed = self.controller.remove(index)?;
                return Ok(Outcome::Message(format!("removed {}", removed.display)));
            }
            Command::Reorder { from, to } => self.controller.reorder(from, to)?,
            Command::Shuffle => self.controller.shuffle(&mut rand::rng()),
            Command::ClearQueue => self.controller.clear_queue(),
            Command::Seek(position) => self.controller.seek(position),
            Command::SeekBy(seconds) => self.controller.seek_by(seconds),
            Command::SetVolume(v) => self.controller.set_volume(v),
            Command::AdjustVolume(delta) => {
                let v = (i16::from(self.controller.volume()) + delta).clamp(0, 100);
                self.controller.set_volume(v as u8);
            }
            Command::SetLoopMode(mode) => self.controller.set_loop_mode(mode),
            Command::CycleLoopMode => {
                let mode = self.controller.loop_mode().cycle();
                self.controller.set_loop_mode(mode);
                return Ok(Outcome::Message(mode.label().to_string()));
            }
            Command::Rescan => {
                let s = self.library.rescan()?;
                let mut msg = format!(
                    "library: {} tracks (+{} -{} ~{})",
                    self.library.len(),
                    s.added,
                    s.removed,
                    s.updated
                );
                let dropped = self.controller.sync_with(self.library);
                if dropped > 0 {
                    msg.push_str(&format!(", {dropped} gone from queue"));
                }
                return Ok(Outcome::Message(msg));
            }
            Command::Download { url, filename } => {
                let id = self
                    .downloads
                    .request_download(&url, filename.as_deref())?;
                return Ok(Outcome::Message(format!("download {id} queued")));
            }
            Command::DownloadPlaylist(url) => {
                let id = self.downloads.request_playlist(&url)?;
                return Ok(Outcome::Message(format!("playlist download {id} queued")));
            }
            Command::CancelDownload(id) => {
                let msg = if self.downloads.cancel(id)? {
                    format!("cancelling download {id}")
                } else {
                    format!("download {id} already finished")
                };
                return Ok(Outcome::Message(msg));
            }
            Command::ClearFinishedDownloads => {
                let n = self.downloads.clear_finished();
                return Ok(Outcome::Message(format!("cleared {n} downloads")));
            }
            Command::SavePlaylist(name) => {
                let paths: Vec<PathBuf> = self
                    .controller
                    .queue()
                    .entries()
                    .iter()
                    .map(|t| t.path.clone())
                    .collect();
                let saved = self.playlists.save(&name, &paths)?;
                return Ok(Outcome::Message(format!(
                    "saved playlist {} ({} tracks)",
                    saved.name,
                    saved.tracks.len()
                )));
            }
            Command::LoadPlaylist(name) => return self.load_playlist(&name),
            Command::DeletePlaylist(name) => {
                self.playlists.delete(&name)?;
                return Ok(Outcome::Message(format!("deleted playlist {}", name.trim())));
            }
            Command::ListPlaylists => {
                let names = self.playlists.list()?;
                let msg = if names.is_empty() {
                    "no saved playlists".to_string()
                } else {
                    format!("playlists: {}", names.join(", "))
                };
                return Ok(Outcome::Message(msg));
            }
            Command::AddToPlaylist { name, path } => {
                let track = self.library.get(&path).ok_or(Error::UnknownTrack(path))?;
                let msg = if self.playlists.add_track(&name, &track.path)? {
                    format!("added {} to {}", track.display, name.trim())
                } else {
                    format!("{} is already in {}", track.display, name.trim())
                };
                return Ok(Outcome::Message(msg));
            }
            Command::RemoveFromPlaylist { name, path } => {
                let msg = if self.playlists.remove_track(&name, &path)? {
                    format!("removed from {}", name.trim())
                } else {
                    format!("not in {}", name.trim())
                };
                return Ok(Outcome::Message(msg));
            }
            Command::Quit => return Ok(Outcome::Quit),
        }
        Ok(Outcome::Done)
    }

    /// Drain engine and download notifications. Returns status messages for
    /// anything the user should hear about.
    pub fn poll(&mut self) -> Vec<String> {
        self.controller.poll();

        let finished = self.downloads.poll(self.library);
        let mut messages: Vec<String> = finished
            .iter()
            .filter_map(|&id| self.downloads.job(id))
            .filter_map(|job| match job.result()? {
                Ok([path]) if !job.playlist => Some(format!(
                    "downloaded {}",
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                )),
                Ok(paths) => Some(format!("downloaded {} tracks", paths.len())),
                Err(e) => Some(e.to_string()),
            })
            .collect();

        // Finished downloads rescanned the library.
        if !finished.is_empty() {
            let dropped = self.controller.sync_with(self.library);
            if dropped > 0 {
                messages.push(format!("{dropped} queued tracks left the library"));
            }
        }

        if let Some(err) = self.controller.take_error() {
            messages.push(err);
        }
        messages
    }

    /// Stop playback and queue the playlist's tracks that are still in the
    /// library.
    fn load_playlist(&mut self, name: &str) -> Result<Outcome> {
        let playlist = self.playlists.load(name)?;
        let tracks: Vec<_> = playlist
            .tracks
            .iter()
            .filter_map(|p| self.library.get(p).cloned())
            .collect();
        let missing = playlist.tracks.len() - tracks.len();
        let n = tracks.len();

        self.controller.clear_queue();
        self.controller.enqueue_all(tracks);

        let mut msg = format!("loaded {}: {n} tracks", playlist.name);
        if missing > 0 {
            msg.push_str(&format!(" ({missing} missing)"));
        }
        Ok(Outcome::Message(msg))
    }

    fn enqueue_path(&mut self, path: PathBuf) -> Result<usize> {
        let track = self
            .library
            .get(&path)
            .cloned()
            .ok_or(Error::UnknownTrack(path))?;
        Ok(self.controller.enqueue(track))
    }
}
