//! The playback state machine.
//!
//! `PlaybackController` owns the queue and the `PlaybackState` and is the only
//! thing that talks to the media engine. Everything runs on the caller's
//! thread; engine notifications are drained with `poll`.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::library::{LibraryIndex, Track};
use crate::queue::Queue;

use super::engine::MediaEngine;
use super::types::{EngineEvent, LoopMode, PlaybackState};

pub const DEFAULT_VOLUME: u8 = 50;

pub struct PlaybackController<E: MediaEngine> {
    engine: E,
    queue: Queue,
    state: PlaybackState,
    position: Duration,
    volume: u8,
    last_error: Option<String>,
}

impl<E: MediaEngine> PlaybackController<E> {
    pub fn new(engine: E, queue: Queue) -> Self {
        let mut controller = Self {
            engine,
            queue,
            state: PlaybackState::Stopped,
            position: Duration::ZERO,
            volume: DEFAULT_VOLUME,
            last_error: None,
        };
        controller.set_volume(DEFAULT_VOLUME);
        controller
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Position inside the current track, within `[0, duration]` when the
    /// duration is known.
    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn current_track(&self) -> Option<&Track> {
        match self.state {
            PlaybackState::Stopped => None,
            _ => self.queue.current(),
        }
    }

    /// The most recent playback failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Start playing the track under the cursor, or the first track when the
    /// cursor is unset. Resumes when paused.
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Paused => {
                self.resume();
                return Ok(());
            }
            PlaybackState::Stopped => {}
        }

        if self.queue.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let index = match self.queue.cursor() {
            Some(i) => i,
            None => {
                self.queue.set_cursor(0)?;
                0
            }
        };
        self.start(index)
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.engine.pause();
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.engine.play();
            self.state = PlaybackState::Playing;
        }
    }

    pub fn toggle_pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Stopped => self.play()?,
        }
        Ok(())
    }

    /// Stop output. The queue cursor is left where it is.
    pub fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            debug!("playback stopped");
        }
        self.engine.stop();
        self.state = PlaybackState::Stopped;
        self.position = Duration::ZERO;
    }

    /// Point the cursor at `index` and play that track from the start.
    pub fn seek_to_track(&mut self, index: usize) -> Result<()> {
        self.queue.set_cursor(index)?;
        self.start(index)
    }

    /// Skip to the next entry. Does nothing past the end unless looping all.
    pub fn next(&mut self) -> Result<()> {
        match self.queue.next() {
            Some(i) => self.start(i),
            None => Ok(()),
        }
    }

    pub fn previous(&mut self) -> Result<()> {
        match self.queue.previous() {
            Some(i) => self.start(i),
            None => Ok(()),
        }
    }

    /// Jump to `position` in the current track. Ignored while stopped.
    pub fn seek(&mut self, position: Duration) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        let position = self.clamp(position);
        self.engine.seek(position);
        self.position = position;
    }

    /// Scrub relative to the current position.
    pub fn seek_by(&mut self, seconds: i64) {
        let delta = Duration::from_secs(seconds.unsigned_abs());
        let target = if seconds < 0 {
            self.position.saturating_sub(delta)
        } else {
            self.position + delta
        };
        self.seek(target);
    }

    /// Volume in percent; values above 100 are capped.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        self.engine.set_volume(f32::from(self.volume) / 100.0);
    }

    pub fn enqueue(&mut self, track: Track) -> usize {
        self.queue.enqueue(track)
    }

    pub fn enqueue_all(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.queue.enqueue_all(tracks);
    }

    /// Remove a queue entry. Removing the entry that is playing stops playback.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        let was_current = self.queue.cursor() == Some(index);
        let removed = self.queue.remove(index)?;
        if was_current && self.state != PlaybackState::Stopped {
            self.stop();
        }
        Ok(removed)
    }

    /// Bring queued tracks in line with `library` after a rescan: entries
    /// whose file left the library are dropped and the rest pick up fresh
    /// metadata. Playback stops when the playing entry was dropped. Returns
    /// how many entries were dropped.
    pub fn sync_with(&mut self, library: &LibraryIndex) -> usize {
        let (dropped, current_dropped) = self.queue.refresh(|t| library.get(&t.path).cloned());
        if current_dropped && self.state != PlaybackState::Stopped {
            info!("playing track left the library");
            self.stop();
        }
        if dropped > 0 {
            debug!(dropped, "queue synced with library");
        }
        dropped
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        self.queue.reorder(from, to)
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.queue.shuffle(rng);
    }

    pub fn clear_queue(&mut self) {
        self.stop();
        self.queue.clear();
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.queue.loop_mode()
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.queue.set_loop_mode(mode);
    }

    /// Drain pending engine notifications. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.engine.poll_event() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        match event {
            EngineEvent::Position(p) => self.position = self.clamp(p),
            EngineEvent::Finished => match self.queue.advance() {
                Some(next) => {
                    if let Err(e) = self.start(next) {
                        warn!(error = %e, index = next, "auto-advance failed");
                    }
                }
                None => {
                    info!("end of queue");
                    self.stop();
                }
            },
            EngineEvent::Error(reason) => {
                let err = match self.queue.current() {
                    Some(t) => Error::PlaybackFailed {
                        path: t.path.clone(),
                        reason,
                    },
                    None => Error::PlaybackFailed {
                        path: Default::default(),
                        reason,
                    },
                };
                warn!(error = %err, "engine error");
                self.last_error = Some(err.to_string());
                self.stop();
            }
        }
    }

    /// Load and play `index`. On failure the state is `Stopped` and the
    /// cursor is left on the failing entry.
    fn start(&mut self, index: usize) -> Result<()> {
        let path = match self.queue.get(index) {
            Some(t) => t.path.clone(),
            None => {
                return Err(Error::OutOfRange {
                    index,
                    len: self.queue.len(),
                });
            }
        };

        self.position = Duration::ZERO;
        match self.engine.load(&path) {
            Ok(()) => {
                self.engine.play();
                self.state = PlaybackState::Playing;
                self.last_error = None;
                info!(path = %path.display(), index, "playing");
                Ok(())
            }
            Err(e) => {
                self.engine.stop();
                self.state = PlaybackState::Stopped;
                let err = Error::PlaybackFailed {
                    path,
                    reason: e.to_string(),
                };
                warn!(error = %err, "could not start track");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn clamp(&self, position: Duration) -> Duration {
        match self.queue.current() {
            Some(t) if t.has_known_duration() => position.min(t.duration),
            _ => position,
        }
    }
}
