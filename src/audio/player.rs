use std::path::Path;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

use crate::config::AudioSettings;

use super::engine::{EngineError, MediaEngine};
use super::thread::{TaggedEvent, spawn_audio_thread};
use super::types::{AudioCmd, EngineEvent};

/// `MediaEngine` backed by a dedicated `rodio` thread.
pub struct AudioPlayer {
    tx: Sender<AudioCmd>,
    events: Receiver<TaggedEvent>,
    /// Number of successful loads; events from older loads are dropped.
    generation: u64,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlayer {
    pub fn new(audio_settings: AudioSettings) -> Self {
        let (tx, rx) = mpsc::channel::<AudioCmd>();
        let (event_tx, events) = mpsc::channel::<TaggedEvent>();

        let audio_handle = spawn_audio_thread(rx, event_tx, audio_settings);

        Self {
            tx,
            events,
            generation: 0,
            join: Mutex::new(Some(audio_handle)),
        }
    }

    fn send(&self, cmd: AudioCmd) {
        if self.tx.send(cmd).is_err() {
            warn!("audio thread is gone, command dropped");
        }
    }

    /// Fade out, stop the audio thread and wait for it.
    pub fn quit_softly(&self, fade_out: Duration) {
        self.send(AudioCmd::Quit {
            fade_out_ms: fade_out.as_millis() as u64,
        });

        if let Ok(mut j) = self.join.lock() {
            if let Some(h) = j.take() {
                let _ = h.join();
            }
        }
    }
}

impl MediaEngine for AudioPlayer {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        let (reply, outcome) = mpsc::channel();
        self.tx
            .send(AudioCmd::Load {
                path: path.to_path_buf(),
                reply,
            })
            .map_err(|_| EngineError("audio thread is gone".to_string()))?;

        outcome
            .recv()
            .map_err(|_| EngineError("audio thread is gone".to_string()))??;
        self.generation += 1;
        Ok(())
    }

    fn play(&mut self) {
        self.send(AudioCmd::Play);
    }

    fn pause(&mut self) {
        self.send(AudioCmd::Pause);
    }

    fn stop(&mut self) {
        self.send(AudioCmd::Stop);
    }

    fn seek(&mut self, position: Duration) {
        self.send(AudioCmd::Seek(position));
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(AudioCmd::SetVolume(volume));
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        loop {
            match self.events.try_recv() {
                Ok((generation, event)) if generation == self.generation => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return None,
            }
        }
    }
}
