//! In-memory `MediaEngine` for controller tests.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::library::Track;

use super::engine::{EngineError, MediaEngine};
use super::types::EngineEvent;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Load(PathBuf),
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetVolume(f32),
}

/// Records every command and replays scripted events.
#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    pub calls: Vec<Call>,
    pub failing: HashSet<PathBuf>,
    pub events: VecDeque<EngineEvent>,
}

impl FakeEngine {
    pub fn failing_on(paths: &[&Path]) -> Self {
        Self {
            failing: paths.iter().map(|p| p.to_path_buf()).collect(),
            ..Self::default()
        }
    }

    pub fn push_event(&mut self, event: EngineEvent) {
        self.events.push_back(event);
    }

    pub fn loads(&self) -> Vec<&Path> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Load(p) => Some(p.as_path()),
                _ => None,
            })
            .collect()
    }
}

impl MediaEngine for FakeEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        self.calls.push(Call::Load(path.to_path_buf()));
        if self.failing.contains(path) {
            Err(EngineError("corrupt file".to_string()))
        } else {
            Ok(())
        }
    }

    fn play(&mut self) {
        self.calls.push(Call::Play);
    }

    fn pause(&mut self) {
        self.calls.push(Call::Pause);
    }

    fn stop(&mut self) {
        self.calls.push(Call::Stop);
    }

    fn seek(&mut self, position: Duration) {
        self.calls.push(Call::Seek(position));
    }

    fn set_volume(&mut self, volume: f32) {
        self.calls.push(Call::SetVolume(volume));
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }
}

/// A queueable track at `/music/<name>.mp3`, three minutes long.
pub(crate) fn track(name: &str) -> Track {
    Track {
        path: PathBuf::from(format!("/music/{name}.mp3")),
        title: name.to_string(),
        artist: None,
        album: None,
        genre: None,
        duration: Duration::from_secs(180),
        added_at: chrono::DateTime::<chrono::Utc>::from(SystemTime::UNIX_EPOCH),
        display: name.to_string(),
    }
}
