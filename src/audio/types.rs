//! Audio-related small types.
//!
//! This module defines the loop mode, the controller-visible playback state,
//! the events pushed by the media engine and the commands understood by the
//! audio thread.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::config::LoopModeSetting;

use super::engine::EngineError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Stop after the last entry of the queue.
    #[default]
    NoLoop,
    /// Wrap around to the start of the queue.
    LoopAll,
    /// Repeat the current song when it ends.
    LoopOne,
}

impl LoopMode {
    /// `NoLoop -> LoopAll -> LoopOne -> NoLoop`.
    pub fn cycle(self) -> Self {
        match self {
            Self::NoLoop => Self::LoopAll,
            Self::LoopAll => Self::LoopOne,
            Self::LoopOne => Self::NoLoop,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NoLoop => "No-loop",
            Self::LoopAll => "Loop-around",
            Self::LoopOne => "Repeat-one",
        }
    }
}

impl From<LoopModeSetting> for LoopMode {
    fn from(value: LoopModeSetting) -> Self {
        match value {
            LoopModeSetting::NoLoop => Self::NoLoop,
            LoopModeSetting::LoopAll => Self::LoopAll,
            LoopModeSetting::LoopOne => Self::LoopOne,
        }
    }
}

/// The playback state owned by the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Notifications pushed by a media engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Current playback position of the loaded track.
    Position(Duration),
    /// The loaded track played to its end.
    Finished,
    /// Decoding or output failed mid-playback.
    Error(String),
}

#[derive(Debug)]
pub(super) enum AudioCmd {
    /// Open and decode `path`, leaving it paused at the start. The outcome
    /// is sent back on `reply`.
    Load {
        path: PathBuf,
        reply: Sender<Result<(), EngineError>>,
    },
    /// Start or resume output of the loaded track.
    Play,
    Pause,
    /// Drop the loaded track.
    Stop,
    /// Jump to an absolute position in the loaded track.
    Seek(Duration),
    /// Linear volume, 0.0 - 1.0.
    SetVolume(f32),
    /// Quit the audio thread, optionally fading out over `fade_out_ms` milliseconds.
    Quit { fade_out_ms: u64 },
}
