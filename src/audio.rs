//! Playback: the controller state machine and the `rodio`-backed engine.

mod controller;
mod engine;
mod player;
mod sink;
mod thread;
mod types;

pub use controller::{DEFAULT_VOLUME, PlaybackController};
pub use engine::{EngineError, MediaEngine};
pub use player::AudioPlayer;
pub use types::{EngineEvent, LoopMode, PlaybackState};

#[cfg(test)]
pub(crate) mod testing;
