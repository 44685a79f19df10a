//! The seam between the playback controller and whatever produces sound.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use super::types::EngineEvent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Commands a media engine must accept.
///
/// Engines own decoding and output. They report progress through
/// `poll_event`, which must never block.
pub trait MediaEngine {
    /// Prepare `path` for playback, paused at the start.
    fn load(&mut self, path: &Path) -> Result<(), EngineError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position: Duration);
    /// Linear volume, 0.0 - 1.0.
    fn set_volume(&mut self, volume: f32);
    fn poll_event(&mut self) -> Option<EngineEvent>;
}
