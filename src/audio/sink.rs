//! Opening and decoding files into paused `rodio` sinks.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink, Source};

use super::engine::EngineError;

/// Create a paused `Sink` for `path` that starts playback at `start_at`.
pub(super) fn create_sink_at(
    stream: &OutputStream,
    path: &Path,
    start_at: Duration,
) -> Result<Sink, EngineError> {
    let file = File::open(path)
        .map_err(|e| EngineError(format!("failed to open {}: {e}", path.display())))?;

    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| EngineError(format!("failed to decode {}: {e}", path.display())))?
        // `skip_duration` is our seeking primitive; even Duration::ZERO is fine.
        .skip_duration(start_at);

    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);
    sink.pause();
    Ok(sink)
}
