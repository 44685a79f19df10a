use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use rodio::{OutputStreamBuilder, Sink};
use tracing::{debug, error, warn};

use crate::config::AudioSettings;

use super::engine::EngineError;
use super::sink::create_sink_at;
use super::types::{AudioCmd, EngineEvent};

/// An event tagged with the load it belongs to, so the handle can drop
/// notifications about a track that has since been replaced.
pub(super) type TaggedEvent = (u64, EngineEvent);

const NO_OUTPUT: &str = "no audio output device";

/// Everything the audio thread knows about what is loaded.
struct Deck {
    generation: u64,
    current: Option<(PathBuf, Sink)>,
    pending: Option<(PathBuf, Sink)>,
    /// Where `current` started inside its file; `Sink::get_pos` counts from zero.
    offset: Duration,
    paused: bool,
    volume: f32,
}

impl Deck {
    fn new() -> Self {
        Self {
            generation: 0,
            current: None,
            pending: None,
            offset: Duration::ZERO,
            paused: true,
            volume: 1.0,
        }
    }

    fn stop_all(&mut self) {
        if let Some((_, s)) = self.current.take() {
            s.stop();
        }
        if let Some((_, s)) = self.pending.take() {
            s.stop();
        }
        self.offset = Duration::ZERO;
        self.paused = true;
    }
}

pub(super) fn spawn_audio_thread(
    rx: Receiver<AudioCmd>,
    events: Sender<TaggedEvent>,
    audio_settings: AudioSettings,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let stream = match OutputStreamBuilder::open_default_stream() {
            Ok(mut s) => {
                // rodio logs to stderr when OutputStream is dropped, which would
                // scribble over the TUI.
                s.log_on_drop(false);
                Some(s)
            }
            Err(e) => {
                error!(error = %e, "no audio output device");
                None
            }
        };

        let tick = Duration::from_millis(audio_settings.position_interval_ms.max(20));
        let mut deck = Deck::new();

        loop {
            match rx.recv_timeout(tick) {
                Ok(AudioCmd::Load { path, reply }) => {
                    let result = match stream.as_ref() {
                        Some(stream) => create_sink_at(stream, &path, Duration::ZERO),
                        None => Err(EngineError(NO_OUTPUT.to_string())),
                    };
                    match result {
                        Ok(sink) => {
                            debug!(path = %path.display(), "loaded");
                            sink.set_volume(deck.volume);
                            if let Some((_, old)) = deck.pending.replace((path, sink)) {
                                old.stop();
                            }
                            deck.generation += 1;
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                }

                Ok(AudioCmd::Play) => {
                    if stream.is_none() {
                        if !report_error(&events, deck.generation, NO_OUTPUT) {
                            break;
                        }
                        continue;
                    }
                    if let Some((path, new_sink)) = deck.pending.take() {
                        if let Some((_, old_sink)) = deck.current.take() {
                            if deck.paused {
                                old_sink.stop();
                            } else {
                                crossfade(&old_sink, &new_sink, deck.volume, &audio_settings);
                            }
                        }
                        new_sink.play();
                        deck.current = Some((path, new_sink));
                        deck.offset = Duration::ZERO;
                    } else if let Some((_, s)) = deck.current.as_ref() {
                        s.play();
                    }
                    deck.paused = deck.current.is_none();
                }

                Ok(AudioCmd::Pause) => {
                    if let Some((_, s)) = deck.current.as_ref() {
                        s.pause();
                    }
                    deck.paused = true;
                }

                Ok(AudioCmd::Stop) => deck.stop_all(),

                Ok(AudioCmd::Seek(position)) => {
                    // Rebuild the current sink and skip into the file.
                    // `Source::skip_duration` works for the common formats.
                    let Some(stream) = stream.as_ref() else {
                        if !report_error(&events, deck.generation, NO_OUTPUT) {
                            break;
                        }
                        continue;
                    };
                    let Some((path, old_sink)) = deck.current.take() else {
                        continue;
                    };
                    match create_sink_at(stream, &path, position) {
                        Ok(new_sink) => {
                            old_sink.stop();
                            new_sink.set_volume(deck.volume);
                            if !deck.paused {
                                new_sink.play();
                            }
                            deck.current = Some((path, new_sink));
                            deck.offset = position;
                        }
                        Err(e) => {
                            warn!(error = %e, "seek failed, keeping the current position");
                            deck.current = Some((path, old_sink));
                        }
                    }
                }

                Ok(AudioCmd::SetVolume(v)) => {
                    deck.volume = v.clamp(0.0, 1.0);
                    if let Some((_, s)) = deck.current.as_ref() {
                        s.set_volume(deck.volume);
                    }
                    if let Some((_, s)) = deck.pending.as_ref() {
                        s.set_volume(deck.volume);
                    }
                }

                Ok(AudioCmd::Quit { fade_out_ms }) => {
                    if let Some((_, s)) = deck.current.as_ref() {
                        if !deck.paused {
                            fade_out_sink(s, fade_out_ms, deck.volume);
                        }
                    }
                    deck.stop_all();
                    break;
                }

                Err(RecvTimeoutError::Timeout) => {
                    if deck.paused {
                        continue;
                    }
                    let event = match deck.current.as_ref() {
                        Some((_, s)) if s.empty() => EngineEvent::Finished,
                        Some((_, s)) => EngineEvent::Position(deck.offset + s.get_pos()),
                        None => continue,
                    };
                    if event == EngineEvent::Finished {
                        deck.current = None;
                        deck.paused = true;
                    }
                    if events.send((deck.generation, event)).is_err() {
                        break;
                    }
                }

                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    })
}

/// Tell the handle a command could not run. Returns `false` once the
/// handle has hung up.
fn report_error(events: &Sender<TaggedEvent>, generation: u64, message: &str) -> bool {
    warn!(generation, reason = message, "audio command failed");
    events
        .send((generation, EngineEvent::Error(message.to_string())))
        .is_ok()
}

/// Fade `old` out and `new` in over the configured crossfade window.
fn crossfade(old: &Sink, new: &Sink, volume: f32, audio_settings: &AudioSettings) {
    let crossfade_ms = audio_settings.crossfade_ms;
    if crossfade_ms == 0 {
        old.stop();
        return;
    }
    let steps = audio_settings.crossfade_steps.max(1);

    old.set_volume(volume);
    new.set_volume(0.0);
    new.play();

    // Short blocking loop; audio keeps flowing in rodio's mixer thread.
    for step in 1..=steps {
        let t = (step as f32) / (steps as f32);
        old.set_volume(volume * (1.0 - t));
        new.set_volume(volume * t);
        thread::sleep(Duration::from_millis((crossfade_ms / steps).max(1)));
    }

    old.stop();
    new.set_volume(volume);
}

fn fade_out_sink(sink: &Sink, fade_out_ms: u64, volume: f32) {
    if fade_out_ms == 0 {
        sink.set_volume(0.0);
        return;
    }
    let steps: u64 = 20;
    let step_ms = (fade_out_ms / steps).max(1);
    for step in 1..=steps {
        let t = step as f32 / steps as f32;
        sink.set_volume(volume * (1.0 - t));
        thread::sleep(Duration::from_millis(step_ms));
    }
    sink.set_volume(0.0);
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn report_error_tags_the_event_with_the_current_load() {
        let (tx, rx) = mpsc::channel();
        assert!(report_error(&tx, 3, NO_OUTPUT));
        assert_eq!(rx.try_recv(), Ok((3, EngineEvent::Error(NO_OUTPUT.to_string()))));
    }

    #[test]
    fn report_error_notices_a_dropped_handle() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(!report_error(&tx, 0, NO_OUTPUT));
    }
}
