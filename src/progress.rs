//! Progress reporting capability.
//!
//! A single [`ProgressSink`] is injected into the acquirer and the assembly
//! engine; the messaging front-end decides what the updates look like. The
//! bounded-rate gate lives in [`ThrottledSink`] so neither component carries
//! its own throttling logic.

use crate::config::ProgressConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One progress observation from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// A human-readable stage change ("Collecting 2/3", "Assembling", ...).
    Status(String),
    /// Bytes transferred during a download or upload.
    Transfer { done: u64, total: Option<u64> },
    /// Media time the assembly process has produced so far.
    MediaTime { elapsed: Duration },
    /// The request reached a terminal state successfully.
    Done,
}

/// Capability for receiving progress updates.
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: ProgressUpdate);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _update: ProgressUpdate) {}
}

/// Sink that logs updates through tracing. Used by the CLI front-end.
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn update(&self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::Status(status) => tracing::info!("{status}"),
            ProgressUpdate::Transfer { done, total } => match total {
                Some(total) => tracing::info!("transferred {done}/{total} bytes"),
                None => tracing::info!("transferred {done} bytes"),
            },
            ProgressUpdate::MediaTime { elapsed } => {
                tracing::info!("assembled {:.1}s of media", elapsed.as_secs_f64())
            }
            ProgressUpdate::Done => tracing::info!("Done"),
        }
    }
}

#[derive(Debug)]
struct GateState {
    last_emit: Option<Instant>,
    last_bytes: u64,
    last_media: Duration,
}

/// Bounded-rate wrapper around another sink.
///
/// Transfer updates pass only when both the byte gate and the wall-clock
/// interval gate have opened since the last emitted update; media-time
/// updates gate on media time instead of bytes. Status updates, completion
/// updates (`done == total`), and the first update of each stage always pass.
pub struct ThrottledSink {
    inner: Arc<dyn ProgressSink>,
    byte_step: u64,
    media_step: Duration,
    min_interval: Duration,
    state: Mutex<GateState>,
}

impl ThrottledSink {
    pub fn new(inner: Arc<dyn ProgressSink>, config: &ProgressConfig) -> Self {
        Self {
            inner,
            byte_step: config.byte_step,
            media_step: Duration::from_secs(config.media_time_step_secs),
            min_interval: Duration::from_secs(config.min_interval_secs),
            state: Mutex::new(GateState {
                last_emit: None,
                last_bytes: 0,
                last_media: Duration::ZERO,
            }),
        }
    }

    fn interval_open(&self, state: &GateState, now: Instant) -> bool {
        match state.last_emit {
            Some(last) => now.duration_since(last) >= self.min_interval,
            None => true,
        }
    }
}

impl ProgressSink for ThrottledSink {
    fn update(&self, update: ProgressUpdate) {
        let now = Instant::now();
        let mut state = self.state.lock();

        let pass = match &update {
            // Stage changes always pass and reset the gates for the next stage.
            ProgressUpdate::Status(_) | ProgressUpdate::Done => {
                state.last_emit = None;
                state.last_bytes = 0;
                state.last_media = Duration::ZERO;
                true
            }
            ProgressUpdate::Transfer { done, total } => {
                let completing = total.map(|t| *done >= t).unwrap_or(false);
                let first = state.last_emit.is_none();
                if completing
                    || first
                    || (done.saturating_sub(state.last_bytes) >= self.byte_step
                        && self.interval_open(&state, now))
                {
                    state.last_emit = Some(now);
                    state.last_bytes = *done;
                    true
                } else {
                    false
                }
            }
            ProgressUpdate::MediaTime { elapsed } => {
                let first = state.last_emit.is_none();
                if first
                    || (elapsed.saturating_sub(state.last_media) >= self.media_step
                        && self.interval_open(&state, now))
                {
                    state.last_emit = Some(now);
                    state.last_media = *elapsed;
                    true
                } else {
                    false
                }
            }
        };

        drop(state);

        if pass {
            self.inner.update(update);
        }
    }
}

/// Render the transfer-progress line shown to the requester.
///
/// Format: a ten-dot bar, percent, MB done/total, speed, and ETA.
pub fn render_transfer_line(done: u64, total: u64, elapsed: Duration) -> String {
    let fraction = if total > 0 {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * 10.0).round() as usize;

    let mb = |bytes: u64| bytes as f64 / (1024.0 * 1024.0);
    let secs = elapsed.as_secs_f64();
    let speed = if secs > 0.0 { mb(done) / secs } else { 0.0 };
    let eta = if speed > 0.0 && total > done {
        (mb(total - done) / speed).round() as u64
    } else {
        0
    };

    format!(
        "[{}{}] {:.1}% • {:.1}/{:.1} MB • {:.2} MB/s • ETA {}s",
        "■".repeat(filled),
        "□".repeat(10 - filled),
        fraction * 100.0,
        mb(done),
        mb(total),
        speed,
        eta
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct Recorder(PlMutex<Vec<ProgressUpdate>>);

    impl ProgressSink for Recorder {
        fn update(&self, update: ProgressUpdate) {
            self.0.lock().push(update);
        }
    }

    fn throttled(byte_step: u64, min_interval_secs: u64) -> (Arc<Recorder>, ThrottledSink) {
        let recorder = Arc::new(Recorder::default());
        let sink = ThrottledSink::new(
            recorder.clone(),
            &ProgressConfig {
                byte_step,
                min_interval_secs,
                media_time_step_secs: 2,
            },
        );
        (recorder, sink)
    }

    #[test]
    fn first_transfer_update_passes() {
        let (recorder, sink) = throttled(1024, 3);
        sink.update(ProgressUpdate::Transfer {
            done: 1,
            total: Some(100),
        });
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[test]
    fn rapid_updates_are_suppressed() {
        let (recorder, sink) = throttled(1024, 3);
        for done in 1..50 {
            sink.update(ProgressUpdate::Transfer {
                done,
                total: Some(1_000_000),
            });
        }
        // Only the first one opened both gates.
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[test]
    fn completion_always_passes() {
        let (recorder, sink) = throttled(u64::MAX, 3600);
        sink.update(ProgressUpdate::Transfer {
            done: 1,
            total: Some(100),
        });
        sink.update(ProgressUpdate::Transfer {
            done: 100,
            total: Some(100),
        });
        assert_eq!(recorder.0.lock().len(), 2);
    }

    #[test]
    fn byte_gate_alone_is_not_enough() {
        // Byte step satisfied instantly, but the 3600s interval gate stays shut.
        let (recorder, sink) = throttled(1, 3600);
        sink.update(ProgressUpdate::Transfer {
            done: 1,
            total: Some(1_000_000),
        });
        sink.update(ProgressUpdate::Transfer {
            done: 500_000,
            total: Some(1_000_000),
        });
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[test]
    fn status_updates_bypass_gates() {
        let (recorder, sink) = throttled(u64::MAX, 3600);
        sink.update(ProgressUpdate::Status("Assembling".to_string()));
        sink.update(ProgressUpdate::Status("Uploading".to_string()));
        sink.update(ProgressUpdate::Done);
        assert_eq!(recorder.0.lock().len(), 3);
    }

    #[test]
    fn media_time_gates_on_media_step() {
        let (recorder, sink) = throttled(1024, 0);
        sink.update(ProgressUpdate::MediaTime {
            elapsed: Duration::from_secs(1),
        });
        sink.update(ProgressUpdate::MediaTime {
            elapsed: Duration::from_millis(1500),
        });
        sink.update(ProgressUpdate::MediaTime {
            elapsed: Duration::from_secs(4),
        });
        assert_eq!(recorder.0.lock().len(), 2);
    }

    #[test]
    fn render_line_midway() {
        let line = render_transfer_line(
            12 * 1024 * 1024,
            30 * 1024 * 1024,
            Duration::from_secs(6),
        );
        assert!(line.contains("40.0%"), "line: {line}");
        assert!(line.contains("12.0/30.0 MB"), "line: {line}");
        assert!(line.contains("2.00 MB/s"), "line: {line}");
        assert!(line.contains("ETA 9s"), "line: {line}");
    }

    #[test]
    fn render_line_handles_zero_total() {
        let line = render_transfer_line(0, 0, Duration::ZERO);
        assert!(line.contains("0.0%"));
    }
}
