//! Progress-event stream over an assembly process's diagnostic output.
//!
//! ffmpeg writes status lines to stderr containing `time=HH:MM:SS.cc`
//! markers. [`ProgressEvents`] turns that stream into a lazy, finite,
//! non-restartable sequence of [`ProgressEvent`]s, keeping a bounded tail of
//! recent lines so a failing run can surface its diagnostics.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::ChildStderr;

/// Number of trailing diagnostic lines retained for error context.
pub const DEFAULT_TAIL_LINES: usize = 20;

/// One progress observation parsed from the diagnostic stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Media time the process has emitted so far.
    pub media_time: Duration,
}

/// Parse an ffmpeg `time=` marker out of a status line.
///
/// Returns `None` for lines without a marker and for `time=N/A`.
pub fn parse_time_marker(line: &str) -> Option<Duration> {
    let idx = line.find("time=")?;
    let value = line[idx + 5..]
        .split_whitespace()
        .next()?
        .trim_start_matches('-');

    // HH:MM:SS.cc, where HH may exceed two digits on long outputs.
    let mut parts = value.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    Some(Duration::from_secs_f64(
        (hours * 3600 + minutes * 60) as f64 + seconds,
    ))
}

/// Lazy sequence of progress events read from a child's stderr.
///
/// Each call to [`next`](Self::next) advances the underlying stream; once it
/// returns `None` the sequence is exhausted and only the diagnostic tail
/// remains.
pub struct ProgressEvents {
    lines: Lines<BufReader<ChildStderr>>,
    tail: VecDeque<String>,
    tail_cap: usize,
}

impl ProgressEvents {
    /// Wrap a child stderr stream, retaining up to `tail_cap` recent lines.
    pub fn new(stderr: ChildStderr, tail_cap: usize) -> Self {
        Self {
            lines: BufReader::new(stderr).lines(),
            tail: VecDeque::with_capacity(tail_cap),
            tail_cap,
        }
    }

    /// Read until the next line carrying a time marker, or end of stream.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => return None,
            };

            self.push_tail(&line);

            if let Some(media_time) = parse_time_marker(&line) {
                return Some(ProgressEvent { media_time });
            }
        }
    }

    /// The retained diagnostic tail, newest line last.
    pub fn tail(&self) -> String {
        let lines: Vec<&str> = self.tail.iter().map(String::as_str).collect();
        lines.join("\n")
    }

    fn push_tail(&mut self, line: &str) {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return;
        }
        if self.tail.len() == self.tail_cap {
            self.tail.pop_front();
        }
        self.tail.push_back(trimmed.to_string());
    }
}
