//! Discrete-event input feeding the [`SwitchStateStore`].
//!
//! The switch controller writes newline-delimited events (see
//! [`switch_state`](crate::switch_state) for the grammar) into a named pipe.
//! The relay loop drains whatever is pending at the start of every tick
//! without blocking: "no data" is the normal case, and a missing pipe only
//! means the controller is not running yet.

use std::io::{self, ErrorKind};
use std::path::PathBuf;

use tokio::net::unix::pipe;
use tracing::{info, warn};

use crate::switch_state::SwitchStateStore;

/// Errors surfaced by a discrete-event source.
#[derive(Debug, thiserror::Error)]
pub enum DiscreteSourceError {
    /// Reading an open input failed. The input has been closed and will be
    /// reopened on the next drain.
    #[error("discrete input read failed: {source}")]
    Read {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },
}

/// A non-blocking source of discrete switch events.
pub trait DiscreteEventSource: Send {
    /// Apply every complete event currently pending to `store`.
    ///
    /// Returns the number of complete lines consumed (recognised or not).
    /// Must never block; an absent or idle input yields `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscreteSourceError`] if an open input failed. The caller
    /// logs it and carries on with the tick.
    fn drain_into(&mut self, store: &SwitchStateStore) -> Result<usize, DiscreteSourceError>;

    /// Release any held handle. The next drain may reopen it.
    fn close(&mut self);
}

/// A source for deployments with no discrete feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscreteSource;

impl DiscreteEventSource for NoDiscreteSource {
    fn drain_into(&mut self, _store: &SwitchStateStore) -> Result<usize, DiscreteSourceError> {
        Ok(0)
    }

    fn close(&mut self) {}
}

/// Splits a byte stream into lines, carrying partial lines between reads.
///
/// A partial line longer than `max_line` is dropped together with the rest
/// of that line, up to its terminating newline.
#[derive(Debug)]
pub struct LineFramer {
    pending: Vec<u8>,
    max_line: usize,
    skipping: bool,
}

impl LineFramer {
    /// Create a framer that keeps at most `max_line` bytes of a partial
    /// line.
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::with_capacity(max_line),
            max_line,
            skipping: false,
        }
    }

    /// Feed bytes, calling `on_line` for every completed line. Returns the
    /// number of completed lines.
    pub fn push(&mut self, bytes: &[u8], mut on_line: impl FnMut(&str)) -> usize {
        let mut lines: usize = 0;
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            if self.skipping {
                self.skipping = false;
            } else {
                self.pending.extend_from_slice(head);
                on_line(&String::from_utf8_lossy(&self.pending));
                lines = lines.saturating_add(1);
            }
            self.pending.clear();
            // `tail` starts with the newline itself.
            rest = tail.get(1..).unwrap_or_default();
        }

        if !self.skipping {
            self.pending.extend_from_slice(rest);
            if self.pending.len() > self.max_line {
                self.pending.clear();
                self.skipping = true;
            }
        }
        lines
    }

    /// Discard any partial line.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.skipping = false;
    }
}

/// Reads events from a named pipe opened in non-blocking mode.
pub struct FifoEventSource {
    path: PathBuf,
    receiver: Option<pipe::Receiver>,
    buffer: Vec<u8>,
    framer: LineFramer,
    reported_unavailable: bool,
}

impl FifoEventSource {
    /// Create a source for the pipe at `path`. Nothing is opened until the
    /// first drain.
    pub fn new(path: impl Into<PathBuf>, read_buffer_bytes: usize, max_line_bytes: usize) -> Self {
        Self {
            path: path.into(),
            receiver: None,
            buffer: vec![0; read_buffer_bytes.max(1)],
            framer: LineFramer::new(max_line_bytes),
            reported_unavailable: false,
        }
    }

    /// Whether the pipe is currently open.
    pub const fn is_open(&self) -> bool {
        self.receiver.is_some()
    }

    fn try_open(&mut self) {
        match pipe::OpenOptions::new().open_receiver(&self.path) {
            Ok(receiver) => {
                info!(path = %self.path.display(), "Connected to switch pipe");
                self.receiver = Some(receiver);
                self.reported_unavailable = false;
            }
            Err(e) => {
                // Warn once per outage; the pipe is retried every tick.
                if !self.reported_unavailable {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Switch pipe unavailable, will retry"
                    );
                    self.reported_unavailable = true;
                }
            }
        }
    }
}

impl DiscreteEventSource for FifoEventSource {
    fn drain_into(&mut self, store: &SwitchStateStore) -> Result<usize, DiscreteSourceError> {
        if self.receiver.is_none() {
            self.try_open();
        }
        let Some(receiver) = self.receiver.as_ref() else {
            return Ok(0);
        };

        match receiver.try_read(&mut self.buffer) {
            Ok(0) => Ok(0),
            Ok(n) => {
                let chunk = self.buffer.get(..n).unwrap_or_default();
                let lines = self.framer.push(chunk, |line| {
                    store.apply_event(line);
                });
                Ok(lines)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(0)
            }
            Err(e) => {
                self.close();
                Err(DiscreteSourceError::Read { source: e })
            }
        }
    }

    fn close(&mut self) {
        if self.receiver.take().is_some() {
            info!(path = %self.path.display(), "Switch pipe closed");
        }
        self.framer.reset();
    }
}

impl core::fmt::Debug for FifoEventSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FifoEventSource")
            .field("path", &self.path)
            .field("open", &self.receiver.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn collect(framer: &mut LineFramer, bytes: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        framer.push(bytes, |line| out.push(line.to_owned()));
        out
    }

    #[test]
    fn splits_multiple_lines_in_one_read() {
        let mut framer = LineFramer::new(64);
        let lines = collect(&mut framer, b"1 Open\n2 Close\nENABLE FIRE\n");
        assert_eq!(lines, ["1 Open", "2 Close", "ENABLE FIRE"]);
    }

    #[test]
    fn carries_partial_line_into_next_read() {
        let mut framer = LineFramer::new(64);
        assert!(collect(&mut framer, b"ABORT O").is_empty());
        assert_eq!(collect(&mut framer, b"pen\n3 Op"), ["ABORT Open"]);
        assert_eq!(collect(&mut framer, b"en\n"), ["3 Open"]);
    }

    #[test]
    fn drops_overlong_partial_line_until_newline() {
        let mut framer = LineFramer::new(8);
        assert!(collect(&mut framer, b"0123456789").is_empty());
        assert!(collect(&mut framer, b"abcdef").is_empty());
        // The tail of the oversized line is discarded, the next line is not.
        assert_eq!(collect(&mut framer, b"xyz\n4 Open\n"), ["4 Open"]);
    }

    #[test]
    fn reset_discards_partial_line() {
        let mut framer = LineFramer::new(64);
        collect(&mut framer, b"5 Op");
        framer.reset();
        assert_eq!(collect(&mut framer, b"6 Open\n"), ["6 Open"]);
    }

    #[test]
    fn framed_lines_update_store() {
        let store = SwitchStateStore::new();
        let mut framer = LineFramer::new(64);
        let n = framer.push(b"1 Open\ngarbage\n\n9 Open\n", |line| {
            store.apply_event(line);
        });
        assert_eq!(n, 4);
        let state = store.current_state();
        assert!(state.switch1);
        assert!(state.switch9);
        assert!(!state.switch2);
    }

    #[tokio::test]
    async fn missing_pipe_is_not_an_error() {
        let store = SwitchStateStore::new();
        let mut source = FifoEventSource::new("/nonexistent/groundlink/switch_pipe", 1024, 256);
        assert_eq!(source.drain_into(&store).unwrap(), 0);
        assert!(!source.is_open());
        // Retried on the next drain without failing.
        assert_eq!(source.drain_into(&store).unwrap(), 0);
        source.close();
    }

    #[test]
    fn no_discrete_source_is_idle() {
        let store = SwitchStateStore::new();
        let mut source = NoDiscreteSource;
        assert_eq!(source.drain_into(&store).unwrap(), 0);
        assert_eq!(store.current_state(), groundlink_types::DiscreteChannelSet::new());
    }
}
