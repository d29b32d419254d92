//! Structured match event stream.
//!
//! Discrete, typed events emitted while the controller runs, serialized as
//! newline-delimited JSON with a monotonically increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a controller run.
///
/// Tagged with `"type"` when serialized so consumers can dispatch on kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The controller tasks are running.
    ControllerStarted {
        /// When the controller started.
        timestamp: DateTime<Utc>,
        /// Bus source (device path or `"none"`).
        bus: String,
    },

    /// The controller has stopped.
    ControllerStopped {
        /// When the controller stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// A match phase has been entered.
    PhaseEntered {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Phase that was left.
        from: String,
        /// Phase that was entered.
        phase: String,
        /// Stream id selected for the phase.
        stream: u32,
    },

    /// A start press was accepted.
    StartRequested {
        /// When the press was processed.
        timestamp: DateTime<Utc>,
    },

    /// A match was settled.
    WinnerDecided {
        /// When the scores were settled.
        timestamp: DateTime<Utc>,
        /// `"player1"` or `"player2"`.
        winner: String,
        /// Settled weighted scores, player 1 first.
        scores: [u8; 2],
    },
}

/// Wraps an [`Event`] with its sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; events never stop a match.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::WinnerDecided {
            timestamp: Utc::now(),
            winner: "player1".to_owned(),
            scores: [80, 40],
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(parsed["type"], "WinnerDecided");
        assert_eq!(parsed["winner"], "player1");
        assert_eq!(parsed["scores"], serde_json::json!([80, 40]));
    }

    #[test]
    fn test_emitter_sequences_lines() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(Event::StartRequested {
            timestamp: Utc::now(),
        });
        emitter.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            from: "idle".to_owned(),
            phase: "countdown".to_owned(),
            stream: 1,
        });

        assert_eq!(emitter.event_count(), 2);
        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "StartRequested");
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["phase"], "countdown");
        assert_eq!(lines[1]["stream"], 1);
    }

    #[test]
    fn test_from_file_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let emitter = EventEmitter::from_file(&path).unwrap();
        emitter.emit(Event::ControllerStopped {
            timestamp: Utc::now(),
            reason: "signal".to_owned(),
        });
        drop(emitter);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"ControllerStopped\""));
        assert!(text.ends_with('\n'));
    }
}
