//! LogAggregator: the rolling status log shown on the main and gallery screens.
//!
//! Every line is mirrored to `tracing` and appended to a [`LogBuffer`] that
//! keeps only the three most recent lines.  After each mutation the trimmed
//! text is pushed to every registered observer.
//!
//! # Concurrency
//!
//! `append` is called from the orchestrator, from the discovery task, and from
//! error paths on arbitrary threads.  The buffer sits behind a `std::sync::Mutex`
//! and the broadcast happens while the lock is held, so observers always
//! receive updates in the same order the buffer saw them.  Observers must not
//! call back into the aggregator from `on_log_update`.

use std::sync::{Arc, Mutex, PoisonError};

use camlink_core::LogBuffer;
use tracing::info;

use super::observers::ObserverRegistry;

/// Bounded rolling text log broadcast to observers.
pub struct LogAggregator {
    buffer: Mutex<LogBuffer>,
    observers: Arc<ObserverRegistry>,
}

impl LogAggregator {
    pub fn new(observers: Arc<ObserverRegistry>) -> Self {
        Self::with_buffer(LogBuffer::new(), observers)
    }

    pub fn with_buffer(buffer: LogBuffer, observers: Arc<ObserverRegistry>) -> Self {
        Self {
            buffer: Mutex::new(buffer),
            observers,
        }
    }

    /// Appends `line`, evicting the oldest lines beyond the limit, and
    /// broadcasts the result.
    pub fn append(&self, line: &str) {
        info!(target: "camlink::status", "{line}");
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.push(line);
        self.observers.broadcast_log(&buffer.text());
    }

    /// Empties the log and broadcasts the empty text.
    pub fn clear(&self) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.clear();
        self.observers.broadcast_log(&buffer.text());
    }

    /// Current trimmed log text.
    pub fn text(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .text()
    }

    /// Number of lines currently held.
    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
