//! Bounded rolling text log shown to the user.
//!
//! The buffer keeps only the most recent [`MAX_LOG_LINES`] lines.  Appending
//! a line when the buffer is full evicts the oldest one, so the user always
//! sees the latest few status messages ("Connecting...", "No device found.")
//! without the log growing without bound.
//!
//! A single append may contain embedded newlines; each embedded line counts
//! against the limit separately.

use std::collections::VecDeque;

/// Number of lines retained by [`LogBuffer::new`].
pub const MAX_LOG_LINES: usize = 3;

/// FIFO buffer holding at most `limit` lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    limit: usize,
}

impl LogBuffer {
    /// Creates an empty buffer holding at most [`MAX_LOG_LINES`] lines.
    pub fn new() -> Self {
        Self::with_limit(MAX_LOG_LINES)
    }

    /// Creates an empty buffer holding at most `limit` lines.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    /// Appends `text`, then drops the oldest lines until the limit holds.
    ///
    /// Blank input adds nothing.
    pub fn push(&mut self, text: &str) {
        for line in text.lines() {
            self.lines.push_back(line.to_string());
        }
        while self.lines.len() > self.limit {
            self.lines.pop_front();
        }
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Returns the buffered lines joined by `\n`, trimmed of surrounding
    /// whitespace.
    pub fn text(&self) -> String {
        let joined = self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
        joined.trim().to_string()
    }

    /// Iterates over the buffered lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
