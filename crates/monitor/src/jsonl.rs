// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental JSONL stream parsing.
//!
//! Chunks arrive at arbitrary byte boundaries; the parser buffers the final
//! partial line across feeds and silently drops empty or malformed lines.

use muster_core::TranscriptEvent;

/// Stateful line-oriented JSON parser.
#[derive(Debug, Default)]
pub struct JsonlParser {
    buffer: String,
}

impl JsonlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and parse every complete line it closes.
    ///
    /// Order-preserving; yields zero or more events per feed, never looking
    /// ahead of the last `\n`.
    pub fn feed(&mut self, chunk: &str) -> Vec<TranscriptEvent> {
        self.buffer.push_str(chunk);
        if !self.buffer.contains('\n') {
            return Vec::new();
        }

        let data = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        let mut parts = data.split('\n').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                // Final element is the (possibly empty) partial line
                self.buffer = part.to_string();
                break;
            }
            if let Some(event) = parse_line(part) {
                events.push(event);
            }
        }
        events
    }

    /// Parse whatever remains in the buffer as one line and clear it.
    pub fn flush(&mut self) -> Option<TranscriptEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }

    /// Bytes currently buffered waiting for a newline.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

fn parse_line(line: &str) -> Option<TranscriptEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Some(TranscriptEvent::from_json(value)),
        Err(_) => None,
    }
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
