// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw transcript events, one per JSONL line of the engine's session log.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// One parsed line of an engine transcript.
///
/// `content` is lifted from the top-level `content` key, falling back to
/// `message.content` when absent. `raw` keeps the whole object so downstream
/// parsers can reach fields this projection drops.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    /// The record's `type` field (`user`, `assistant`, `tool_use`, …).
    pub kind: String,
    pub uuid: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub content: Option<Value>,
    pub raw: Value,
}

impl TranscriptEvent {
    /// Project a parsed JSON value into a transcript event.
    ///
    /// A missing or non-string `type` field yields an empty kind, which no
    /// downstream parser dispatches on.
    pub fn from_json(raw: Value) -> Self {
        let kind = raw
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let uuid = raw
            .get("uuid")
            .and_then(|v| v.as_str())
            .map(String::from);
        let timestamp = raw
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let content = raw
            .get("content")
            .cloned()
            .or_else(|| raw.get("message").and_then(|m| m.get("content")).cloned());
        Self {
            kind,
            uuid,
            timestamp,
            content,
            raw,
        }
    }
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
