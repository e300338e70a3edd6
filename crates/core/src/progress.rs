// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress records aggregated across a session group.

use crate::session::{SessionStatus, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-session progress as observed by the group runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub status: SessionStatus,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub tokens: TokenUsage,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl SessionProgress {
    pub fn new(status: SessionStatus) -> Self {
        Self {
            status,
            cost_usd: 0.0,
            tokens: TokenUsage::default(),
            message_count: 0,
            started_at: None,
            duration_ms: None,
        }
    }
}

/// Session counts by status bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub completed: usize,
    pub running: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Group-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressTotals {
    pub cost_usd: f64,
    pub tokens: TokenUsage,
    /// Milliseconds since the group started.
    pub elapsed_ms: u64,
    /// `elapsed / completed × remaining`, present once anything completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_ms: Option<u64>,
}

/// Aggregated progress for a whole group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProgress {
    pub counts: StatusCounts,
    pub totals: ProgressTotals,
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
