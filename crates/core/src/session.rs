// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group member sessions and token accounting.
//!
//! A session is one invocation of the engine in one working directory. The
//! engine assigns its own session id once started; until then only the
//! group-local [`SessionId`] exists.

use crate::id::{EngineSessionId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle status of a group member session.
///
/// Transitions: pending → active → (completed | failed | paused); the runner
/// alone moves sessions between paused and active. Completed and failed are
/// terminal for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Token usage reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<u64>,
}

impl TokenUsage {
    /// Accumulate another usage record into this one (saturating).
    pub fn add(&mut self, other: &TokenUsage) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
        if let Some(r) = other.cache_read {
            self.cache_read = Some(self.cache_read.unwrap_or(0).saturating_add(r));
        }
        if let Some(w) = other.cache_write {
            self.cache_write = Some(self.cache_write.unwrap_or(0).saturating_add(w));
        }
    }

    /// Total tokens across all fields.
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_read.unwrap_or(0))
            .saturating_add(self.cache_write.unwrap_or(0))
    }
}

/// One engine invocation within a session group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Absolute working directory the engine runs in.
    pub project_path: PathBuf,
    pub prompt: String,
    pub status: SessionStatus,
    /// Ids of sessions that must complete before this one may start.
    /// Ids not present in the group are treated as never satisfied.
    #[serde(default)]
    pub depends_on: Vec<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_session_id: Option<EngineSessionId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// USD, non-negative; consumed from engine output as received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
}

impl Session {
    /// Create a pending session with no dependencies.
    pub fn new(
        id: impl Into<SessionId>,
        project_path: impl Into<PathBuf>,
        prompt: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            project_path: project_path.into(),
            prompt: prompt.into(),
            status: SessionStatus::Pending,
            depends_on: Vec::new(),
            engine_session_id: None,
            created_at,
            started_at: None,
            completed_at: None,
            cost_usd: None,
            tokens: None,
        }
    }

    /// Builder-style dependency list.
    pub fn with_depends_on(mut self, deps: Vec<SessionId>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Failed
        )
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
