// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command queues: strictly sequential prompt lists against one project
//! directory, with continue/new session semantics per command.

use crate::id::{CommandId, EngineSessionId, QueueId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle status of a command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Running,
    Paused,
    Stopped,
    Completed,
    Failed,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Running => "running",
            QueueStatus::Paused => "paused",
            QueueStatus::Stopped => "stopped",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Per-command session policy: `continue` passes `--resume` to carry prior
/// session context; `new` starts fresh. Index 0 always starts fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Continue,
    New,
}

/// Lifecycle status of a queued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Replaces pending when a preceding command failed under stop-on-error
    /// or the queue was stopped.
    Skipped,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Running => "running",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
            CommandStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// One prompt in a command queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCommand {
    pub id: CommandId,
    /// Zero-based position in the queue; contiguous, re-indexed on
    /// remove/reorder.
    pub index: usize,
    pub prompt: String,
    pub session_mode: SessionMode,
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_session_id: Option<EngineSessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueCommand {
    pub fn new(
        id: impl Into<CommandId>,
        index: usize,
        prompt: impl Into<String>,
        session_mode: SessionMode,
    ) -> Self {
        Self {
            id: id.into(),
            index,
            prompt: prompt.into(),
            session_mode,
            status: CommandStatus::Pending,
            engine_session_id: None,
            cost_usd: None,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/// A named, strictly sequential list of prompts against one project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandQueue {
    pub id: QueueId,
    pub name: String,
    /// Absolute project directory every command runs in.
    pub project_path: PathBuf,
    pub status: QueueStatus,
    /// Engine session carried across `continue`-mode commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session_id: Option<EngineSessionId>,
    /// Cursor to the next unrun command (0-based).
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub commands: Vec<QueueCommand>,
    #[serde(default)]
    pub total_cost_usd: f64,
    /// Extra CLI arguments appended to every engine invocation.
    #[serde(default)]
    pub additional_args: Vec<String>,
    /// Whether a failed command skips the remainder and fails the queue.
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_stop_on_error() -> bool {
    true
}

impl CommandQueue {
    /// Create an empty queue in `pending` status.
    pub fn new(
        id: impl Into<QueueId>,
        name: impl Into<String>,
        project_path: impl Into<PathBuf>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            project_path: project_path.into(),
            status: QueueStatus::Pending,
            active_session_id: None,
            current_index: 0,
            commands: Vec::new(),
            total_cost_usd: 0.0,
            additional_args: Vec::new(),
            stop_on_error: true,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn command(&self, id: &str) -> Option<&QueueCommand> {
        self.commands.iter().find(|c| c.id == *id)
    }

    pub fn command_mut(&mut self, id: &str) -> Option<&mut QueueCommand> {
        self.commands.iter_mut().find(|c| c.id == *id)
    }

    /// Re-assign contiguous indices after a remove or reorder.
    pub fn reindex(&mut self) {
        for (i, cmd) in self.commands.iter_mut().enumerate() {
            cmd.index = i;
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
