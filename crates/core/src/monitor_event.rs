// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! High-level monitor events synthesized from raw transcript lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Terminal status of a subagent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubagentStatus {
    Completed,
    Failed,
}

/// State of a task list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Running,
    Completed,
    Error,
}

impl TaskState {
    /// Parse a transcript status string; unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(TaskState::Running),
            "completed" => Some(TaskState::Completed),
            "error" => Some(TaskState::Error),
            _ => None,
        }
    }
}

/// One validated entry of a `todo_write` task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub summary: String,
    pub status: TaskState,
}

/// Events reconstructed from an engine session transcript.
///
/// Serializes with `{"type": "tool_start", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MonitorEvent {
    #[serde(rename = "tool_start")]
    ToolStart {
        session_id: String,
        tool: String,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "tool_end")]
    ToolEnd {
        session_id: String,
        tool: String,
        /// Clamped to zero when the result timestamp precedes the start.
        duration_ms: u64,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "subagent_start")]
    SubagentStart {
        session_id: String,
        agent_id: String,
        agent_type: String,
        description: String,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "subagent_end")]
    SubagentEnd {
        session_id: String,
        agent_id: String,
        status: SubagentStatus,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "message")]
    Message {
        session_id: String,
        role: MessageRole,
        content: String,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "task_update")]
    TaskUpdate {
        session_id: String,
        tasks: Vec<TaskEntry>,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "session_end")]
    SessionEnd {
        session_id: String,
        status: String,
        ts: DateTime<Utc>,
    },
}

impl MonitorEvent {
    pub fn session_id(&self) -> &str {
        match self {
            MonitorEvent::ToolStart { session_id, .. }
            | MonitorEvent::ToolEnd { session_id, .. }
            | MonitorEvent::SubagentStart { session_id, .. }
            | MonitorEvent::SubagentEnd { session_id, .. }
            | MonitorEvent::Message { session_id, .. }
            | MonitorEvent::TaskUpdate { session_id, .. }
            | MonitorEvent::SessionEnd { session_id, .. } => session_id,
        }
    }

    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            MonitorEvent::ToolStart { ts, .. }
            | MonitorEvent::ToolEnd { ts, .. }
            | MonitorEvent::SubagentStart { ts, .. }
            | MonitorEvent::SubagentEnd { ts, .. }
            | MonitorEvent::Message { ts, .. }
            | MonitorEvent::TaskUpdate { ts, .. }
            | MonitorEvent::SessionEnd { ts, .. } => *ts,
        }
    }
}

#[cfg(test)]
#[path = "monitor_event_tests.rs"]
mod tests;
