// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SDK events carried on the event bus and streamed to SSE clients.
//!
//! Serializes with `{"type": "tool_started", ...fields}` format and camelCase
//! field names — the wire shape SSE consumers filter on. Three families:
//! session (monitor-derived), group (group runner), queue (queue runner).

use crate::group::BudgetAction;
use crate::monitor_event::{MessageRole, TaskEntry};
use crate::progress::{GroupProgress, SessionProgress};
use crate::queue::SessionMode;
use crate::session::SessionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why the group runner paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Manual,
    BudgetExceeded,
    ErrorThreshold,
}

impl std::fmt::Display for PauseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PauseReason::Manual => "manual",
            PauseReason::BudgetExceeded => "budget_exceeded",
            PauseReason::ErrorThreshold => "error_threshold",
        };
        write!(f, "{}", s)
    }
}

/// Events published on the process-wide bus.
///
/// Every variant carries an ISO timestamp; most carry a resource id
/// (`sessionId` / `groupId` / `queueId`) used for per-connection filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SdkEvent {
    // -- session --
    #[serde(rename = "session_started")]
    SessionStarted {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "session_ended")]
    SessionEnded {
        session_id: String,
        status: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "message_received")]
    MessageReceived {
        session_id: String,
        role: MessageRole,
        content: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "tool_started")]
    ToolStarted {
        session_id: String,
        tool: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "tool_completed")]
    ToolCompleted {
        session_id: String,
        tool: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "tasks_updated")]
    TasksUpdated {
        session_id: String,
        tasks: Vec<TaskEntry>,
        timestamp: DateTime<Utc>,
    },

    // -- group --
    #[serde(rename = "group_created")]
    GroupCreated {
        group_id: String,
        name: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_started")]
    GroupStarted {
        group_id: String,
        total_sessions: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_completed")]
    GroupCompleted {
        group_id: String,
        completed: usize,
        failed: usize,
        total_cost_usd: f64,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_paused")]
    GroupPaused {
        group_id: String,
        running_sessions: usize,
        reason: PauseReason,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_resumed")]
    GroupResumed {
        group_id: String,
        pending_sessions: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_failed")]
    GroupFailed {
        group_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_session_started")]
    GroupSessionStarted {
        group_id: String,
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_session_completed")]
    GroupSessionCompleted {
        group_id: String,
        session_id: String,
        status: SessionStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_session_failed")]
    GroupSessionFailed {
        group_id: String,
        session_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "budget_warning")]
    BudgetWarning {
        group_id: String,
        cost_usd: f64,
        max_budget_usd: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "budget_exceeded")]
    BudgetExceeded {
        group_id: String,
        cost_usd: f64,
        max_budget_usd: f64,
        action: BudgetAction,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "dependency_waiting")]
    DependencyWaiting {
        group_id: String,
        session_id: String,
        waiting_on: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "dependency_resolved")]
    DependencyResolved {
        group_id: String,
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "session_progress")]
    SessionProgress {
        group_id: String,
        session_id: String,
        progress: SessionProgress,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "group_progress")]
    GroupProgress {
        group_id: String,
        progress: GroupProgress,
        timestamp: DateTime<Utc>,
    },

    // -- queue --
    #[serde(rename = "queue_created")]
    QueueCreated {
        queue_id: String,
        name: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "queue_started")]
    QueueStarted {
        queue_id: String,
        total_commands: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "queue_paused")]
    QueuePaused {
        queue_id: String,
        current_command_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "queue_resumed")]
    QueueResumed {
        queue_id: String,
        from_command_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "queue_stopped")]
    QueueStopped {
        queue_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "queue_completed")]
    QueueCompleted {
        queue_id: String,
        completed_commands: usize,
        failed_commands: usize,
        total_cost_usd: f64,
        total_duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "queue_failed")]
    QueueFailed {
        queue_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failed_command_index: Option<usize>,
        error: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_started")]
    CommandStarted {
        queue_id: String,
        command_id: String,
        index: usize,
        prompt: String,
        session_mode: SessionMode,
        is_new_session: bool,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_completed")]
    CommandCompleted {
        queue_id: String,
        command_id: String,
        index: usize,
        cost_usd: f64,
        engine_session_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_failed")]
    CommandFailed {
        queue_id: String,
        command_id: String,
        index: usize,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_added")]
    CommandAdded {
        queue_id: String,
        command_id: String,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_updated")]
    CommandUpdated {
        queue_id: String,
        command_id: String,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_removed")]
    CommandRemoved {
        queue_id: String,
        command_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_reordered")]
    CommandReordered {
        queue_id: String,
        command_id: String,
        from_index: usize,
        to_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "command_mode_changed")]
    CommandModeChanged {
        queue_id: String,
        command_id: String,
        session_mode: SessionMode,
        timestamp: DateTime<Utc>,
    },
}

/// Every event type tag, in declaration order.
///
/// SSE connections subscribe to each of these; keep in sync with the enum.
pub const ALL_EVENT_TYPES: &[&str] = &[
    "session_started",
    "session_ended",
    "message_received",
    "tool_started",
    "tool_completed",
    "tasks_updated",
    "group_created",
    "group_started",
    "group_completed",
    "group_paused",
    "group_resumed",
    "group_failed",
    "group_session_started",
    "group_session_completed",
    "group_session_failed",
    "budget_warning",
    "budget_exceeded",
    "dependency_waiting",
    "dependency_resolved",
    "session_progress",
    "group_progress",
    "queue_created",
    "queue_started",
    "queue_paused",
    "queue_resumed",
    "queue_stopped",
    "queue_completed",
    "queue_failed",
    "command_started",
    "command_completed",
    "command_failed",
    "command_added",
    "command_updated",
    "command_removed",
    "command_reordered",
    "command_mode_changed",
];

impl SdkEvent {
    /// The serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            SdkEvent::SessionStarted { .. } => "session_started",
            SdkEvent::SessionEnded { .. } => "session_ended",
            SdkEvent::MessageReceived { .. } => "message_received",
            SdkEvent::ToolStarted { .. } => "tool_started",
            SdkEvent::ToolCompleted { .. } => "tool_completed",
            SdkEvent::TasksUpdated { .. } => "tasks_updated",
            SdkEvent::GroupCreated { .. } => "group_created",
            SdkEvent::GroupStarted { .. } => "group_started",
            SdkEvent::GroupCompleted { .. } => "group_completed",
            SdkEvent::GroupPaused { .. } => "group_paused",
            SdkEvent::GroupResumed { .. } => "group_resumed",
            SdkEvent::GroupFailed { .. } => "group_failed",
            SdkEvent::GroupSessionStarted { .. } => "group_session_started",
            SdkEvent::GroupSessionCompleted { .. } => "group_session_completed",
            SdkEvent::GroupSessionFailed { .. } => "group_session_failed",
            SdkEvent::BudgetWarning { .. } => "budget_warning",
            SdkEvent::BudgetExceeded { .. } => "budget_exceeded",
            SdkEvent::DependencyWaiting { .. } => "dependency_waiting",
            SdkEvent::DependencyResolved { .. } => "dependency_resolved",
            SdkEvent::SessionProgress { .. } => "session_progress",
            SdkEvent::GroupProgress { .. } => "group_progress",
            SdkEvent::QueueCreated { .. } => "queue_created",
            SdkEvent::QueueStarted { .. } => "queue_started",
            SdkEvent::QueuePaused { .. } => "queue_paused",
            SdkEvent::QueueResumed { .. } => "queue_resumed",
            SdkEvent::QueueStopped { .. } => "queue_stopped",
            SdkEvent::QueueCompleted { .. } => "queue_completed",
            SdkEvent::QueueFailed { .. } => "queue_failed",
            SdkEvent::CommandStarted { .. } => "command_started",
            SdkEvent::CommandCompleted { .. } => "command_completed",
            SdkEvent::CommandFailed { .. } => "command_failed",
            SdkEvent::CommandAdded { .. } => "command_added",
            SdkEvent::CommandUpdated { .. } => "command_updated",
            SdkEvent::CommandRemoved { .. } => "command_removed",
            SdkEvent::CommandReordered { .. } => "command_reordered",
            SdkEvent::CommandModeChanged { .. } => "command_mode_changed",
        }
    }

    /// The `sessionId` field, when the variant carries one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SdkEvent::SessionStarted { session_id, .. }
            | SdkEvent::SessionEnded { session_id, .. }
            | SdkEvent::MessageReceived { session_id, .. }
            | SdkEvent::ToolStarted { session_id, .. }
            | SdkEvent::ToolCompleted { session_id, .. }
            | SdkEvent::TasksUpdated { session_id, .. }
            | SdkEvent::GroupSessionStarted { session_id, .. }
            | SdkEvent::GroupSessionCompleted { session_id, .. }
            | SdkEvent::GroupSessionFailed { session_id, .. }
            | SdkEvent::DependencyWaiting { session_id, .. }
            | SdkEvent::DependencyResolved { session_id, .. }
            | SdkEvent::SessionProgress { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// The `groupId` field, when the variant carries one.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            SdkEvent::GroupCreated { group_id, .. }
            | SdkEvent::GroupStarted { group_id, .. }
            | SdkEvent::GroupCompleted { group_id, .. }
            | SdkEvent::GroupPaused { group_id, .. }
            | SdkEvent::GroupResumed { group_id, .. }
            | SdkEvent::GroupFailed { group_id, .. }
            | SdkEvent::GroupSessionStarted { group_id, .. }
            | SdkEvent::GroupSessionCompleted { group_id, .. }
            | SdkEvent::GroupSessionFailed { group_id, .. }
            | SdkEvent::BudgetWarning { group_id, .. }
            | SdkEvent::BudgetExceeded { group_id, .. }
            | SdkEvent::DependencyWaiting { group_id, .. }
            | SdkEvent::DependencyResolved { group_id, .. }
            | SdkEvent::SessionProgress { group_id, .. }
            | SdkEvent::GroupProgress { group_id, .. } => Some(group_id),
            _ => None,
        }
    }

    /// The `queueId` field, when the variant carries one.
    pub fn queue_id(&self) -> Option<&str> {
        match self {
            SdkEvent::QueueCreated { queue_id, .. }
            | SdkEvent::QueueStarted { queue_id, .. }
            | SdkEvent::QueuePaused { queue_id, .. }
            | SdkEvent::QueueResumed { queue_id, .. }
            | SdkEvent::QueueStopped { queue_id, .. }
            | SdkEvent::QueueCompleted { queue_id, .. }
            | SdkEvent::QueueFailed { queue_id, .. }
            | SdkEvent::CommandStarted { queue_id, .. }
            | SdkEvent::CommandCompleted { queue_id, .. }
            | SdkEvent::CommandFailed { queue_id, .. }
            | SdkEvent::CommandAdded { queue_id, .. }
            | SdkEvent::CommandUpdated { queue_id, .. }
            | SdkEvent::CommandRemoved { queue_id, .. }
            | SdkEvent::CommandReordered { queue_id, .. }
            | SdkEvent::CommandModeChanged { queue_id, .. } => Some(queue_id),
            _ => None,
        }
    }

    /// The event's ISO timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SdkEvent::SessionStarted { timestamp, .. }
            | SdkEvent::SessionEnded { timestamp, .. }
            | SdkEvent::MessageReceived { timestamp, .. }
            | SdkEvent::ToolStarted { timestamp, .. }
            | SdkEvent::ToolCompleted { timestamp, .. }
            | SdkEvent::TasksUpdated { timestamp, .. }
            | SdkEvent::GroupCreated { timestamp, .. }
            | SdkEvent::GroupStarted { timestamp, .. }
            | SdkEvent::GroupCompleted { timestamp, .. }
            | SdkEvent::GroupPaused { timestamp, .. }
            | SdkEvent::GroupResumed { timestamp, .. }
            | SdkEvent::GroupFailed { timestamp, .. }
            | SdkEvent::GroupSessionStarted { timestamp, .. }
            | SdkEvent::GroupSessionCompleted { timestamp, .. }
            | SdkEvent::GroupSessionFailed { timestamp, .. }
            | SdkEvent::BudgetWarning { timestamp, .. }
            | SdkEvent::BudgetExceeded { timestamp, .. }
            | SdkEvent::DependencyWaiting { timestamp, .. }
            | SdkEvent::DependencyResolved { timestamp, .. }
            | SdkEvent::SessionProgress { timestamp, .. }
            | SdkEvent::GroupProgress { timestamp, .. }
            | SdkEvent::QueueCreated { timestamp, .. }
            | SdkEvent::QueueStarted { timestamp, .. }
            | SdkEvent::QueuePaused { timestamp, .. }
            | SdkEvent::QueueResumed { timestamp, .. }
            | SdkEvent::QueueStopped { timestamp, .. }
            | SdkEvent::QueueCompleted { timestamp, .. }
            | SdkEvent::QueueFailed { timestamp, .. }
            | SdkEvent::CommandStarted { timestamp, .. }
            | SdkEvent::CommandCompleted { timestamp, .. }
            | SdkEvent::CommandFailed { timestamp, .. }
            | SdkEvent::CommandAdded { timestamp, .. }
            | SdkEvent::CommandUpdated { timestamp, .. }
            | SdkEvent::CommandRemoved { timestamp, .. }
            | SdkEvent::CommandReordered { timestamp, .. }
            | SdkEvent::CommandModeChanged { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
