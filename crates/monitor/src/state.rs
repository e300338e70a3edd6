// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session aggregate state derived from monitor events.

use chrono::{DateTime, Utc};
use muster_core::{MonitorEvent, SubagentStatus, TaskState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A tool currently executing in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTool {
    pub tool: String,
    pub started_at: DateTime<Utc>,
}

/// Lifecycle state of a subagent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubagentRunStatus {
    Running,
    Completed,
    Failed,
}

/// A subagent observed in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubagentState {
    pub agent_id: String,
    pub agent_type: String,
    pub description: String,
    pub status: SubagentRunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A task list entry with its synthetic id (`task-{index}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: String,
    pub summary: String,
    pub status: TaskState,
}

/// Aggregate view of one session.
#[derive(Debug, Clone)]
pub struct SessionAggregate {
    pub session_id: String,
    pub active_tools: HashMap<String, ActiveTool>,
    pub subagents: HashMap<String, SubagentState>,
    pub tasks: Vec<TaskRecord>,
    pub message_count: u64,
    pub last_updated: DateTime<Utc>,
}

impl SessionAggregate {
    fn new(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            active_tools: HashMap::new(),
            subagents: HashMap::new(),
            tasks: Vec::new(),
            message_count: 0,
            last_updated: now,
        }
    }
}

/// Shared session state, updated on every monitor event.
///
/// Cheap to clone; clones share the aggregate map so a group's session
/// monitors can feed one manager.
#[derive(Clone, Default)]
pub struct StateManager {
    sessions: Arc<Mutex<HashMap<String, SessionAggregate>>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to its session's aggregate.
    pub fn apply(&self, event: &MonitorEvent) {
        let mut sessions = self.sessions.lock();
        let ts = event.ts();
        let aggregate = sessions
            .entry(event.session_id().to_string())
            .or_insert_with(|| SessionAggregate::new(event.session_id(), ts));
        aggregate.last_updated = ts;

        match event {
            MonitorEvent::ToolStart { tool, ts, .. } => {
                aggregate.active_tools.insert(
                    tool.clone(),
                    ActiveTool {
                        tool: tool.clone(),
                        started_at: *ts,
                    },
                );
            }
            MonitorEvent::ToolEnd { tool, .. } => {
                aggregate.active_tools.remove(tool);
            }
            MonitorEvent::SubagentStart {
                agent_id,
                agent_type,
                description,
                ts,
                ..
            } => {
                aggregate.subagents.insert(
                    agent_id.clone(),
                    SubagentState {
                        agent_id: agent_id.clone(),
                        agent_type: agent_type.clone(),
                        description: description.clone(),
                        status: SubagentRunStatus::Running,
                        started_at: *ts,
                        ended_at: None,
                    },
                );
            }
            MonitorEvent::SubagentEnd {
                agent_id,
                status,
                ts,
                ..
            } => {
                let status = match status {
                    SubagentStatus::Completed => SubagentRunStatus::Completed,
                    SubagentStatus::Failed => SubagentRunStatus::Failed,
                };
                // An end without a seen start synthesizes a minimal entry
                let entry = aggregate
                    .subagents
                    .entry(agent_id.clone())
                    .or_insert_with(|| SubagentState {
                        agent_id: agent_id.clone(),
                        agent_type: "unknown".to_string(),
                        description: String::new(),
                        status: SubagentRunStatus::Running,
                        started_at: *ts,
                        ended_at: None,
                    });
                entry.status = status;
                entry.ended_at = Some(*ts);
            }
            MonitorEvent::Message { .. } => {
                aggregate.message_count += 1;
            }
            MonitorEvent::TaskUpdate { tasks, .. } => {
                aggregate.tasks = tasks
                    .iter()
                    .enumerate()
                    .map(|(index, task)| TaskRecord {
                        id: format!("task-{}", index),
                        summary: task.summary.clone(),
                        status: task.status,
                    })
                    .collect();
            }
            MonitorEvent::SessionEnd { .. } => {
                // last_updated refresh only
            }
        }
    }

    pub fn session_state(&self, session_id: &str) -> Option<SessionAggregate> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn active_tools(&self, session_id: &str) -> Vec<ActiveTool> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|a| a.active_tools.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Subagents still running in a session.
    pub fn active_subagents(&self, session_id: &str) -> Vec<SubagentState> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|a| {
                a.subagents
                    .values()
                    .filter(|s| s.status == SubagentRunStatus::Running)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all_tasks(&self, session_id: &str) -> Vec<TaskRecord> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|a| a.tasks.clone())
            .unwrap_or_default()
    }

    pub fn task_by_id(&self, session_id: &str, task_id: &str) -> Option<TaskRecord> {
        self.sessions
            .lock()
            .get(session_id)
            .and_then(|a| a.tasks.iter().find(|t| t.id == task_id).cloned())
    }

    /// Drop every session aggregate.
    pub fn reset(&self) {
        self.sessions.lock().clear();
    }

    /// Drop one session's aggregate.
    pub fn clear_session(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
