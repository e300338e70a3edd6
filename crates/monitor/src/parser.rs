// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translation of raw transcript events into high-level monitor events.
//!
//! Stateless except for the in-flight tool map used to compute durations.

use chrono::{DateTime, Utc};
use muster_core::{
    Clock, MessageRole, MonitorEvent, SubagentStatus, TaskEntry, TaskState, TranscriptEvent,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-session transcript event parser.
pub struct EventParser {
    session_id: String,
    clock: Arc<dyn Clock>,
    inflight: HashMap<String, DateTime<Utc>>,
}

impl EventParser {
    pub fn new(session_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            session_id: session_id.into(),
            clock,
            inflight: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Clear in-flight tools and re-tag subsequent events.
    pub fn reset(&mut self, new_session_id: impl Into<String>) {
        self.session_id = new_session_id.into();
        self.inflight.clear();
    }

    /// Translate one raw event into zero or more monitor events.
    pub fn parse(&mut self, event: &TranscriptEvent) -> Vec<MonitorEvent> {
        let ts = event.timestamp.unwrap_or_else(|| self.clock.now());
        match event.kind.as_str() {
            "tool_use" => self.on_tool_use(event, ts),
            "tool_result" => self.on_tool_result(event, ts),
            "task" => self.on_task(event, ts),
            "user" => self.on_message(event, MessageRole::User, ts),
            "assistant" => self.on_message(event, MessageRole::Assistant, ts),
            "todo_write" => self.on_todo_write(event, ts),
            _ => Vec::new(),
        }
    }

    fn on_tool_use(&mut self, event: &TranscriptEvent, ts: DateTime<Utc>) -> Vec<MonitorEvent> {
        let Some(tool) = tool_name(event.content.as_ref()) else {
            return Vec::new();
        };
        self.inflight.insert(tool.clone(), ts);
        vec![MonitorEvent::ToolStart {
            session_id: self.session_id.clone(),
            tool,
            ts,
        }]
    }

    fn on_tool_result(&mut self, event: &TranscriptEvent, ts: DateTime<Utc>) -> Vec<MonitorEvent> {
        let Some(tool) = tool_name(event.content.as_ref()) else {
            return Vec::new();
        };
        // Unmatched or out-of-order results clamp to zero
        let duration_ms = self
            .inflight
            .remove(&tool)
            .map(|start| (ts - start).num_milliseconds().max(0) as u64)
            .unwrap_or(0);
        vec![MonitorEvent::ToolEnd {
            session_id: self.session_id.clone(),
            tool,
            duration_ms,
            ts,
        }]
    }

    fn on_task(&mut self, event: &TranscriptEvent, ts: DateTime<Utc>) -> Vec<MonitorEvent> {
        let content = event.content.as_ref();
        let agent_id = content
            .and_then(|c| c.get("task_id"))
            .and_then(Value::as_str)
            .or(event.uuid.as_deref())
            .unwrap_or("unknown")
            .to_string();

        let mut events = Vec::new();
        if let Some(agent_type) = content
            .and_then(|c| c.get("subagent_type"))
            .and_then(Value::as_str)
        {
            let description = content
                .and_then(|c| c.get("description"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            events.push(MonitorEvent::SubagentStart {
                session_id: self.session_id.clone(),
                agent_id: agent_id.clone(),
                agent_type: agent_type.to_string(),
                description,
                ts,
            });
        }
        let status = content
            .and_then(|c| c.get("status"))
            .and_then(Value::as_str);
        let status = match status {
            Some("completed") => Some(SubagentStatus::Completed),
            Some("failed") => Some(SubagentStatus::Failed),
            _ => None,
        };
        if let Some(status) = status {
            events.push(MonitorEvent::SubagentEnd {
                session_id: self.session_id.clone(),
                agent_id,
                status,
                ts,
            });
        }
        events
    }

    fn on_message(
        &mut self,
        event: &TranscriptEvent,
        role: MessageRole,
        ts: DateTime<Utc>,
    ) -> Vec<MonitorEvent> {
        let content = match event.content.as_ref() {
            Some(Value::String(s)) => s.clone(),
            Some(value) => match value.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => return Vec::new(),
            },
            None => return Vec::new(),
        };
        if content.trim().is_empty() {
            return Vec::new();
        }
        vec![MonitorEvent::Message {
            session_id: self.session_id.clone(),
            role,
            content,
            ts,
        }]
    }

    fn on_todo_write(&mut self, event: &TranscriptEvent, ts: DateTime<Utc>) -> Vec<MonitorEvent> {
        let Some(raw_tasks) = task_list(event.content.as_ref()) else {
            return Vec::new();
        };
        // Invalid entries are dropped silently; the surviving list replaces
        // the prior set even when empty.
        let tasks: Vec<TaskEntry> = raw_tasks
            .iter()
            .filter_map(|task| {
                let summary = task.get("summary")?.as_str()?;
                let status = TaskState::parse(task.get("status")?.as_str()?)?;
                Some(TaskEntry {
                    summary: summary.to_string(),
                    status,
                })
            })
            .collect();
        vec![MonitorEvent::TaskUpdate {
            session_id: self.session_id.clone(),
            tasks,
            ts,
        }]
    }
}

/// Tool name from a tool_use / tool_result content payload.
fn tool_name(content: Option<&Value>) -> Option<String> {
    let content = content?;
    content
        .get("name")
        .or_else(|| content.get("tool"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// The task array from a todo_write payload: the content itself, or its
/// `tasks` / `todos` field.
fn task_list(content: Option<&Value>) -> Option<&Vec<Value>> {
    let content = content?;
    if let Some(list) = content.as_array() {
        return Some(list);
    }
    content
        .get("tasks")
        .or_else(|| content.get("todos"))
        .and_then(Value::as_array)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
