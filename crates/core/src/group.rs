// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session groups: named batches of sessions with shared budget and
//! concurrency settings and dependency edges between members.

use crate::id::GroupId;
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a session group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Created,
    Running,
    Paused,
    Completed,
    Failed,
    Archived,
    Deleted,
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupStatus::Created => "created",
            GroupStatus::Running => "running",
            GroupStatus::Paused => "paused",
            GroupStatus::Completed => "completed",
            GroupStatus::Failed => "failed",
            GroupStatus::Archived => "archived",
            GroupStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// What the group runner does when the budget is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetAction {
    Stop,
    Warn,
    Pause,
}

fn default_warning_threshold() -> f64 {
    0.8
}

/// Group-level execution configuration.
///
/// `None` fields fall back to runner defaults; caller-supplied run options
/// override both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// USD ceiling for the whole group. `None` disables budget gating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_budget_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    #[serde(default = "GroupConfig::default_budget_action")]
    pub on_budget_exceeded: BudgetAction,
    /// Fraction of the budget at which a warning fires, in `[0, 1]`.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
}

impl GroupConfig {
    fn default_budget_action() -> BudgetAction {
        BudgetAction::Warn
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_budget_usd: None,
            max_concurrent: None,
            on_budget_exceeded: BudgetAction::Warn,
            warning_threshold: default_warning_threshold(),
        }
    }
}

/// A named batch of sessions executed together under one budget.
///
/// Session order is presentation-only; execution order is the topological
/// order of the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGroup {
    pub id: GroupId,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: GroupStatus,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub config: GroupConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionGroup {
    /// Create an empty group in `created` status.
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let name = name.into();
        let slug = crate::slug::slugify(&name, crate::slug::MAX_SLUG_LEN);
        Self {
            id: id.into(),
            name,
            slug,
            description: None,
            status: GroupStatus::Created,
            sessions: Vec::new(),
            config: GroupConfig::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == *id)
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == *id)
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
