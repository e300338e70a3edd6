// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository ports for session groups and command queues.
//!
//! Runners and managers hold short-lived snapshots and issue idempotent
//! save/patch operations. Persistent backings (JSON-on-disk or otherwise)
//! are an implementation detail behind these traits; the in-memory
//! implementations here serve tests and development.

mod memory;

pub use memory::{MemoryGroupRepository, MemoryQueueRepository};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use muster_core::{
    CommandQueue, CommandStatus, EngineSessionId, GroupId, GroupStatus, QueueId, QueueStatus,
    SessionGroup, SessionStatus, TokenUsage,
};
use thiserror::Error;

/// Errors from repository operations
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("queue not found: {0}")]
    QueueNotFound(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Partial update to a group member session.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub engine_session_id: Option<EngineSessionId>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cost_usd: Option<f64>,
    pub tokens: Option<TokenUsage>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn with_engine_session_id(mut self, id: EngineSessionId) -> Self {
        self.engine_session_id = Some(id);
        self
    }
}

/// Partial update to a group.
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub status: Option<GroupStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GroupPatch {
    pub fn status(status: GroupStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }
}

/// Partial update to a queue.
#[derive(Debug, Clone, Default)]
pub struct QueuePatch {
    pub status: Option<QueueStatus>,
    pub active_session_id: Option<EngineSessionId>,
    pub current_index: Option<usize>,
    pub total_cost_usd: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QueuePatch {
    pub fn status(status: QueueStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Partial update to a queued command.
#[derive(Debug, Clone, Default)]
pub struct CommandPatch {
    pub status: Option<CommandStatus>,
    pub engine_session_id: Option<EngineSessionId>,
    pub cost_usd: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub prompt: Option<String>,
}

impl CommandPatch {
    pub fn status(status: CommandStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Persistence capability for session groups.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn get(&self, id: &GroupId) -> Result<SessionGroup, RepoError>;

    async fn save(&self, group: &SessionGroup) -> Result<(), RepoError>;

    async fn list(&self) -> Result<Vec<SessionGroup>, RepoError>;

    async fn delete(&self, id: &GroupId) -> Result<(), RepoError>;

    async fn update_group(&self, id: &GroupId, patch: GroupPatch) -> Result<(), RepoError>;

    async fn update_session(
        &self,
        group_id: &GroupId,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<(), RepoError>;
}

/// Persistence capability for command queues.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn get(&self, id: &QueueId) -> Result<CommandQueue, RepoError>;

    async fn save(&self, queue: &CommandQueue) -> Result<(), RepoError>;

    async fn list(&self) -> Result<Vec<CommandQueue>, RepoError>;

    async fn delete(&self, id: &QueueId) -> Result<(), RepoError>;

    async fn update_queue(&self, id: &QueueId, patch: QueuePatch) -> Result<(), RepoError>;

    async fn update_command(
        &self,
        queue_id: &QueueId,
        command_id: &str,
        patch: CommandPatch,
    ) -> Result<(), RepoError>;
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
