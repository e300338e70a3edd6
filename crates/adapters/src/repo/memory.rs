// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory repositories for tests and development.

use super::{
    CommandPatch, GroupPatch, GroupRepository, QueuePatch, QueueRepository, RepoError,
    SessionPatch,
};
use async_trait::async_trait;
use muster_core::{CommandQueue, GroupId, QueueId, SessionGroup};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory group repository.
#[derive(Clone, Default)]
pub struct MemoryGroupRepository {
    groups: Arc<Mutex<HashMap<GroupId, SessionGroup>>>,
}

impl MemoryGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupRepository for MemoryGroupRepository {
    async fn get(&self, id: &GroupId) -> Result<SessionGroup, RepoError> {
        self.groups
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::GroupNotFound(id.to_string()))
    }

    async fn save(&self, group: &SessionGroup) -> Result<(), RepoError> {
        self.groups.lock().insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionGroup>, RepoError> {
        let mut groups: Vec<SessionGroup> = self.groups.lock().values().cloned().collect();
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(groups)
    }

    async fn delete(&self, id: &GroupId) -> Result<(), RepoError> {
        self.groups
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepoError::GroupNotFound(id.to_string()))
    }

    async fn update_group(&self, id: &GroupId, patch: GroupPatch) -> Result<(), RepoError> {
        let mut groups = self.groups.lock();
        let group = groups
            .get_mut(id)
            .ok_or_else(|| RepoError::GroupNotFound(id.to_string()))?;
        if let Some(status) = patch.status {
            group.status = status;
        }
        if let Some(at) = patch.started_at {
            group.started_at = Some(at);
        }
        if let Some(at) = patch.completed_at {
            group.completed_at = Some(at);
        }
        if let Some(at) = patch.updated_at {
            group.updated_at = at;
        }
        Ok(())
    }

    async fn update_session(
        &self,
        group_id: &GroupId,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<(), RepoError> {
        let mut groups = self.groups.lock();
        let group = groups
            .get_mut(group_id)
            .ok_or_else(|| RepoError::GroupNotFound(group_id.to_string()))?;
        let session = group
            .session_mut(session_id)
            .ok_or_else(|| RepoError::SessionNotFound(session_id.to_string()))?;
        if let Some(status) = patch.status {
            session.status = status;
        }
        if let Some(id) = patch.engine_session_id {
            session.engine_session_id = Some(id);
        }
        if let Some(at) = patch.started_at {
            session.started_at = Some(at);
        }
        if let Some(at) = patch.completed_at {
            session.completed_at = Some(at);
        }
        if let Some(cost) = patch.cost_usd {
            session.cost_usd = Some(cost);
        }
        if let Some(tokens) = patch.tokens {
            session.tokens = Some(tokens);
        }
        Ok(())
    }
}

/// In-memory queue repository.
#[derive(Clone, Default)]
pub struct MemoryQueueRepository {
    queues: Arc<Mutex<HashMap<QueueId, CommandQueue>>>,
}

impl MemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueRepository for MemoryQueueRepository {
    async fn get(&self, id: &QueueId) -> Result<CommandQueue, RepoError> {
        self.queues
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::QueueNotFound(id.to_string()))
    }

    async fn save(&self, queue: &CommandQueue) -> Result<(), RepoError> {
        self.queues.lock().insert(queue.id.clone(), queue.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CommandQueue>, RepoError> {
        let mut queues: Vec<CommandQueue> = self.queues.lock().values().cloned().collect();
        queues.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(queues)
    }

    async fn delete(&self, id: &QueueId) -> Result<(), RepoError> {
        self.queues
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepoError::QueueNotFound(id.to_string()))
    }

    async fn update_queue(&self, id: &QueueId, patch: QueuePatch) -> Result<(), RepoError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(id)
            .ok_or_else(|| RepoError::QueueNotFound(id.to_string()))?;
        if let Some(status) = patch.status {
            queue.status = status;
        }
        if let Some(session_id) = patch.active_session_id {
            queue.active_session_id = Some(session_id);
        }
        if let Some(index) = patch.current_index {
            queue.current_index = index;
        }
        if let Some(cost) = patch.total_cost_usd {
            queue.total_cost_usd = cost;
        }
        if let Some(at) = patch.started_at {
            queue.started_at = Some(at);
        }
        if let Some(at) = patch.completed_at {
            queue.completed_at = Some(at);
        }
        if let Some(at) = patch.updated_at {
            queue.updated_at = at;
        }
        Ok(())
    }

    async fn update_command(
        &self,
        queue_id: &QueueId,
        command_id: &str,
        patch: CommandPatch,
    ) -> Result<(), RepoError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_id)
            .ok_or_else(|| RepoError::QueueNotFound(queue_id.to_string()))?;
        let command = queue
            .command_mut(command_id)
            .ok_or_else(|| RepoError::CommandNotFound(command_id.to_string()))?;
        if let Some(status) = patch.status {
            command.status = status;
        }
        if let Some(id) = patch.engine_session_id {
            command.engine_session_id = Some(id);
        }
        if let Some(cost) = patch.cost_usd {
            command.cost_usd = Some(cost);
        }
        if let Some(at) = patch.started_at {
            command.started_at = Some(at);
        }
        if let Some(at) = patch.completed_at {
            command.completed_at = Some(at);
        }
        if let Some(error) = patch.error {
            command.error = Some(error);
        }
        if let Some(prompt) = patch.prompt {
            command.prompt = prompt;
        }
        Ok(())
    }
}
