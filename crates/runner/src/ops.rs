// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository-level editing operations for groups and queues.
//!
//! Everything here persists first, then emits the matching SDK event.
//! Precondition violations (missing resources, mutating a non-pending
//! command) surface synchronously with no state change and no event.

use crate::error::RunnerError;
use muster_adapters::{GroupRepository, QueueRepository, RepoError};
use muster_bus::EventBus;
use muster_core::{
    resource_id, Clock, CommandQueue, CommandStatus, GroupConfig, GroupId, IdGen, QueueCommand,
    QueueId, SdkEvent, Session, SessionGroup, SessionMode,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Creates session groups.
pub struct GroupOps<G> {
    repo: Arc<dyn GroupRepository>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    idgen: G,
}

impl<G: IdGen> GroupOps<G> {
    pub fn new(repo: Arc<dyn GroupRepository>, bus: EventBus, clock: Arc<dyn Clock>, idgen: G) -> Self {
        Self {
            repo,
            bus,
            clock,
            idgen,
        }
    }

    /// Create a group with the given member sessions.
    pub async fn create_group(
        &self,
        name: &str,
        config: GroupConfig,
        sessions: Vec<(PathBuf, String, Vec<String>)>,
    ) -> Result<SessionGroup, RunnerError> {
        let now = self.clock.now();
        let id = GroupId::new(resource_id(name, self.clock.as_ref()));
        let mut group = SessionGroup::new(id.clone(), name, now);
        group.config = config;
        for (project_path, prompt, deps) in sessions {
            let session = Session::new(self.idgen.next(), project_path, prompt, now)
                .with_depends_on(deps.into_iter().map(Into::into).collect());
            group.sessions.push(session);
        }
        self.repo.save(&group).await?;
        self.bus.emit(&SdkEvent::GroupCreated {
            group_id: id.to_string(),
            name: name.to_string(),
            timestamp: now,
        });
        tracing::info!(group_id = %id, sessions = group.sessions.len(), "group created");
        Ok(group)
    }
}

/// Creates and edits command queues.
pub struct QueueOps<G> {
    repo: Arc<dyn QueueRepository>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    idgen: G,
}

impl<G: IdGen> QueueOps<G> {
    pub fn new(repo: Arc<dyn QueueRepository>, bus: EventBus, clock: Arc<dyn Clock>, idgen: G) -> Self {
        Self {
            repo,
            bus,
            clock,
            idgen,
        }
    }

    pub async fn create_queue(
        &self,
        name: &str,
        project_path: impl Into<PathBuf>,
    ) -> Result<CommandQueue, RunnerError> {
        let now = self.clock.now();
        let id = QueueId::new(resource_id(name, self.clock.as_ref()));
        let queue = CommandQueue::new(id.clone(), name, project_path, now);
        self.repo.save(&queue).await?;
        self.bus.emit(&SdkEvent::QueueCreated {
            queue_id: id.to_string(),
            name: name.to_string(),
            timestamp: now,
        });
        tracing::info!(queue_id = %id, "queue created");
        Ok(queue)
    }

    /// Append a command to the end of the queue.
    pub async fn add_command(
        &self,
        queue_id: &QueueId,
        prompt: impl Into<String>,
        session_mode: SessionMode,
    ) -> Result<QueueCommand, RunnerError> {
        let mut queue = self.repo.get(queue_id).await?;
        let command = QueueCommand::new(
            self.idgen.next(),
            queue.commands.len(),
            prompt,
            session_mode,
        );
        queue.commands.push(command.clone());
        queue.updated_at = self.clock.now();
        self.repo.save(&queue).await?;
        self.bus.emit(&SdkEvent::CommandAdded {
            queue_id: queue_id.to_string(),
            command_id: command.id.to_string(),
            index: command.index,
            timestamp: queue.updated_at,
        });
        Ok(command)
    }

    /// Rewrite a pending command's prompt.
    pub async fn update_command(
        &self,
        queue_id: &QueueId,
        command_id: &str,
        prompt: impl Into<String>,
    ) -> Result<(), RunnerError> {
        let mut queue = self.repo.get(queue_id).await?;
        let now = self.clock.now();
        let command = queue
            .command_mut(command_id)
            .ok_or_else(|| RepoError::CommandNotFound(command_id.to_string()))?;
        if command.status != CommandStatus::Pending {
            return Err(RunnerError::InvalidState {
                expected: "pending command",
                actual: command.status.to_string(),
            });
        }
        command.prompt = prompt.into();
        let index = command.index;
        queue.updated_at = now;
        self.repo.save(&queue).await?;
        self.bus.emit(&SdkEvent::CommandUpdated {
            queue_id: queue_id.to_string(),
            command_id: command_id.to_string(),
            index,
            timestamp: now,
        });
        Ok(())
    }

    /// Remove a pending command and re-index the rest.
    pub async fn remove_command(
        &self,
        queue_id: &QueueId,
        command_id: &str,
    ) -> Result<(), RunnerError> {
        let mut queue = self.repo.get(queue_id).await?;
        let position = queue
            .commands
            .iter()
            .position(|c| c.id == *command_id)
            .ok_or_else(|| RepoError::CommandNotFound(command_id.to_string()))?;
        if queue.commands[position].status != CommandStatus::Pending {
            return Err(RunnerError::InvalidState {
                expected: "pending command",
                actual: queue.commands[position].status.to_string(),
            });
        }
        queue.commands.remove(position);
        queue.reindex();
        if position < queue.current_index {
            queue.current_index -= 1;
        }
        queue.updated_at = self.clock.now();
        self.repo.save(&queue).await?;
        self.bus.emit(&SdkEvent::CommandRemoved {
            queue_id: queue_id.to_string(),
            command_id: command_id.to_string(),
            timestamp: queue.updated_at,
        });
        Ok(())
    }

    /// Move a pending command to a new position among the unrun tail.
    pub async fn reorder_command(
        &self,
        queue_id: &QueueId,
        command_id: &str,
        to_index: usize,
    ) -> Result<(), RunnerError> {
        let mut queue = self.repo.get(queue_id).await?;
        let from_index = queue
            .commands
            .iter()
            .position(|c| c.id == *command_id)
            .ok_or_else(|| RepoError::CommandNotFound(command_id.to_string()))?;
        if queue.commands[from_index].status != CommandStatus::Pending {
            return Err(RunnerError::InvalidState {
                expected: "pending command",
                actual: queue.commands[from_index].status.to_string(),
            });
        }
        if to_index >= queue.commands.len() || to_index < queue.current_index {
            return Err(RunnerError::CommandIndex(to_index));
        }
        let command = queue.commands.remove(from_index);
        queue.commands.insert(to_index, command);
        queue.reindex();
        queue.updated_at = self.clock.now();
        self.repo.save(&queue).await?;
        self.bus.emit(&SdkEvent::CommandReordered {
            queue_id: queue_id.to_string(),
            command_id: command_id.to_string(),
            from_index,
            to_index,
            timestamp: queue.updated_at,
        });
        Ok(())
    }

    /// Change a pending command's session mode.
    pub async fn set_session_mode(
        &self,
        queue_id: &QueueId,
        command_id: &str,
        session_mode: SessionMode,
    ) -> Result<(), RunnerError> {
        let mut queue = self.repo.get(queue_id).await?;
        let now = self.clock.now();
        let command = queue
            .command_mut(command_id)
            .ok_or_else(|| RepoError::CommandNotFound(command_id.to_string()))?;
        if command.status != CommandStatus::Pending {
            return Err(RunnerError::InvalidState {
                expected: "pending command",
                actual: command.status.to_string(),
            });
        }
        command.session_mode = session_mode;
        queue.updated_at = now;
        self.repo.save(&queue).await?;
        self.bus.emit(&SdkEvent::CommandModeChanged {
            queue_id: queue_id.to_string(),
            command_id: command_id.to_string(),
            session_mode,
            timestamp: now,
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
