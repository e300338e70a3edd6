// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup sweep: best-effort recovery of state left behind by a previous
//! process. Anything persisted as running is parked as paused; active
//! sessions pause and mid-flight commands go back to pending. No events
//! are emitted; the sweep is idempotent.

use crate::error::RunnerError;
use muster_adapters::{
    CommandPatch, GroupPatch, GroupRepository, QueuePatch, QueueRepository, SessionPatch,
};
use muster_core::{Clock, CommandStatus, GroupStatus, QueueStatus, SessionStatus};
use std::sync::Arc;

/// What the sweep touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub groups_paused: usize,
    pub queues_paused: usize,
}

/// Park stale-running groups and queues as paused.
pub async fn sweep_stale(
    group_repo: &Arc<dyn GroupRepository>,
    queue_repo: &Arc<dyn QueueRepository>,
    clock: &Arc<dyn Clock>,
) -> Result<SweepReport, RunnerError> {
    let mut report = SweepReport::default();
    let now = clock.now();

    for group in group_repo.list().await? {
        if group.status != GroupStatus::Running {
            continue;
        }
        for session in &group.sessions {
            if session.status == SessionStatus::Active {
                group_repo
                    .update_session(
                        &group.id,
                        session.id.as_str(),
                        SessionPatch::status(SessionStatus::Paused),
                    )
                    .await?;
            }
        }
        group_repo
            .update_group(
                &group.id,
                GroupPatch {
                    status: Some(GroupStatus::Paused),
                    updated_at: Some(now),
                    ..GroupPatch::default()
                },
            )
            .await?;
        tracing::info!(group_id = %group.id, "stale running group parked as paused");
        report.groups_paused += 1;
    }

    for queue in queue_repo.list().await? {
        if queue.status != QueueStatus::Running {
            continue;
        }
        for command in &queue.commands {
            if command.status == CommandStatus::Running {
                queue_repo
                    .update_command(
                        &queue.id,
                        command.id.as_str(),
                        CommandPatch::status(CommandStatus::Pending),
                    )
                    .await?;
            }
        }
        queue_repo
            .update_queue(
                &queue.id,
                QueuePatch {
                    status: Some(QueueStatus::Paused),
                    updated_at: Some(now),
                    ..QueuePatch::default()
                },
            )
            .await?;
        tracing::info!(queue_id = %queue.id, "stale running queue parked as paused");
        report.queues_paused += 1;
    }

    Ok(report)
}

#[cfg(test)]
#[path = "sweep_tests.rs"]
mod tests;
