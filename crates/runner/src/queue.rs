// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command queue execution.
//!
//! One queue runs one engine process at a time, strictly in index order.
//! Index 0 always starts a fresh engine session; later commands pass
//! `--resume` unless their session mode says otherwise. Pause and stop are
//! flags checked between commands; the in-flight process gets SIGTERM.

use crate::cost::CostExtractor;
use crate::error::RunnerError;
use muster_adapters::{
    CommandPatch, ProcessManager, ProcessSignaller, QueuePatch, QueueRepository, Signal,
};
use muster_bus::EventBus;
use muster_core::{
    format_duration_ms, Clock, CommandQueue, CommandStatus, EngineSessionId, QueueCommand,
    QueueId, QueueStatus, SdkEvent, SessionMode,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_ENGINE_CMD: &str = "claude";

/// Result of one `run` call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRunOutcome {
    pub status: QueueStatus,
    pub completed_commands: usize,
    pub failed_commands: usize,
    pub total_cost_usd: f64,
    pub total_duration_ms: u64,
}

#[derive(Default)]
struct ControlFlags {
    running: bool,
    pause: bool,
    stop: bool,
}

enum CommandOutcome {
    Completed { cost_usd: f64 },
    Failed { error: String },
    /// SIGTERM under an active pause/stop flag; the command went back to
    /// pending so a later run re-executes it.
    Interrupted,
}

/// Executes command queues, one engine process per queue at a time.
pub struct QueueRunner {
    repo: Arc<dyn QueueRepository>,
    processes: Arc<dyn ProcessManager>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    cost: Arc<dyn CostExtractor>,
    engine_cmd: String,
    inflight: Mutex<HashMap<QueueId, Box<dyn ProcessSignaller>>>,
    flags: Mutex<HashMap<QueueId, ControlFlags>>,
}

impl QueueRunner {
    pub fn new(
        repo: Arc<dyn QueueRepository>,
        processes: Arc<dyn ProcessManager>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        cost: Arc<dyn CostExtractor>,
    ) -> Self {
        Self {
            repo,
            processes,
            bus,
            clock,
            cost,
            engine_cmd: DEFAULT_ENGINE_CMD.to_string(),
            inflight: Mutex::new(HashMap::new()),
            flags: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_engine_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.engine_cmd = cmd.into();
        self
    }

    /// Run a queue from its cursor to the end, or until paused/stopped.
    pub async fn run(&self, queue_id: &QueueId) -> Result<QueueRunOutcome, RunnerError> {
        {
            let mut flags = self.flags.lock();
            let entry = flags.entry(queue_id.clone()).or_default();
            if entry.running {
                return Err(RunnerError::AlreadyRunning(queue_id.to_string()));
            }
            *entry = ControlFlags {
                running: true,
                pause: false,
                stop: false,
            };
        }

        let queue = match self.repo.get(queue_id).await {
            Ok(queue) => queue,
            Err(e) => {
                self.flags.lock().remove(queue_id);
                return Err(e.into());
            }
        };
        if !matches!(queue.status, QueueStatus::Pending | QueueStatus::Paused) {
            self.flags.lock().remove(queue_id);
            return Err(RunnerError::InvalidState {
                expected: "pending or paused",
                actual: queue.status.to_string(),
            });
        }

        let outcome = self.run_inner(queue_id, queue).await;
        self.flags.lock().remove(queue_id);
        outcome
    }

    async fn run_inner(
        &self,
        queue_id: &QueueId,
        queue: CommandQueue,
    ) -> Result<QueueRunOutcome, RunnerError> {
        let run_started = self.clock.now();
        self.repo
            .update_queue(
                queue_id,
                QueuePatch {
                    status: Some(QueueStatus::Running),
                    started_at: queue.started_at.is_none().then_some(run_started),
                    updated_at: Some(run_started),
                    ..QueuePatch::default()
                },
            )
            .await?;
        self.bus.emit(&SdkEvent::QueueStarted {
            queue_id: queue_id.to_string(),
            total_commands: queue.commands.len(),
            timestamp: run_started,
        });
        tracing::info!(queue_id = %queue_id, commands = queue.commands.len(), "queue run starting");

        let mut total_cost_usd = 0.0;
        let mut index = queue.current_index;
        let total = queue.commands.len();

        while index < total {
            if self.flag(queue_id, |f| f.pause) {
                return self.finish_paused(queue_id, index, run_started).await;
            }
            if self.flag(queue_id, |f| f.stop) {
                return self.finish_stopped(queue_id, run_started).await;
            }

            let queue = self.repo.get(queue_id).await?;
            let Some(command) = queue.commands.get(index).cloned() else {
                break;
            };

            if command.status != CommandStatus::Pending {
                // Accumulate prior-run results and move the cursor past them
                if command.status == CommandStatus::Completed {
                    total_cost_usd += command.cost_usd.unwrap_or(0.0);
                }
                index += 1;
                self.persist_cursor(queue_id, index).await;
                continue;
            }

            match self.execute_command(queue_id, &queue, &command).await {
                Ok(CommandOutcome::Completed { cost_usd }) => {
                    total_cost_usd += cost_usd;
                    index += 1;
                    self.persist_cursor(queue_id, index).await;
                    self.repo
                        .update_queue(
                            queue_id,
                            QueuePatch {
                                total_cost_usd: Some(total_cost_usd),
                                ..QueuePatch::default()
                            },
                        )
                        .await?;
                }
                Ok(CommandOutcome::Interrupted) => {
                    // Flag branches at the top of the loop take it from here
                    continue;
                }
                Ok(CommandOutcome::Failed { error }) => {
                    if queue.stop_on_error {
                        return self
                            .finish_failed(queue_id, index, error, run_started)
                            .await;
                    }
                    index += 1;
                    self.persist_cursor(queue_id, index).await;
                }
                Err(e) => {
                    // Unexpected failure: the command is marked failed and
                    // the queue goes down with it.
                    let error = e.to_string();
                    let _ = self
                        .repo
                        .update_command(
                            queue_id,
                            command.id.as_str(),
                            CommandPatch {
                                status: Some(CommandStatus::Failed),
                                error: Some(error.clone()),
                                completed_at: Some(self.clock.now()),
                                ..CommandPatch::default()
                            },
                        )
                        .await;
                    return self
                        .finish_failed(queue_id, index, error, run_started)
                        .await;
                }
            }
        }

        self.finish_completed(queue_id, total_cost_usd, run_started)
            .await
    }

    async fn execute_command(
        &self,
        queue_id: &QueueId,
        queue: &CommandQueue,
        command: &QueueCommand,
    ) -> Result<CommandOutcome, RunnerError> {
        let new_session = command.index == 0 || command.session_mode == SessionMode::New;
        let started_at = self.clock.now();

        self.repo
            .update_command(
                queue_id,
                command.id.as_str(),
                CommandPatch {
                    status: Some(CommandStatus::Running),
                    started_at: Some(started_at),
                    ..CommandPatch::default()
                },
            )
            .await?;
        self.bus.emit(&SdkEvent::CommandStarted {
            queue_id: queue_id.to_string(),
            command_id: command.id.to_string(),
            index: command.index,
            prompt: command.prompt.clone(),
            session_mode: command.session_mode,
            is_new_session: new_session,
            timestamp: started_at,
        });

        let mut args = vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
        ];
        args.extend(queue.additional_args.iter().cloned());
        if !new_session {
            args.push("--resume".to_string());
        }
        args.push(command.prompt.clone());

        let mut handle = self
            .processes
            .spawn(&self.engine_cmd, &args, &queue.project_path, &[])
            .await?;
        tracing::debug!(queue_id = %queue_id, index = command.index, pid = ?handle.pid(), "engine spawned");

        self.inflight
            .lock()
            .insert(queue_id.clone(), handle.signaller());

        // Stdout yields the engine session id and any cost records; exit
        // code is the authoritative completion signal.
        let stdout = handle.take_stdout();
        let cost = Arc::clone(&self.cost);
        let consume = stdout.map(|mut rx| {
            tokio::spawn(async move {
                let mut engine_id: Option<String> = None;
                let mut cost_usd = 0.0;
                while let Some(line) = rx.recv().await {
                    let Ok(record) = serde_json::from_str::<serde_json::Value>(&line) else {
                        continue;
                    };
                    if engine_id.is_none() {
                        if let Some(id) = record.get("sessionId").and_then(|v| v.as_str()) {
                            engine_id = Some(id.to_string());
                        }
                    }
                    if let Some(delta) = cost.extract(&record) {
                        cost_usd += delta;
                    }
                }
                (engine_id, cost_usd)
            })
        });
        let stderr = handle.take_stderr();
        let stderr_drain = stderr.map(|mut rx| {
            tokio::spawn(async move { while rx.recv().await.is_some() {} })
        });

        let exit = handle.wait().await;
        self.inflight.lock().remove(queue_id);

        let (engine_id, cost_usd) = match consume {
            Some(task) => task.await.unwrap_or((None, 0.0)),
            None => (None, 0.0),
        };
        if let Some(task) = stderr_drain {
            let _ = task.await;
        }

        let now = self.clock.now();
        let duration_ms = (now - started_at).num_milliseconds().max(0) as u64;
        let engine_session_id: EngineSessionId = engine_id
            .unwrap_or_else(|| format!("session-{}", started_at.to_rfc3339()))
            .into();

        if new_session {
            self.repo
                .update_queue(
                    queue_id,
                    QueuePatch {
                        active_session_id: Some(engine_session_id.clone()),
                        ..QueuePatch::default()
                    },
                )
                .await?;
        }
        self.repo
            .update_command(
                queue_id,
                command.id.as_str(),
                CommandPatch {
                    engine_session_id: Some(engine_session_id.clone()),
                    ..CommandPatch::default()
                },
            )
            .await?;

        match exit {
            Ok(Some(0)) => {
                self.repo
                    .update_command(
                        queue_id,
                        command.id.as_str(),
                        CommandPatch {
                            status: Some(CommandStatus::Completed),
                            cost_usd: Some(cost_usd),
                            completed_at: Some(now),
                            ..CommandPatch::default()
                        },
                    )
                    .await?;
                self.bus.emit(&SdkEvent::CommandCompleted {
                    queue_id: queue_id.to_string(),
                    command_id: command.id.to_string(),
                    index: command.index,
                    cost_usd,
                    engine_session_id: engine_session_id.to_string(),
                    duration_ms,
                    timestamp: now,
                });
                tracing::info!(queue_id = %queue_id, index = command.index, duration_ms, "command completed");
                Ok(CommandOutcome::Completed { cost_usd })
            }
            Ok(None)
                if self.flag(queue_id, |f| f.pause) || self.flag(queue_id, |f| f.stop) =>
            {
                // Terminated by our own pause/stop: back to pending for the
                // next run.
                self.repo
                    .update_command(
                        queue_id,
                        command.id.as_str(),
                        CommandPatch {
                            status: Some(CommandStatus::Pending),
                            ..CommandPatch::default()
                        },
                    )
                    .await?;
                tracing::debug!(queue_id = %queue_id, index = command.index, "command interrupted");
                Ok(CommandOutcome::Interrupted)
            }
            Ok(code) => {
                let error = match code {
                    Some(code) => format!("engine exited with code {}", code),
                    None => "engine terminated by signal".to_string(),
                };
                self.repo
                    .update_command(
                        queue_id,
                        command.id.as_str(),
                        CommandPatch {
                            status: Some(CommandStatus::Failed),
                            error: Some(error.clone()),
                            completed_at: Some(now),
                            ..CommandPatch::default()
                        },
                    )
                    .await?;
                self.bus.emit(&SdkEvent::CommandFailed {
                    queue_id: queue_id.to_string(),
                    command_id: command.id.to_string(),
                    index: command.index,
                    error: error.clone(),
                    duration_ms,
                    timestamp: now,
                });
                tracing::warn!(queue_id = %queue_id, index = command.index, error, "command failed");
                Ok(CommandOutcome::Failed { error })
            }
            Err(e) => {
                let error = e.to_string();
                self.repo
                    .update_command(
                        queue_id,
                        command.id.as_str(),
                        CommandPatch {
                            status: Some(CommandStatus::Failed),
                            error: Some(error.clone()),
                            completed_at: Some(now),
                            ..CommandPatch::default()
                        },
                    )
                    .await?;
                self.bus.emit(&SdkEvent::CommandFailed {
                    queue_id: queue_id.to_string(),
                    command_id: command.id.to_string(),
                    index: command.index,
                    error: error.clone(),
                    duration_ms,
                    timestamp: now,
                });
                Ok(CommandOutcome::Failed { error })
            }
        }
    }

    /// Request a pause; takes effect at the next loop check. SIGTERMs the
    /// in-flight process.
    pub async fn pause(&self, queue_id: &QueueId) -> Result<(), RunnerError> {
        let queue = self.repo.get(queue_id).await?;
        if queue.status != QueueStatus::Running {
            return Err(RunnerError::InvalidState {
                expected: "running",
                actual: queue.status.to_string(),
            });
        }
        self.set_flag(queue_id, |f| f.pause = true);
        self.signal_inflight(queue_id).await;
        Ok(())
    }

    /// Resume a paused queue; session continuity is decided per command by
    /// its session mode, not a queue-level flag.
    pub async fn resume(&self, queue_id: &QueueId) -> Result<QueueRunOutcome, RunnerError> {
        let queue = self.repo.get(queue_id).await?;
        if queue.status != QueueStatus::Paused {
            return Err(RunnerError::InvalidState {
                expected: "paused",
                actual: queue.status.to_string(),
            });
        }
        self.bus.emit(&SdkEvent::QueueResumed {
            queue_id: queue_id.to_string(),
            from_command_index: queue.current_index,
            timestamp: self.clock.now(),
        });
        tracing::info!(queue_id = %queue_id, from = queue.current_index, "queue resumed");
        self.run(queue_id).await
    }

    /// Request a stop; remaining commands are skipped at the next check.
    pub async fn stop(&self, queue_id: &QueueId) -> Result<(), RunnerError> {
        let queue = self.repo.get(queue_id).await?;
        if !matches!(queue.status, QueueStatus::Running | QueueStatus::Paused) {
            return Err(RunnerError::InvalidState {
                expected: "running or paused",
                actual: queue.status.to_string(),
            });
        }
        self.set_flag(queue_id, |f| f.stop = true);
        self.signal_inflight(queue_id).await;

        // A paused queue has no loop to observe the flag; finalize here.
        if queue.status == QueueStatus::Paused {
            self.mark_remaining_skipped(queue_id).await?;
            let now = self.clock.now();
            self.repo
                .update_queue(
                    queue_id,
                    QueuePatch {
                        status: Some(QueueStatus::Stopped),
                        updated_at: Some(now),
                        ..QueuePatch::default()
                    },
                )
                .await?;
            self.bus.emit(&SdkEvent::QueueStopped {
                queue_id: queue_id.to_string(),
                timestamp: now,
            });
        }
        Ok(())
    }

    fn flag(&self, queue_id: &QueueId, read: impl Fn(&ControlFlags) -> bool) -> bool {
        self.flags.lock().get(queue_id).map(&read).unwrap_or(false)
    }

    fn set_flag(&self, queue_id: &QueueId, write: impl Fn(&mut ControlFlags)) {
        let mut flags = self.flags.lock();
        write(flags.entry(queue_id.clone()).or_default());
    }

    async fn signal_inflight(&self, queue_id: &QueueId) {
        let signaller = self.inflight.lock().remove(queue_id);
        if let Some(signaller) = signaller {
            if let Err(e) = signaller.signal(Signal::Term).await {
                tracing::warn!(queue_id = %queue_id, error = %e, "SIGTERM failed");
            }
        }
    }

    async fn persist_cursor(&self, queue_id: &QueueId, index: usize) {
        let _ = self
            .repo
            .update_queue(
                queue_id,
                QueuePatch {
                    current_index: Some(index),
                    updated_at: Some(self.clock.now()),
                    ..QueuePatch::default()
                },
            )
            .await;
    }

    async fn mark_remaining_skipped(&self, queue_id: &QueueId) -> Result<(), RunnerError> {
        let queue = self.repo.get(queue_id).await?;
        for command in &queue.commands {
            if command.status == CommandStatus::Pending {
                self.repo
                    .update_command(
                        queue_id,
                        command.id.as_str(),
                        CommandPatch::status(CommandStatus::Skipped),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn counts(&self, queue_id: &QueueId) -> (usize, usize) {
        match self.repo.get(queue_id).await {
            Ok(queue) => {
                let completed = queue
                    .commands
                    .iter()
                    .filter(|c| c.status == CommandStatus::Completed)
                    .count();
                let failed = queue
                    .commands
                    .iter()
                    .filter(|c| c.status == CommandStatus::Failed)
                    .count();
                (completed, failed)
            }
            Err(_) => (0, 0),
        }
    }

    async fn finish_paused(
        &self,
        queue_id: &QueueId,
        index: usize,
        run_started: chrono::DateTime<chrono::Utc>,
    ) -> Result<QueueRunOutcome, RunnerError> {
        let now = self.clock.now();
        self.repo
            .update_queue(
                queue_id,
                QueuePatch {
                    status: Some(QueueStatus::Paused),
                    updated_at: Some(now),
                    ..QueuePatch::default()
                },
            )
            .await?;
        self.bus.emit(&SdkEvent::QueuePaused {
            queue_id: queue_id.to_string(),
            current_command_index: index,
            timestamp: now,
        });
        tracing::info!(queue_id = %queue_id, index, "queue paused");
        let (completed, failed) = self.counts(queue_id).await;
        Ok(QueueRunOutcome {
            status: QueueStatus::Paused,
            completed_commands: completed,
            failed_commands: failed,
            total_cost_usd: self.repo.get(queue_id).await?.total_cost_usd,
            total_duration_ms: (now - run_started).num_milliseconds().max(0) as u64,
        })
    }

    async fn finish_stopped(
        &self,
        queue_id: &QueueId,
        run_started: chrono::DateTime<chrono::Utc>,
    ) -> Result<QueueRunOutcome, RunnerError> {
        self.mark_remaining_skipped(queue_id).await?;
        let now = self.clock.now();
        self.repo
            .update_queue(
                queue_id,
                QueuePatch {
                    status: Some(QueueStatus::Stopped),
                    updated_at: Some(now),
                    ..QueuePatch::default()
                },
            )
            .await?;
        self.bus.emit(&SdkEvent::QueueStopped {
            queue_id: queue_id.to_string(),
            timestamp: now,
        });
        tracing::info!(queue_id = %queue_id, "queue stopped");
        let (completed, failed) = self.counts(queue_id).await;
        Ok(QueueRunOutcome {
            status: QueueStatus::Stopped,
            completed_commands: completed,
            failed_commands: failed,
            total_cost_usd: self.repo.get(queue_id).await?.total_cost_usd,
            total_duration_ms: (now - run_started).num_milliseconds().max(0) as u64,
        })
    }

    async fn finish_failed(
        &self,
        queue_id: &QueueId,
        failed_index: usize,
        error: String,
        run_started: chrono::DateTime<chrono::Utc>,
    ) -> Result<QueueRunOutcome, RunnerError> {
        self.mark_remaining_skipped(queue_id).await?;
        let now = self.clock.now();
        self.repo
            .update_queue(
                queue_id,
                QueuePatch {
                    status: Some(QueueStatus::Failed),
                    completed_at: Some(now),
                    updated_at: Some(now),
                    ..QueuePatch::default()
                },
            )
            .await?;
        self.bus.emit(&SdkEvent::QueueFailed {
            queue_id: queue_id.to_string(),
            failed_command_index: Some(failed_index),
            error,
            timestamp: now,
        });
        tracing::warn!(queue_id = %queue_id, failed_index, "queue failed");
        let (completed, failed) = self.counts(queue_id).await;
        Ok(QueueRunOutcome {
            status: QueueStatus::Failed,
            completed_commands: completed,
            failed_commands: failed,
            total_cost_usd: self.repo.get(queue_id).await?.total_cost_usd,
            total_duration_ms: (now - run_started).num_milliseconds().max(0) as u64,
        })
    }

    async fn finish_completed(
        &self,
        queue_id: &QueueId,
        total_cost_usd: f64,
        run_started: chrono::DateTime<chrono::Utc>,
    ) -> Result<QueueRunOutcome, RunnerError> {
        let now = self.clock.now();
        self.repo
            .update_queue(
                queue_id,
                QueuePatch {
                    status: Some(QueueStatus::Completed),
                    total_cost_usd: Some(total_cost_usd),
                    completed_at: Some(now),
                    updated_at: Some(now),
                    ..QueuePatch::default()
                },
            )
            .await?;
        let (completed, failed) = self.counts(queue_id).await;
        let total_duration_ms = (now - run_started).num_milliseconds().max(0) as u64;
        self.bus.emit(&SdkEvent::QueueCompleted {
            queue_id: queue_id.to_string(),
            completed_commands: completed,
            failed_commands: failed,
            total_cost_usd,
            total_duration_ms,
            timestamp: now,
        });
        tracing::info!(
            queue_id = %queue_id,
            completed,
            failed,
            duration = %format_duration_ms(total_duration_ms),
            "queue completed"
        );
        Ok(QueueRunOutcome {
            status: QueueStatus::Completed,
            completed_commands: completed,
            failed_commands: failed,
            total_cost_usd,
            total_duration_ms,
        })
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
