// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session group execution.
//!
//! One runner drives one group at a time: it builds the dependency graph,
//! keeps up to `max_concurrent` engine processes alive, gates on budget,
//! and exposes pause/resume/stop against the long-lived children. Exit
//! code is the only authoritative completion signal; stdout is drained in
//! the background for the engine session id and cost observations.

use crate::cost::CostExtractor;
use crate::error::RunnerError;
use crate::graph::DependencyGraph;
use crate::progress::{is_budget_exceeded, is_budget_warning, ProgressAggregator};
use chrono::{DateTime, Utc};
use muster_adapters::{
    ConfigGenerator, GroupPatch, GroupRepository, ProcessHandle, ProcessManager,
    ProcessSignaller, SessionPatch, Signal,
};
use muster_bus::EventBus;
use muster_core::{
    format_duration_ms, BudgetAction, Clock, GroupConfig, GroupId, GroupStatus, PauseReason,
    SdkEvent, SessionId, SessionStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify};

/// Group runner lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

impl std::fmt::Display for RunnerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunnerState::Idle => "idle",
            RunnerState::Running => "running",
            RunnerState::Paused => "paused",
            RunnerState::Stopped => "stopped",
            RunnerState::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Caller overrides for one run; unset fields fall back to group config,
/// then to hard-coded defaults.
#[derive(Debug, Clone, Default)]
pub struct GroupRunOptions {
    pub max_concurrent: Option<usize>,
    pub respect_dependencies: Option<bool>,
    pub pause_on_error: Option<bool>,
    pub error_threshold: Option<usize>,
    pub resume: Option<bool>,
    pub engine_cmd: Option<String>,
}

#[derive(Debug, Clone)]
struct ResolvedOptions {
    max_concurrent: usize,
    respect_dependencies: bool,
    pause_on_error: bool,
    error_threshold: usize,
    resume: bool,
    engine_cmd: String,
}

const DEFAULT_MAX_CONCURRENT: usize = 3;
const DEFAULT_ERROR_THRESHOLD: usize = 2;
const DEFAULT_ENGINE_CMD: &str = "claude";

fn resolve_options(options: GroupRunOptions, config: &GroupConfig) -> ResolvedOptions {
    ResolvedOptions {
        max_concurrent: options
            .max_concurrent
            .or(config.max_concurrent)
            .unwrap_or(DEFAULT_MAX_CONCURRENT)
            .max(1),
        respect_dependencies: options.respect_dependencies.unwrap_or(true),
        pause_on_error: options.pause_on_error.unwrap_or(true),
        error_threshold: options.error_threshold.unwrap_or(DEFAULT_ERROR_THRESHOLD),
        resume: options.resume.unwrap_or(false),
        engine_cmd: options
            .engine_cmd
            .unwrap_or_else(|| DEFAULT_ENGINE_CMD.to_string()),
    }
}

struct Worker {
    signaller: Box<dyn ProcessSignaller>,
    done_rx: oneshot::Receiver<()>,
    started_at: DateTime<Utc>,
}

type ExitResult = Result<Option<i32>, muster_adapters::ProcessError>;

/// Runs one session group through its dependency order.
pub struct GroupRunner {
    repo: Arc<dyn GroupRepository>,
    processes: Arc<dyn ProcessManager>,
    config_gen: Arc<dyn ConfigGenerator>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    cost: Arc<dyn CostExtractor>,
    state: Mutex<RunnerState>,
    interrupt: Notify,
    workers: Mutex<HashMap<SessionId, Worker>>,
    graph: Mutex<Option<DependencyGraph>>,
    group_id: Mutex<Option<GroupId>>,
    options: Mutex<Option<ResolvedOptions>>,
    progress: Arc<ProgressAggregator>,
    failures: AtomicUsize,
    warning_emitted: AtomicBool,
}

impl GroupRunner {
    pub fn new(
        repo: Arc<dyn GroupRepository>,
        processes: Arc<dyn ProcessManager>,
        config_gen: Arc<dyn ConfigGenerator>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        cost: Arc<dyn CostExtractor>,
    ) -> Self {
        Self {
            repo,
            processes,
            config_gen,
            bus,
            clock,
            cost,
            state: Mutex::new(RunnerState::Idle),
            interrupt: Notify::new(),
            workers: Mutex::new(HashMap::new()),
            graph: Mutex::new(None),
            group_id: Mutex::new(None),
            options: Mutex::new(None),
            progress: Arc::new(ProgressAggregator::new()),
            failures: AtomicUsize::new(0),
            warning_emitted: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RunnerState {
        *self.state.lock()
    }

    /// Execute a group to completion, pause, or stop.
    ///
    /// A dependency cycle aborts before any status is written. Errors inside
    /// the execute loop never propagate; they end in a terminal persisted
    /// status and a `group_failed` event.
    pub async fn run(
        &self,
        group_id: &GroupId,
        options: GroupRunOptions,
    ) -> Result<(), RunnerError> {
        {
            let mut state = self.state.lock();
            if matches!(*state, RunnerState::Running | RunnerState::Paused) {
                return Err(RunnerError::InvalidState {
                    expected: "idle",
                    actual: state.to_string(),
                });
            }
            *state = RunnerState::Running;
        }

        let prepared = self.prepare(group_id, options).await;
        let resolved = match prepared {
            Ok(resolved) => resolved,
            Err(e) => {
                *self.state.lock() = RunnerState::Idle;
                return Err(e);
            }
        };

        let now = self.clock.now();
        let persisted = self
            .repo
            .update_group(
                group_id,
                GroupPatch {
                    status: Some(GroupStatus::Running),
                    started_at: Some(now),
                    updated_at: Some(now),
                    ..GroupPatch::default()
                },
            )
            .await;
        let group = match persisted {
            Ok(()) => self.repo.get(group_id).await,
            Err(e) => Err(e),
        };
        let group = match group {
            Ok(group) => group,
            Err(e) => {
                *self.state.lock() = RunnerState::Idle;
                return Err(e.into());
            }
        };
        self.bus.emit(&SdkEvent::GroupStarted {
            group_id: group_id.to_string(),
            total_sessions: group.sessions.len(),
            timestamp: now,
        });
        for session in &group.sessions {
            if session.status == SessionStatus::Pending && !session.depends_on.is_empty() {
                self.bus.emit(&SdkEvent::DependencyWaiting {
                    group_id: group_id.to_string(),
                    session_id: session.id.to_string(),
                    waiting_on: session.depends_on.iter().map(|d| d.to_string()).collect(),
                    timestamp: now,
                });
            }
        }

        tracing::info!(group_id = %group_id, sessions = group.sessions.len(), "group run starting");
        self.execute_loop(group_id, &resolved).await;
        Ok(())
    }

    async fn prepare(
        &self,
        group_id: &GroupId,
        options: GroupRunOptions,
    ) -> Result<ResolvedOptions, RunnerError> {
        let group = self.repo.get(group_id).await?;
        let graph = DependencyGraph::build(&group.sessions)?;
        let resolved = resolve_options(options, &group.config);

        *self.graph.lock() = Some(graph);
        *self.group_id.lock() = Some(group_id.clone());
        *self.options.lock() = Some(resolved.clone());
        self.failures.store(0, Ordering::SeqCst);
        self.warning_emitted.store(false, Ordering::SeqCst);
        self.progress.start(self.clock.now());
        Ok(resolved)
    }

    /// Pause the run: interrupt the loop, SIGTERM every worker, persist
    /// everything as paused.
    pub async fn pause(&self, reason: PauseReason) -> Result<(), RunnerError> {
        {
            let mut state = self.state.lock();
            if *state != RunnerState::Running {
                return Err(RunnerError::InvalidState {
                    expected: "running",
                    actual: state.to_string(),
                });
            }
            *state = RunnerState::Paused;
        }
        self.interrupt.notify_one();

        let group_id = self.current_group_id()?;
        let workers: Vec<(SessionId, Worker)> = self.workers.lock().drain().collect();
        for (session_id, worker) in &workers {
            tracing::debug!(session_id = %session_id, "terminating worker for pause");
            if let Err(e) = worker.signaller.signal(Signal::Term).await {
                tracing::warn!(session_id = %session_id, error = %e, "SIGTERM failed");
            }
        }
        let now = self.clock.now();
        for (session_id, worker) in workers {
            let _ = worker.done_rx.await;
            // Terminated for pause means paused, not failed
            let _ = self
                .repo
                .update_session(
                    &group_id,
                    session_id.as_str(),
                    SessionPatch::status(SessionStatus::Paused),
                )
                .await;
            self.progress
                .record_status(session_id.as_str(), SessionStatus::Paused);
            if let Some(graph) = self.graph.lock().as_mut() {
                graph.mark_pending(&session_id);
            }
        }

        self.repo
            .update_group(
                &group_id,
                GroupPatch {
                    status: Some(GroupStatus::Paused),
                    updated_at: Some(now),
                    ..GroupPatch::default()
                },
            )
            .await?;
        self.bus.emit(&SdkEvent::GroupPaused {
            group_id: group_id.to_string(),
            running_sessions: 0,
            reason,
            timestamp: self.clock.now(),
        });
        tracing::info!(group_id = %group_id, %reason, "group paused");
        Ok(())
    }

    /// Resume a paused run; every subsequently-started session process gets
    /// `--resume`.
    pub async fn resume(&self) -> Result<(), RunnerError> {
        {
            let mut state = self.state.lock();
            if *state != RunnerState::Paused {
                return Err(RunnerError::InvalidState {
                    expected: "paused",
                    actual: state.to_string(),
                });
            }
            *state = RunnerState::Running;
        }
        let group_id = self.current_group_id()?;
        let resolved = {
            let mut options = self.options.lock();
            let Some(resolved) = options.as_mut() else {
                return Err(RunnerError::InvalidState {
                    expected: "paused",
                    actual: "no options".to_string(),
                });
            };
            resolved.resume = true;
            resolved.clone()
        };

        let now = self.clock.now();
        self.repo
            .update_group(
                &group_id,
                GroupPatch {
                    status: Some(GroupStatus::Running),
                    updated_at: Some(now),
                    ..GroupPatch::default()
                },
            )
            .await?;
        let pending_sessions = self
            .graph
            .lock()
            .as_ref()
            .map(|g| g.remaining_count())
            .unwrap_or(0);
        self.bus.emit(&SdkEvent::GroupResumed {
            group_id: group_id.to_string(),
            pending_sessions,
            timestamp: now,
        });
        tracing::info!(group_id = %group_id, pending_sessions, "group resumed");

        self.execute_loop(&group_id, &resolved).await;
        Ok(())
    }

    /// Stop the run for good: SIGKILL workers, persist running sessions as
    /// failed, group as failed. Terminal; a stopped run cannot resume.
    pub async fn stop(&self) -> Result<(), RunnerError> {
        {
            let mut state = self.state.lock();
            if !matches!(*state, RunnerState::Running | RunnerState::Paused) {
                return Err(RunnerError::InvalidState {
                    expected: "running or paused",
                    actual: state.to_string(),
                });
            }
            *state = RunnerState::Stopped;
        }
        self.interrupt.notify_one();

        let group_id = self.current_group_id()?;
        let workers: Vec<(SessionId, Worker)> = self.workers.lock().drain().collect();
        for (session_id, worker) in &workers {
            if let Err(e) = worker.signaller.signal(Signal::Kill).await {
                tracing::warn!(session_id = %session_id, error = %e, "SIGKILL failed");
            }
        }
        let now = self.clock.now();
        for (session_id, worker) in workers {
            let _ = worker.done_rx.await;
            let _ = self
                .repo
                .update_session(
                    &group_id,
                    session_id.as_str(),
                    SessionPatch::status(SessionStatus::Failed).with_completed_at(now),
                )
                .await;
            self.progress
                .record_status(session_id.as_str(), SessionStatus::Failed);
            if let Some(graph) = self.graph.lock().as_mut() {
                graph.mark_failed(&session_id);
            }
        }

        self.repo
            .update_group(
                &group_id,
                GroupPatch {
                    status: Some(GroupStatus::Failed),
                    completed_at: Some(now),
                    updated_at: Some(now),
                    ..GroupPatch::default()
                },
            )
            .await?;
        self.bus.emit(&SdkEvent::GroupFailed {
            group_id: group_id.to_string(),
            reason: "Manually stopped".to_string(),
            timestamp: now,
        });
        tracing::info!(group_id = %group_id, "group stopped");
        Ok(())
    }

    fn current_group_id(&self) -> Result<GroupId, RunnerError> {
        self.group_id
            .lock()
            .clone()
            .ok_or(RunnerError::InvalidState {
                expected: "a prepared run",
                actual: "no group".to_string(),
            })
    }

    fn is_running(&self) -> bool {
        *self.state.lock() == RunnerState::Running
    }

    async fn execute_loop(&self, group_id: &GroupId, options: &ResolvedOptions) {
        let capacity = (options.max_concurrent * 2).max(8);
        let (results_tx, mut results_rx) = mpsc::channel::<(SessionId, ExitResult)>(capacity);

        loop {
            if self.check_budget(group_id, options).await {
                break;
            }
            if !self.is_running() {
                break;
            }

            let ready = {
                let graph = self.graph.lock();
                graph
                    .as_ref()
                    .map(|g| g.ready(options.respect_dependencies))
                    .unwrap_or_default()
            };

            if ready.is_empty() && self.workers.lock().is_empty() {
                let blocked = self
                    .graph
                    .lock()
                    .as_ref()
                    .map(|g| g.blocked())
                    .unwrap_or_default();
                if blocked.is_empty() {
                    self.complete_group(group_id).await;
                } else {
                    tracing::warn!(group_id = %group_id, blocked = blocked.len(), "run is blocked");
                    self.fail_group(group_id, "blocked by failed dependencies")
                        .await;
                }
                break;
            }

            let mut ready_iter = ready.into_iter();
            while self.workers.lock().len() < options.max_concurrent && self.is_running() {
                let Some(session_id) = ready_iter.next() else {
                    break;
                };
                self.start_session(group_id, &session_id, options, &results_tx)
                    .await;
            }

            if !self.workers.lock().is_empty() {
                tokio::select! {
                    completion = results_rx.recv() => {
                        if let Some((session_id, exit)) = completion {
                            self.handle_completion(group_id, &session_id, exit).await;
                        }
                    }
                    _ = self.interrupt.notified() => {
                        // pause/stop owns the workers from here; a stale
                        // permit from a finished run is ignored
                        if !self.is_running() {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Materialize config and spawn the engine for one session.
    async fn start_session(
        &self,
        group_id: &GroupId,
        session_id: &SessionId,
        options: &ResolvedOptions,
        results_tx: &mpsc::Sender<(SessionId, ExitResult)>,
    ) {
        if let Some(graph) = self.graph.lock().as_mut() {
            graph.mark_active(session_id);
        }

        let group = match self.repo.get(group_id).await {
            Ok(group) => group,
            Err(e) => {
                self.handle_session_failure(group_id, session_id, e.to_string())
                    .await;
                return;
            }
        };
        let Some(session) = group.session(session_id.as_str()).cloned() else {
            self.handle_session_failure(group_id, session_id, "session not in group".to_string())
                .await;
            return;
        };

        let config = match self
            .config_gen
            .generate_session_config(&session, &group)
            .await
        {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "config generation failed");
                self.handle_session_failure(
                    group_id,
                    session_id,
                    "Configuration generation failed".to_string(),
                )
                .await;
                return;
            }
        };

        let mut args = vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
        ];
        if options.resume {
            args.push("--resume".to_string());
        }
        args.push(session.prompt.clone());
        let env = vec![(
            "ENGINE_CONFIG_DIR".to_string(),
            config.config_dir.display().to_string(),
        )];

        let mut handle = match self
            .processes
            .spawn(&options.engine_cmd, &args, &session.project_path, &env)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.handle_session_failure(group_id, session_id, e.to_string())
                    .await;
                return;
            }
        };

        let now = self.clock.now();
        let (done_tx, done_rx) = oneshot::channel();
        self.workers.lock().insert(
            session_id.clone(),
            Worker {
                signaller: handle.signaller(),
                done_rx,
                started_at: now,
            },
        );

        let _ = self
            .repo
            .update_session(
                group_id,
                session_id.as_str(),
                SessionPatch::status(SessionStatus::Active).with_started_at(now),
            )
            .await;
        self.progress
            .record_status(session_id.as_str(), SessionStatus::Active);
        self.progress.record_started(session_id.as_str(), now);
        self.bus.emit(&SdkEvent::GroupSessionStarted {
            group_id: group_id.to_string(),
            session_id: session_id.to_string(),
            timestamp: now,
        });
        tracing::info!(group_id = %group_id, session_id = %session_id, pid = ?handle.pid(), "session started");

        let stdout = handle.take_stdout();
        let stderr = handle.take_stderr();
        let repo = Arc::clone(&self.repo);
        let cost = Arc::clone(&self.cost);
        let progress = Arc::clone(&self.progress);
        let results_tx = results_tx.clone();
        let group_id = group_id.clone();
        let session_id = session_id.clone();

        tokio::spawn(async move {
            let drain = stdout.map(|rx| {
                let repo = Arc::clone(&repo);
                let cost = Arc::clone(&cost);
                let progress = Arc::clone(&progress);
                let group_id = group_id.clone();
                let session_id = session_id.clone();
                tokio::spawn(drain_stdout(
                    rx, repo, cost, progress, group_id, session_id,
                ))
            });
            let stderr_drain = stderr.map(|rx| {
                let session_id = session_id.clone();
                tokio::spawn(async move {
                    let mut rx = rx;
                    while let Some(line) = rx.recv().await {
                        tracing::trace!(session_id = %session_id, line, "engine stderr");
                    }
                })
            });

            let exit = handle.wait().await;
            if let Some(task) = drain {
                let _ = task.await;
            }
            if let Some(task) = stderr_drain {
                let _ = task.await;
            }

            // Exactly one completion message per worker; pause/stop paths
            // read done instead of the results channel.
            let _ = results_tx.try_send((session_id, exit));
            let _ = done_tx.send(());
        });
    }

    async fn handle_completion(
        &self,
        group_id: &GroupId,
        session_id: &SessionId,
        exit: ExitResult,
    ) {
        let worker = self.workers.lock().remove(session_id);
        let now = self.clock.now();
        let duration_ms = worker
            .as_ref()
            .map(|w| (now - w.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0);

        match exit {
            Ok(Some(0)) => {
                if let Some(graph) = self.graph.lock().as_mut() {
                    graph.mark_completed(session_id);
                }
                self.progress
                    .record_status(session_id.as_str(), SessionStatus::Completed);
                self.progress.record_duration(session_id.as_str(), duration_ms);
                let _ = self
                    .repo
                    .update_session(
                        group_id,
                        session_id.as_str(),
                        SessionPatch::status(SessionStatus::Completed).with_completed_at(now),
                    )
                    .await;
                self.bus.emit(&SdkEvent::GroupSessionCompleted {
                    group_id: group_id.to_string(),
                    session_id: session_id.to_string(),
                    status: SessionStatus::Completed,
                    duration_ms,
                    timestamp: now,
                });
                tracing::info!(
                    group_id = %group_id,
                    session_id = %session_id,
                    duration = %format_duration_ms(duration_ms),
                    "session completed"
                );

                let resolved = self
                    .graph
                    .lock()
                    .as_ref()
                    .map(|g| g.resolved_dependents(session_id))
                    .unwrap_or_default();
                for dependent in resolved {
                    self.bus.emit(&SdkEvent::DependencyResolved {
                        group_id: group_id.to_string(),
                        session_id: dependent.to_string(),
                        timestamp: now,
                    });
                }
            }
            Ok(Some(code)) => {
                self.handle_session_failure(
                    group_id,
                    session_id,
                    format!("engine exited with code {}", code),
                )
                .await;
            }
            Ok(None) => {
                self.handle_session_failure(
                    group_id,
                    session_id,
                    "engine terminated by signal".to_string(),
                )
                .await;
            }
            Err(e) => {
                self.handle_session_failure(group_id, session_id, e.to_string())
                    .await;
            }
        }

        if let Some(progress) = self.progress.session(session_id.as_str()) {
            self.bus.emit(&SdkEvent::SessionProgress {
                group_id: group_id.to_string(),
                session_id: session_id.to_string(),
                progress,
                timestamp: self.clock.now(),
            });
        }
        if let Ok(group) = self.repo.get(group_id).await {
            self.bus.emit(&SdkEvent::GroupProgress {
                group_id: group_id.to_string(),
                progress: self.progress.compute(&group, self.clock.now()),
                timestamp: self.clock.now(),
            });
        }
    }

    async fn handle_session_failure(
        &self,
        group_id: &GroupId,
        session_id: &SessionId,
        error: String,
    ) {
        let now = self.clock.now();
        if let Some(graph) = self.graph.lock().as_mut() {
            graph.mark_failed(session_id);
        }
        self.progress
            .record_status(session_id.as_str(), SessionStatus::Failed);
        let _ = self
            .repo
            .update_session(
                group_id,
                session_id.as_str(),
                SessionPatch::status(SessionStatus::Failed).with_completed_at(now),
            )
            .await;
        self.bus.emit(&SdkEvent::GroupSessionFailed {
            group_id: group_id.to_string(),
            session_id: session_id.to_string(),
            error: error.clone(),
            timestamp: now,
        });
        tracing::warn!(group_id = %group_id, session_id = %session_id, error, "session failed");

        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        let (pause_on_error, threshold) = {
            let options = self.options.lock();
            options
                .as_ref()
                .map(|o| (o.pause_on_error, o.error_threshold))
                .unwrap_or((true, DEFAULT_ERROR_THRESHOLD))
        };
        if pause_on_error && failures >= threshold {
            tracing::warn!(group_id = %group_id, failures, threshold, "error threshold reached");
            if let Err(e) = self.pause(PauseReason::ErrorThreshold).await {
                tracing::debug!(error = %e, "error-threshold pause skipped");
            }
        }
    }

    /// Budget gate: warn once per run, then dispatch the configured action
    /// once the ceiling is hit. Returns true when the loop must break.
    async fn check_budget(&self, group_id: &GroupId, options: &ResolvedOptions) -> bool {
        let Ok(group) = self.repo.get(group_id).await else {
            return false;
        };
        let Some(max_budget) = group.config.max_budget_usd else {
            return false;
        };
        let progress = self.progress.compute(&group, self.clock.now());
        let cost = progress.totals.cost_usd;

        if is_budget_warning(cost, max_budget, group.config.warning_threshold)
            && !self.warning_emitted.swap(true, Ordering::SeqCst)
        {
            self.bus.emit(&SdkEvent::BudgetWarning {
                group_id: group_id.to_string(),
                cost_usd: cost,
                max_budget_usd: max_budget,
                threshold: group.config.warning_threshold,
                timestamp: self.clock.now(),
            });
        }

        if !is_budget_exceeded(cost, max_budget) {
            return false;
        }
        let action = group.config.on_budget_exceeded;
        self.bus.emit(&SdkEvent::BudgetExceeded {
            group_id: group_id.to_string(),
            cost_usd: cost,
            max_budget_usd: max_budget,
            action,
            timestamp: self.clock.now(),
        });
        tracing::warn!(group_id = %group_id, cost, max_budget, ?action, "budget exceeded");
        match action {
            BudgetAction::Stop => {
                if let Err(e) = self.stop().await {
                    tracing::debug!(error = %e, "budget stop skipped");
                }
                true
            }
            BudgetAction::Pause => {
                if let Err(e) = self.pause(PauseReason::BudgetExceeded).await {
                    tracing::debug!(error = %e, "budget pause skipped");
                }
                true
            }
            BudgetAction::Warn => false,
        }
    }

    async fn complete_group(&self, group_id: &GroupId) {
        *self.state.lock() = RunnerState::Completed;
        let now = self.clock.now();
        let _ = self
            .repo
            .update_group(
                group_id,
                GroupPatch {
                    status: Some(GroupStatus::Completed),
                    completed_at: Some(now),
                    updated_at: Some(now),
                    ..GroupPatch::default()
                },
            )
            .await;

        let (completed, failed, total_cost_usd, elapsed_ms) = match self.repo.get(group_id).await {
            Ok(group) => {
                let progress = self.progress.compute(&group, now);
                (
                    progress.counts.completed,
                    progress.counts.failed,
                    progress.totals.cost_usd,
                    progress.totals.elapsed_ms,
                )
            }
            Err(_) => (0, 0, 0.0, 0),
        };
        self.bus.emit(&SdkEvent::GroupCompleted {
            group_id: group_id.to_string(),
            completed,
            failed,
            total_cost_usd,
            elapsed_ms,
            timestamp: now,
        });
        tracing::info!(group_id = %group_id, completed, failed, "group completed");
    }

    async fn fail_group(&self, group_id: &GroupId, reason: &str) {
        *self.state.lock() = RunnerState::Stopped;
        let now = self.clock.now();
        let _ = self
            .repo
            .update_group(
                group_id,
                GroupPatch {
                    status: Some(GroupStatus::Failed),
                    completed_at: Some(now),
                    updated_at: Some(now),
                    ..GroupPatch::default()
                },
            )
            .await;
        self.bus.emit(&SdkEvent::GroupFailed {
            group_id: group_id.to_string(),
            reason: reason.to_string(),
            timestamp: now,
        });
        tracing::warn!(group_id = %group_id, reason, "group failed");
    }
}

/// Drain engine stdout: capture the engine session id and cost records.
async fn drain_stdout(
    mut rx: muster_adapters::LineStream,
    repo: Arc<dyn GroupRepository>,
    cost: Arc<dyn CostExtractor>,
    progress: Arc<ProgressAggregator>,
    group_id: GroupId,
    session_id: SessionId,
) {
    let mut engine_id_seen = false;
    while let Some(line) = rx.recv().await {
        let Ok(record) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        if !engine_id_seen {
            if let Some(engine_id) = record.get("sessionId").and_then(|v| v.as_str()) {
                engine_id_seen = true;
                let _ = repo
                    .update_session(
                        &group_id,
                        session_id.as_str(),
                        SessionPatch::default().with_engine_session_id(engine_id.into()),
                    )
                    .await;
            }
        }
        if let Some(delta) = cost.extract(&record) {
            progress.record_cost(session_id.as_str(), delta);
            let _ = repo
                .update_session(
                    &group_id,
                    session_id.as_str(),
                    SessionPatch {
                        cost_usd: progress.session(session_id.as_str()).map(|p| p.cost_usd),
                        ..SessionPatch::default()
                    },
                )
                .await;
        }
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
