// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process manager for deterministic testing

use super::{
    LineStream, ProcessError, ProcessHandle, ProcessManager, ProcessSignaller, Signal,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Recorded call to [`FakeProcessManager::spawn`].
#[derive(Debug, Clone)]
pub struct SpawnRecord {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub pid: u32,
}

enum ExitPlan {
    /// Exit immediately with this code.
    Immediate(i32),
    /// Stay alive until signalled or released through a [`ProcessControl`].
    Held,
}

struct Script {
    stdout: Vec<String>,
    stderr: Vec<String>,
    exit: ExitPlan,
}

/// Shared liveness state of one fake process.
///
/// Resolving the exit also drops the stdout/stderr senders so line channels
/// close at process death, matching the real adapter's EOF behavior.
struct ProcState {
    exit_tx: Option<oneshot::Sender<Option<i32>>>,
    stdout_tx: Option<mpsc::Sender<String>>,
    stderr_tx: Option<mpsc::Sender<String>>,
}

type ProcSlot = Arc<Mutex<ProcState>>;

fn resolve(slot: &ProcSlot, code: Option<i32>) {
    let mut state = slot.lock();
    if let Some(tx) = state.exit_tx.take() {
        let _ = tx.send(code);
    }
    state.stdout_tx.take();
    state.stderr_tx.take();
}

/// Remote control for a held fake process.
#[derive(Clone)]
pub struct ProcessControl {
    pid: u32,
    slot: ProcSlot,
}

impl ProcessControl {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Feed a line to the process's stdout. No-op once the process exited.
    pub fn push_stdout(&self, line: impl Into<String>) {
        if let Some(tx) = self.slot.lock().stdout_tx.as_ref() {
            let _ = tx.try_send(line.into());
        }
    }

    /// Complete the process with an exit code.
    pub fn exit(&self, code: i32) {
        resolve(&self.slot, Some(code));
    }

    /// True while nothing has resolved the process yet.
    pub fn is_running(&self) -> bool {
        self.slot.lock().exit_tx.is_some()
    }
}

#[derive(Default)]
struct FakeState {
    spawns: Vec<SpawnRecord>,
    scripts: VecDeque<Script>,
    controls: Vec<ProcessControl>,
    signals: Vec<(u32, Signal)>,
    next_pid: u32,
    spawn_error: Option<String>,
}

/// Fake process manager.
///
/// Scripts are consumed in spawn order; a spawn with no script exits
/// immediately with code 0 and no output. Held processes resolve when
/// signalled (as signal-terminated, exit code `None`) or when completed
/// through their [`ProcessControl`].
#[derive(Clone, Default)]
pub struct FakeProcessManager {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a process that exits immediately with `code`.
    pub fn script_exit(&self, code: i32) {
        self.inner.lock().scripts.push_back(Script {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit: ExitPlan::Immediate(code),
        });
    }

    /// Queue a process that prints `stdout` lines then exits with `code`.
    pub fn script_with_stdout(&self, stdout: Vec<String>, code: i32) {
        self.inner.lock().scripts.push_back(Script {
            stdout,
            stderr: Vec::new(),
            exit: ExitPlan::Immediate(code),
        });
    }

    /// Queue a process that stays alive until signalled or released.
    pub fn script_held(&self) {
        self.inner.lock().scripts.push_back(Script {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit: ExitPlan::Held,
        });
    }

    /// Fail the next spawn with the given message.
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.inner.lock().spawn_error = Some(message.into());
    }

    /// All recorded spawns, in order.
    pub fn spawns(&self) -> Vec<SpawnRecord> {
        self.inner.lock().spawns.clone()
    }

    /// Controls for every spawned process, in spawn order.
    pub fn controls(&self) -> Vec<ProcessControl> {
        self.inner.lock().controls.clone()
    }

    /// All signals delivered so far, as `(pid, signal)`.
    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.inner.lock().signals.clone()
    }

    /// Number of processes still alive.
    pub fn running_count(&self) -> usize {
        self.inner
            .lock()
            .controls
            .iter()
            .filter(|c| c.is_running())
            .count()
    }
}

struct FakeHandle {
    pid: u32,
    stdout: Option<LineStream>,
    stderr: Option<LineStream>,
    exit_rx: Option<oneshot::Receiver<Option<i32>>>,
    slot: ProcSlot,
    manager: FakeProcessManager,
}

struct FakeSignaller {
    pid: u32,
    slot: ProcSlot,
    manager: FakeProcessManager,
}

#[async_trait]
impl ProcessManager for FakeProcessManager {
    async fn spawn(
        &self,
        cmd: &str,
        args: &[String],
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        let (script, pid) = {
            let mut inner = self.inner.lock();
            if let Some(message) = inner.spawn_error.take() {
                return Err(ProcessError::SpawnFailed(message));
            }
            inner.next_pid += 1;
            let pid = 1000 + inner.next_pid;
            let script = inner.scripts.pop_front().unwrap_or(Script {
                stdout: Vec::new(),
                stderr: Vec::new(),
                exit: ExitPlan::Immediate(0),
            });
            inner.spawns.push(SpawnRecord {
                cmd: cmd.to_string(),
                args: args.to_vec(),
                cwd: cwd.to_path_buf(),
                env: env.to_vec(),
                pid,
            });
            (script, pid)
        };

        let (stdout_tx, stdout_rx) = mpsc::channel(64);
        let (stderr_tx, stderr_rx) = mpsc::channel(64);
        for line in script.stdout {
            let _ = stdout_tx.try_send(line);
        }
        for line in script.stderr {
            let _ = stderr_tx.try_send(line);
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        let slot: ProcSlot = Arc::new(Mutex::new(ProcState {
            exit_tx: Some(exit_tx),
            stdout_tx: Some(stdout_tx),
            stderr_tx: Some(stderr_tx),
        }));

        if let ExitPlan::Immediate(code) = script.exit {
            resolve(&slot, Some(code));
        }

        self.inner.lock().controls.push(ProcessControl {
            pid,
            slot: Arc::clone(&slot),
        });

        Ok(Box::new(FakeHandle {
            pid,
            stdout: Some(stdout_rx),
            stderr: Some(stderr_rx),
            exit_rx: Some(exit_rx),
            slot,
            manager: self.clone(),
        }))
    }
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn take_stdout(&mut self) -> Option<LineStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<LineStream> {
        self.stderr.take()
    }

    fn signaller(&self) -> Box<dyn ProcessSignaller> {
        Box::new(FakeSignaller {
            pid: self.pid,
            slot: Arc::clone(&self.slot),
            manager: self.manager.clone(),
        })
    }

    async fn wait(&mut self) -> Result<Option<i32>, ProcessError> {
        let Some(rx) = self.exit_rx.take() else {
            return Err(ProcessError::WaitFailed("already waited".into()));
        };
        // A dropped sender counts as signal termination
        Ok(rx.await.unwrap_or(None))
    }
}

#[async_trait]
impl ProcessSignaller for FakeSignaller {
    async fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        self.manager.inner.lock().signals.push((self.pid, signal));
        resolve(&self.slot, None);
        Ok(())
    }
}
