// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real process manager backed by tokio::process.
//!
//! Signals go to the child pid via `libc::kill`; tokio's `Child` only
//! exposes SIGKILL, and the pause paths need SIGTERM.

use super::{
    LineStream, ProcessError, ProcessHandle, ProcessManager, ProcessSignaller, Signal,
};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Production process manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessManager;

impl LocalProcessManager {
    pub fn new() -> Self {
        Self
    }
}

struct LocalProcessHandle {
    child: Child,
    pid: Option<u32>,
    stdout: Option<LineStream>,
    stderr: Option<LineStream>,
}

struct LocalSignaller {
    pid: Option<u32>,
}

fn spawn_line_pump<R>(reader: R) -> LineStream
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        // Read errors end the pump; exit code is the authoritative signal
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}

#[async_trait]
impl ProcessManager for LocalProcessManager {
    async fn spawn(
        &self,
        cmd: &str,
        args: &[String],
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        let mut command = Command::new(cmd);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(format!("{}: {}", cmd, e)))?;

        let pid = child.id();
        let stdout = child.stdout.take().map(spawn_line_pump);
        let stderr = child.stderr.take().map(spawn_line_pump);

        tracing::debug!(cmd, ?pid, cwd = %cwd.display(), "spawned engine process");

        Ok(Box::new(LocalProcessHandle {
            child,
            pid,
            stdout,
            stderr,
        }))
    }
}

#[async_trait]
impl ProcessHandle for LocalProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn take_stdout(&mut self) -> Option<LineStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<LineStream> {
        self.stderr.take()
    }

    fn signaller(&self) -> Box<dyn ProcessSignaller> {
        Box::new(LocalSignaller { pid: self.pid })
    }

    async fn wait(&mut self) -> Result<Option<i32>, ProcessError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ProcessError::WaitFailed(e.to_string()))?;
        Ok(status.code())
    }
}

#[async_trait]
impl ProcessSignaller for LocalSignaller {
    async fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        let Some(pid) = self.pid else {
            return Err(ProcessError::SignalFailed("process already gone".into()));
        };
        send_signal(pid, signal)
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let res = unsafe { libc::kill(pid as i32, sig) };
    if res == 0 {
        Ok(())
    } else {
        Err(ProcessError::SignalFailed(format!(
            "kill({}, {}) failed: {}",
            pid,
            sig,
            std::io::Error::last_os_error()
        )))
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, signal: Signal) -> Result<(), ProcessError> {
    Err(ProcessError::SignalFailed(format!(
        "{} not supported on this platform",
        signal.as_str()
    )))
}
