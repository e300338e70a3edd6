// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process port: spawn, line-oriented output, exit, signals.
//!
//! The engine is a black-box child process; exit code 0 is the only
//! authoritative success signal. Stdout/stderr are exposed as line channels
//! so callers can drain them in the background.

mod local;

pub use local::LocalProcessManager;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcessManager, ProcessControl, SpawnRecord};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("wait failed: {0}")]
    WaitFailed(String),
    #[error("signal failed: {0}")]
    SignalFailed(String),
}

/// Signals the runners send to engine processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful interruption (pause paths).
    Term,
    /// Forced kill (group stop).
    Kill,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Term => "TERM",
            Signal::Kill => "KILL",
        }
    }
}

/// Line channel for a child's stdout or stderr.
pub type LineStream = mpsc::Receiver<String>;

/// Clonable capability to signal a running process.
///
/// Split from [`ProcessHandle`] so a runner can signal workers while each
/// worker task exclusively owns its handle awaiting exit.
#[async_trait]
pub trait ProcessSignaller: Send + Sync {
    async fn signal(&self, signal: Signal) -> Result<(), ProcessError>;
}

/// A managed child process.
#[async_trait]
pub trait ProcessHandle: Send {
    fn pid(&self) -> Option<u32>;

    /// Take the stdout line channel. Yields each line once; `None` after the
    /// first call.
    fn take_stdout(&mut self) -> Option<LineStream>;

    /// Take the stderr line channel.
    fn take_stderr(&mut self) -> Option<LineStream>;

    /// Signal capability usable while `wait` is in flight elsewhere.
    fn signaller(&self) -> Box<dyn ProcessSignaller>;

    /// Await process exit. Returns the exit code, or `None` when terminated
    /// by a signal.
    async fn wait(&mut self) -> Result<Option<i32>, ProcessError>;
}

/// Process-manager capability consumed by the runners.
#[async_trait]
pub trait ProcessManager: Send + Sync {
    async fn spawn(
        &self,
        cmd: &str,
        args: &[String],
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<Box<dyn ProcessHandle>, ProcessError>;
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
