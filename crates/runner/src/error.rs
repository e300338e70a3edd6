// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner error types.

use muster_adapters::{ProcessError, RepoError};
use thiserror::Error;

/// Errors surfaced synchronously from runner entry points.
///
/// Long-running execute loops never propagate errors; they persist a
/// terminal status and emit `group_failed` / `queue_failed` instead.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("run already in progress for {0}")]
    AlreadyRunning(String),

    #[error("command index out of range: {0}")]
    CommandIndex(usize),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}
