// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor error types.

use muster_adapters::{FsError, RepoError};
use thiserror::Error;

/// Errors from the session and group monitors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("group monitor not started")]
    NotStarted,
}
