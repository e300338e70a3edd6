// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem port: reads, stats, and change notification streams.

mod local;

pub use local::LocalFileSystem;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeFileSystem;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from filesystem operations
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(PathBuf),
    #[error("watch failed: {0}")]
    Watch(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// True for missing-file errors, which tailing treats as "empty so far".
    pub fn is_not_found(&self) -> bool {
        match self {
            FsError::NotFound(_) => true,
            FsError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            FsError::Watch(_) => false,
        }
    }
}

/// File metadata the watcher cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// Stream of change notifications for one watched path.
///
/// Holds the platform watcher guard alive for as long as the stream exists;
/// dropping the stream releases the watch.
pub struct ChangeStream {
    rx: mpsc::Receiver<()>,
    _guard: Option<Box<dyn std::any::Any + Send>>,
}

impl ChangeStream {
    pub fn new(rx: mpsc::Receiver<()>) -> Self {
        Self { rx, _guard: None }
    }

    pub fn with_guard(rx: mpsc::Receiver<()>, guard: Box<dyn std::any::Any + Send>) -> Self {
        Self {
            rx,
            _guard: Some(guard),
        }
    }

    /// Next raw change notification; `None` once the watch has ended.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Filesystem capability consumed by the monitor crates.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;

    async fn read_to_string(&self, path: &Path) -> Result<String, FsError>;

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError>;

    async fn create_dir_all(&self, path: &Path) -> Result<(), FsError>;

    async fn stat(&self, path: &Path) -> Result<FileStat, FsError>;

    /// Subscribe to raw change notifications for a single path.
    async fn watch(&self, path: &Path) -> Result<ChangeStream, FsError>;
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
