// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real filesystem backed by tokio::fs and `notify` change notifications.

use super::{ChangeStream, FileStat, FileSystem, FsError};
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

/// Production filesystem adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::NotFound(path.to_path_buf())
            } else {
                FsError::Io(e)
            }
        })
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError> {
        tokio::fs::write(path, bytes).await.map_err(FsError::Io)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        tokio::fs::create_dir_all(path).await.map_err(FsError::Io)
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, FsError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::NotFound(path.to_path_buf())
            } else {
                FsError::Io(e)
            }
        })?;
        Ok(FileStat {
            size: metadata.len(),
        })
    }

    async fn watch(&self, path: &Path) -> Result<ChangeStream, FsError> {
        let (tx, rx) = mpsc::channel(32);
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: Result<notify::Event, _>| {
                if res.is_ok() {
                    let _ = tx.blocking_send(());
                }
            })
            .map_err(|e| FsError::Watch(e.to_string()))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| FsError::Watch(e.to_string()))?;

        Ok(ChangeStream::with_guard(rx, Box::new(watcher)))
    }
}
