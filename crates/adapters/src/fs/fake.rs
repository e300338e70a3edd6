// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake in-memory filesystem for deterministic testing

use super::{ChangeStream, FileStat, FileSystem, FsError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct FakeFsState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: Vec<PathBuf>,
    watchers: HashMap<PathBuf, Vec<mpsc::Sender<()>>>,
}

/// In-memory filesystem with manual change notification.
///
/// Writes through the test-facing mutators (`put`, `append`, `truncate`)
/// notify any active watchers, mirroring how the real adapter surfaces
/// file modification events.
#[derive(Clone, Default)]
pub struct FakeFileSystem {
    inner: Arc<Mutex<FakeFsState>>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file without notifying watchers.
    pub fn seed(&self, path: impl Into<PathBuf>, contents: impl AsRef<[u8]>) {
        self.inner
            .lock()
            .files
            .insert(path.into(), contents.as_ref().to_vec());
    }

    /// Create or replace a file and notify watchers.
    pub fn put(&self, path: impl Into<PathBuf>, contents: impl AsRef<[u8]>) {
        let path = path.into();
        self.inner
            .lock()
            .files
            .insert(path.clone(), contents.as_ref().to_vec());
        self.notify(&path);
    }

    /// Append bytes to a file (creating it if absent) and notify watchers.
    pub fn append(&self, path: impl Into<PathBuf>, contents: impl AsRef<[u8]>) {
        let path = path.into();
        self.inner
            .lock()
            .files
            .entry(path.clone())
            .or_default()
            .extend_from_slice(contents.as_ref());
        self.notify(&path);
    }

    /// Truncate a file to zero bytes and notify watchers.
    pub fn truncate(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.inner.lock().files.insert(path.clone(), Vec::new());
        self.notify(&path);
    }

    /// Remove a file and notify watchers.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.inner.lock().files.remove(&path);
        self.notify(&path);
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.inner.lock().files.get(path.as_ref()).cloned()
    }

    fn notify(&self, path: &Path) {
        let senders = {
            let mut inner = self.inner.lock();
            if let Some(senders) = inner.watchers.get_mut(path) {
                senders.retain(|tx| !tx.is_closed());
                senders.clone()
            } else {
                Vec::new()
            }
        };
        for tx in senders {
            let _ = tx.try_send(());
        }
    }
}

#[async_trait]
impl FileSystem for FakeFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        let inner = self.inner.lock();
        inner.files.contains_key(path) || inner.dirs.iter().any(|d| d == path)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        let inner = self.inner.lock();
        let bytes = inner
            .files
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError> {
        self.put(path.to_path_buf(), bytes);
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        self.inner.lock().dirs.push(path.to_path_buf());
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, FsError> {
        let inner = self.inner.lock();
        let bytes = inner
            .files
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
        Ok(FileStat {
            size: bytes.len() as u64,
        })
    }

    async fn watch(&self, path: &Path) -> Result<ChangeStream, FsError> {
        let (tx, rx) = mpsc::channel(32);
        self.inner
            .lock()
            .watchers
            .entry(path.to_path_buf())
            .or_default()
            .push(tx);
        Ok(ChangeStream::new(rx))
    }
}
