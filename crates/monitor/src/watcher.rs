// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only transcript tailing.
//!
//! One tail task per watched file: raw change notifications arm a debounce
//! timer; when it fires the file is stat'ed and the bytes past the tracked
//! offset are published as one chunk. A shrinking file means truncation or
//! rotation and resets the offset to zero. Multiple files fair-merge into
//! one stream; one file's tail ending does not end the merge.

use chrono::{DateTime, Utc};
use muster_adapters::FileSystem;
use muster_core::Clock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant};

/// Watcher configuration.
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Quiet window between a raw change and the read, in milliseconds.
    pub debounce_ms: u64,
    /// Emit the file's existing content as one chunk on start.
    pub include_existing: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            include_existing: false,
        }
    }
}

/// Bytes appended to a watched file since the previous emission.
#[derive(Debug, Clone, PartialEq)]
pub struct FileChange {
    pub path: PathBuf,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Consumer end of a watch.
pub struct FileChangeStream {
    rx: mpsc::Receiver<FileChange>,
}

impl FileChangeStream {
    /// Next appended chunk; `None` once every tail has ended or the watcher
    /// stopped.
    pub async fn next(&mut self) -> Option<FileChange> {
        self.rx.recv().await
    }
}

/// Tails one or more append-only files.
pub struct TranscriptWatcher {
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    config: WatcherConfig,
    stop_tx: watch::Sender<bool>,
}

impl TranscriptWatcher {
    pub fn new(fs: Arc<dyn FileSystem>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(fs, clock, WatcherConfig::default())
    }

    pub fn with_config(
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        config: WatcherConfig,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            fs,
            clock,
            config,
            stop_tx,
        }
    }

    /// Tail a single file.
    pub async fn watch(&self, path: &Path) -> FileChangeStream {
        let paths = [path.to_path_buf()];
        self.watch_many(&paths).await
    }

    /// Tail several files, fair-merged into one stream.
    pub async fn watch_many(&self, paths: &[PathBuf]) -> FileChangeStream {
        let (tx, rx) = mpsc::channel(64);
        for path in paths {
            let params = TailParams {
                fs: Arc::clone(&self.fs),
                clock: Arc::clone(&self.clock),
                config: self.config,
                path: path.clone(),
                tx: tx.clone(),
                stop_rx: self.stop_tx.subscribe(),
            };
            tokio::spawn(tail_file(params));
        }
        FileChangeStream { rx }
    }

    /// Stop every tail started from this watcher. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

struct TailParams {
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    config: WatcherConfig,
    path: PathBuf,
    tx: mpsc::Sender<FileChange>,
    stop_rx: watch::Receiver<bool>,
}

async fn tail_file(params: TailParams) {
    let TailParams {
        fs,
        clock,
        config,
        path,
        tx,
        mut stop_rx,
    } = params;

    if *stop_rx.borrow() {
        return;
    }

    // Existing content: emitted when requested; the offset starts at the
    // current size either way so only new bytes flow after this point.
    let initial = match fs.read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.is_not_found() => String::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "initial transcript read failed");
            String::new()
        }
    };
    let mut offset = initial.len() as u64;
    if config.include_existing && !initial.is_empty() {
        emit(&tx, &clock, &path, initial).await;
    }

    let mut changes = match fs.watch(&path).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "file watch failed");
            return;
        }
    };

    let debounce = Duration::from_millis(config.debounce_ms);
    let timer = sleep(Duration::from_secs(0));
    tokio::pin!(timer);
    let mut armed = false;

    loop {
        tokio::select! {
            change = changes.next() => match change {
                Some(()) => {
                    // Only the most recent pending fire matters
                    timer.as_mut().reset(Instant::now() + debounce);
                    armed = true;
                }
                None => {
                    if armed {
                        read_new_content(&*fs, &clock, &path, &tx, &mut offset).await;
                    }
                    tracing::debug!(path = %path.display(), "change stream ended");
                    break;
                }
            },
            () = &mut timer, if armed => {
                armed = false;
                read_new_content(&*fs, &clock, &path, &tx, &mut offset).await;
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
}

/// Read bytes past the offset and publish them as one change.
async fn read_new_content(
    fs: &dyn FileSystem,
    clock: &Arc<dyn Clock>,
    path: &Path,
    tx: &mpsc::Sender<FileChange>,
    offset: &mut u64,
) {
    let size = match fs.stat(path).await {
        Ok(stat) => stat.size,
        Err(_) => 0,
    };
    if size < *offset {
        // Truncation or rotation: start over from the top
        tracing::debug!(path = %path.display(), size, offset = *offset, "file shrank, resetting offset");
        *offset = 0;
    }
    if size == *offset {
        return;
    }

    let content = match fs.read_to_string(path).await {
        Ok(content) => content,
        Err(_) => {
            // Transient read failure is treated like truncation
            *offset = 0;
            return;
        }
    };
    let start = *offset as usize;
    let Some(appended) = content.get(start..) else {
        *offset = 0;
        return;
    };
    *offset = content.len() as u64;
    if !appended.is_empty() {
        emit(tx, clock, path, appended.to_string()).await;
    }
}

async fn emit(
    tx: &mpsc::Sender<FileChange>,
    clock: &Arc<dyn Clock>,
    path: &Path,
    content: String,
) {
    let change = FileChange {
        path: path.to_path_buf(),
        content,
        timestamp: clock.now(),
    };
    let _ = tx.send(change).await;
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
