// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group-wide monitoring: one session monitor per engine-backed session,
//! merged into a single event stream.

use crate::error::MonitorError;
use crate::session::{MonitorStream, SessionMonitor, TranscriptPaths};
use crate::state::StateManager;
use crate::watcher::WatcherConfig;
use muster_adapters::{FileSystem, GroupRepository};
use muster_bus::EventBus;
use muster_core::{Clock, GroupId, MonitorEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Merges the monitor streams of every session in a group.
///
/// Children share one [`StateManager`], so per-session aggregates stay
/// queryable through the group monitor regardless of which child produced
/// an event.
pub struct GroupMonitor {
    repo: Arc<dyn GroupRepository>,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    state: StateManager,
    paths: TranscriptPaths,
    watcher_config: WatcherConfig,
    bus: Option<EventBus>,
    children: Mutex<HashMap<String, SessionMonitor>>,
    merged_tx: Mutex<Option<mpsc::Sender<MonitorEvent>>>,
    stop_tx: watch::Sender<bool>,
}

impl GroupMonitor {
    pub fn new(
        repo: Arc<dyn GroupRepository>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        state: StateManager,
        paths: TranscriptPaths,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            repo,
            fs,
            clock,
            state,
            paths,
            watcher_config: WatcherConfig::default(),
            bus: None,
            children: Mutex::new(HashMap::new()),
            merged_tx: Mutex::new(None),
            stop_tx,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_watcher_config(mut self, config: WatcherConfig) -> Self {
        self.watcher_config = config;
        self
    }

    /// Shared state manager backing every child monitor.
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Load the group and start one child monitor per session that already
    /// has an engine session id.
    pub async fn watch(&self, group_id: &GroupId) -> Result<MonitorStream, MonitorError> {
        let group = self.repo.get(group_id).await?;

        let (tx, rx) = mpsc::channel(64);
        *self.merged_tx.lock() = Some(tx);

        let engine_ids: Vec<String> = group
            .sessions
            .iter()
            .filter_map(|s| s.engine_session_id.as_ref().map(|id| id.to_string()))
            .collect();
        tracing::debug!(
            group_id = %group_id,
            sessions = engine_ids.len(),
            "group monitor starting"
        );
        for engine_id in engine_ids {
            self.attach(&engine_id).await;
        }

        Ok(MonitorStream::new(rx))
    }

    /// Start monitoring an additional session at runtime.
    pub async fn add_session(&self, engine_session_id: &str) -> Result<(), MonitorError> {
        if self.merged_tx.lock().is_none() {
            return Err(MonitorError::NotStarted);
        }
        self.attach(engine_session_id).await;
        Ok(())
    }

    /// Stop monitoring one session; the merged stream keeps running.
    pub fn remove_session(&self, engine_session_id: &str) {
        if let Some(child) = self.children.lock().remove(engine_session_id) {
            child.stop();
        }
    }

    /// Stop the merged stream, then every child monitor. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.values() {
            child.stop();
        }
        // Dropping the sender lets the merged stream end once drained
        self.merged_tx.lock().take();
    }

    async fn attach(&self, engine_session_id: &str) {
        let Some(tx) = self.merged_tx.lock().clone() else {
            return;
        };
        let monitor = SessionMonitor::new(
            engine_session_id,
            Arc::clone(&self.fs),
            Arc::clone(&self.clock),
            self.state.clone(),
            self.paths.clone(),
        )
        .with_watcher_config(self.watcher_config);
        let monitor = match &self.bus {
            Some(bus) => monitor.with_bus(bus.clone()),
            None => monitor,
        };

        let mut stream = monitor.start().await;
        self.children
            .lock()
            .insert(engine_session_id.to_string(), monitor);

        // One outstanding recv per child, raced against the stop signal
        let mut stop_rx = self.stop_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = stream.next() => match event {
                        Some(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
