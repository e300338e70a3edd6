// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-session monitoring pipeline.
//!
//! Resolves the engine's transcript path for a session id, tails it, parses
//! appended chunks into monitor events, folds them into the shared state
//! manager, and yields them to the caller. When a bus is attached, session
//! events are also published as SDK events.

use crate::jsonl::JsonlParser;
use crate::parser::EventParser;
use crate::state::StateManager;
use crate::watcher::{TranscriptWatcher, WatcherConfig};
use muster_adapters::FileSystem;
use muster_bus::EventBus;
use muster_core::{Clock, MonitorEvent, SdkEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Resolves the well-known transcript location for an engine session.
///
/// Defaults to `{home}/.claude/sessions/{sessionId}/transcript.jsonl`; the
/// base is overridable for tests.
#[derive(Debug, Clone)]
pub struct TranscriptPaths {
    base: PathBuf,
}

impl TranscriptPaths {
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            base: home.join(".claude").join("sessions"),
        }
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn transcript(&self, session_id: &str) -> PathBuf {
        self.base.join(session_id).join("transcript.jsonl")
    }
}

impl Default for TranscriptPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer end of a monitor.
pub struct MonitorStream {
    rx: mpsc::Receiver<MonitorEvent>,
}

impl MonitorStream {
    pub(crate) fn new(rx: mpsc::Receiver<MonitorEvent>) -> Self {
        Self { rx }
    }

    /// Next monitor event; `None` once the monitor stopped and drained.
    pub async fn next(&mut self) -> Option<MonitorEvent> {
        self.rx.recv().await
    }
}

/// Monitors one engine session's transcript.
pub struct SessionMonitor {
    session_id: String,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    state: StateManager,
    paths: TranscriptPaths,
    watcher_config: WatcherConfig,
    bus: Option<EventBus>,
    watcher: TranscriptWatcher,
}

impl SessionMonitor {
    pub fn new(
        session_id: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        state: StateManager,
        paths: TranscriptPaths,
    ) -> Self {
        let watcher_config = WatcherConfig::default();
        let watcher =
            TranscriptWatcher::with_config(Arc::clone(&fs), Arc::clone(&clock), watcher_config);
        Self {
            session_id: session_id.into(),
            fs,
            clock,
            state,
            paths,
            watcher_config,
            bus: None,
            watcher,
        }
    }

    /// Publish session events on the bus as well as yielding them.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Override the watcher configuration (debounce, include-existing).
    pub fn with_watcher_config(mut self, config: WatcherConfig) -> Self {
        self.watcher_config = config;
        self.watcher = TranscriptWatcher::with_config(
            Arc::clone(&self.fs),
            Arc::clone(&self.clock),
            config,
        );
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.paths.transcript(&self.session_id)
    }

    /// Start tailing; events flow until `stop` or the tail ends.
    pub async fn start(&self) -> MonitorStream {
        let path = self.transcript_path();
        let mut changes = self.watcher.watch(&path).await;
        let (tx, rx) = mpsc::channel(64);

        let session_id = self.session_id.clone();
        let clock = Arc::clone(&self.clock);
        let state = self.state.clone();
        let bus = self.bus.clone();

        if let Some(bus) = &bus {
            bus.emit(&SdkEvent::SessionStarted {
                session_id: session_id.clone(),
                timestamp: clock.now(),
            });
        }

        tokio::spawn(async move {
            let mut jsonl = JsonlParser::new();
            let mut parser = EventParser::new(session_id.clone(), Arc::clone(&clock));

            while let Some(change) = changes.next().await {
                for raw in jsonl.feed(&change.content) {
                    for event in parser.parse(&raw) {
                        state.apply(&event);
                        publish(bus.as_ref(), &event);
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }

            // Tail ended: parse whatever is still buffered, then close the
            // session out so consumers see a terminal event.
            if let Some(raw) = jsonl.flush() {
                for event in parser.parse(&raw) {
                    state.apply(&event);
                    publish(bus.as_ref(), &event);
                    let _ = tx.send(event).await;
                }
            }
            let end = MonitorEvent::SessionEnd {
                session_id: session_id.clone(),
                status: "completed".to_string(),
                ts: clock.now(),
            };
            state.apply(&end);
            publish(bus.as_ref(), &end);
            let _ = tx.send(end).await;
            tracing::debug!(session_id, "session monitor drained");
        });

        MonitorStream::new(rx)
    }

    /// Stop tailing. Idempotent; unblocks any active stream consumer.
    pub fn stop(&self) {
        self.watcher.stop();
    }
}

/// Map a monitor event onto the SDK session family and publish it.
fn publish(bus: Option<&EventBus>, event: &MonitorEvent) {
    let Some(bus) = bus else {
        return;
    };
    let sdk = match event {
        MonitorEvent::ToolStart {
            session_id,
            tool,
            ts,
        } => Some(SdkEvent::ToolStarted {
            session_id: session_id.clone(),
            tool: tool.clone(),
            timestamp: *ts,
        }),
        MonitorEvent::ToolEnd {
            session_id,
            tool,
            duration_ms,
            ts,
        } => Some(SdkEvent::ToolCompleted {
            session_id: session_id.clone(),
            tool: tool.clone(),
            duration_ms: *duration_ms,
            timestamp: *ts,
        }),
        MonitorEvent::Message {
            session_id,
            role,
            content,
            ts,
        } => Some(SdkEvent::MessageReceived {
            session_id: session_id.clone(),
            role: *role,
            content: content.clone(),
            timestamp: *ts,
        }),
        MonitorEvent::TaskUpdate {
            session_id,
            tasks,
            ts,
        } => Some(SdkEvent::TasksUpdated {
            session_id: session_id.clone(),
            tasks: tasks.clone(),
            timestamp: *ts,
        }),
        MonitorEvent::SessionEnd {
            session_id,
            status,
            ts,
        } => Some(SdkEvent::SessionEnded {
            session_id: session_id.clone(),
            status: status.clone(),
            timestamp: *ts,
        }),
        // Subagent lifecycle has no SDK-family counterpart
        MonitorEvent::SubagentStart { .. } | MonitorEvent::SubagentEnd { .. } => None,
    };
    if let Some(sdk) = sdk {
        bus.emit(&sdk);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
