// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed publish/subscribe keyed by event-type tag.

use muster_core::SdkEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Error a handler may surface; logged by the bus, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = dyn Fn(&SdkEvent) -> Result<(), HandlerError> + Send + Sync;

/// Unsubscribe capability returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    event_type: String,
    id: u64,
}

impl Subscription {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

struct Entry {
    id: u64,
    handler: Arc<Handler>,
    once: bool,
}

#[derive(Default)]
struct Registry {
    handlers: HashMap<String, Vec<Entry>>,
    next_id: u64,
}

impl Registry {
    fn install(&mut self, event_type: &str, handler: Arc<Handler>, once: bool) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push(Entry { id, handler, once });
        Subscription {
            event_type: event_type.to_string(),
            id,
        }
    }
}

/// Single-process typed event bus.
///
/// Cheap to clone; clones share one handler registry. Handlers for one
/// `emit` run synchronously in installation order; a failing handler is
/// logged and does not prevent the rest from running.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler for an event type. Returns the unsubscribe capability.
    pub fn subscribe<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&SdkEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry
            .lock()
            .install(event_type, Arc::new(handler), false)
    }

    /// Install a handler that fires at most once.
    ///
    /// The handler is removed from the registry *before* it is invoked, so a
    /// re-entrant `emit` of the same type from inside the handler cannot
    /// re-fire it.
    pub fn subscribe_once<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&SdkEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry
            .lock()
            .install(event_type, Arc::new(handler), true)
    }

    /// Remove a previously-installed handler (regular or once).
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut registry = self.registry.lock();
        if let Some(entries) = registry.handlers.get_mut(&subscription.event_type) {
            entries.retain(|e| e.id != subscription.id);
        }
    }

    /// Deliver an event to every handler installed for its type.
    ///
    /// Iterates a snapshot of the handler list taken at the start of the
    /// call: handlers installed or removed by a handler mid-delivery do not
    /// affect this emit. Once-handlers are dropped from the registry before
    /// the snapshot is walked.
    pub fn emit(&self, event: &SdkEvent) {
        let event_type = event.event_type();
        let snapshot: Vec<(u64, Arc<Handler>)> = {
            let mut registry = self.registry.lock();
            let Some(entries) = registry.handlers.get_mut(event_type) else {
                return;
            };
            let snapshot = entries
                .iter()
                .map(|e| (e.id, Arc::clone(&e.handler)))
                .collect();
            entries.retain(|e| !e.once);
            snapshot
        };

        for (id, handler) in snapshot {
            if let Err(error) = handler(event) {
                tracing::warn!(event_type, handler_id = id, %error, "event handler failed");
            }
        }
    }

    /// Number of handlers currently installed for an event type.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registry
            .lock()
            .handlers
            .get(event_type)
            .map_or(0, |e| e.len())
    }

    /// Remove all handlers for one event type, or every handler when `None`.
    pub fn remove_all(&self, event_type: Option<&str>) {
        let mut registry = self.registry.lock();
        match event_type {
            Some(t) => {
                registry.handlers.remove(t);
            }
            None => registry.handlers.clear(),
        }
    }

    /// One-shot future resolving with the next payload of the given type.
    ///
    /// The receiver yields `Err(RecvError)` if the bus drops the handler
    /// without firing (e.g. via [`EventBus::remove_all`]).
    pub fn wait_for(&self, event_type: &str) -> oneshot::Receiver<SdkEvent> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        self.subscribe_once(event_type, move |event| {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(event.clone());
            }
            Ok(())
        });
        rx
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
