// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-Sent-Events fan-out.
//!
//! One [`SseConnection`] per HTTP client. The connection subscribes to every
//! SDK event type, filters, serializes matching events as SSE frames, and
//! enqueues them on a bounded channel whose receiver the HTTP layer drains.
//! The HTTP framework itself is out of scope; the frame channel is the
//! "stream controller".

use crate::bus::{EventBus, Subscription};
use crate::filter::EventFilter;
use muster_core::event::ALL_EVENT_TYPES;
use muster_core::SdkEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Response headers every SSE endpoint must send, exactly.
pub const SSE_HEADERS: [(&str, &str); 4] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
    ("X-Accel-Buffering", "no"),
];

/// Default frame-channel capacity per connection.
const DEFAULT_CAPACITY: usize = 256;

struct Inner {
    bus: EventBus,
    filter: EventFilter,
    tx: Mutex<Option<mpsc::Sender<String>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    closed: AtomicBool,
}

impl Inner {
    fn deliver(&self, event: &SdkEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if !self.filter.matches(event) {
            return;
        }
        let frame = match serde_json::to_string(event) {
            Ok(json) => format!("data: {}\n\n", json),
            Err(error) => {
                tracing::warn!(%error, "failed to serialize SSE event");
                return;
            }
        };
        let sent = {
            let tx = self.tx.lock();
            match tx.as_ref() {
                Some(tx) => tx.try_send(frame).is_ok(),
                None => false,
            }
        };
        // Enqueue failure means the client is gone (or hopelessly behind):
        // tear the connection down.
        if !sent {
            self.close();
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in &subscriptions {
            self.bus.unsubscribe(subscription);
        }
        // Dropping the sender closes the controller once in-flight frames drain
        self.tx.lock().take();
        tracing::debug!("sse connection closed");
    }
}

/// One client connection to the event stream.
///
/// Construction is cheap and side-effect free; subscriptions are installed
/// lazily by [`SseConnection::start`], which the transport calls from its
/// stream-start hook.
pub struct SseConnection {
    inner: Arc<Inner>,
}

impl SseConnection {
    /// Create a connection and hand back the frame receiver for the
    /// transport to drain.
    pub fn new(bus: EventBus, filter: EventFilter) -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(bus, filter, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(
        bus: EventBus,
        filter: EventFilter,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let inner = Arc::new(Inner {
            bus,
            filter,
            tx: Mutex::new(Some(tx)),
            subscriptions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        (Self { inner }, rx)
    }

    /// Install one subscription per SDK event type.
    pub fn start(&self) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut subscriptions = self.inner.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }
        for event_type in ALL_EVENT_TYPES {
            let inner = Arc::clone(&self.inner);
            let subscription = self.inner.bus.subscribe(event_type, move |event| {
                inner.deliver(event);
                Ok(())
            });
            subscriptions.push(subscription);
        }
    }

    /// Tear down the connection: unsubscribe everything and close the frame
    /// channel. Idempotent; events delivered after close are dropped.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
