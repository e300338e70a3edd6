// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! muster-bus: typed in-process publish/subscribe and the SSE fan-out.
//!
//! One bus instance is shared per process and injected into every component
//! that produces or consumes [`muster_core::SdkEvent`]s. Delivery is
//! synchronous and live-only: the bus never buffers events for handlers that
//! were not subscribed at emit time.

pub mod bus;
pub mod filter;
pub mod sse;

pub use bus::{EventBus, HandlerError, Subscription};
pub use filter::EventFilter;
pub use sse::{SseConnection, SSE_HEADERS};
