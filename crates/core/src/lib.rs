// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! muster-core: shared types for the muster session orchestrator.
//!
//! Entities (sessions, session groups, command queues), the SDK event union
//! carried on the event bus, monitor events synthesized from engine
//! transcripts, identifier and slug generation, and the clock abstraction
//! used for all timestamps.

pub mod clock;
pub mod event;
pub mod group;
pub mod id;
pub mod monitor_event;
pub mod progress;
pub mod queue;
pub mod session;
pub mod slug;
pub mod time_fmt;
pub mod transcript;

pub use clock::{Clock, SystemClock};
pub use event::{PauseReason, SdkEvent};
pub use group::{BudgetAction, GroupConfig, GroupStatus, SessionGroup};
pub use id::{CommandId, EngineSessionId, GroupId, IdGen, QueueId, SessionId, UuidIdGen};
pub use monitor_event::{
    MessageRole, MonitorEvent, SubagentStatus, TaskEntry, TaskState,
};
pub use progress::{GroupProgress, ProgressTotals, SessionProgress, StatusCounts};
pub use queue::{CommandQueue, CommandStatus, QueueCommand, QueueStatus, SessionMode};
pub use session::{Session, SessionStatus, TokenUsage};
pub use slug::{resource_id, slugify};
pub use time_fmt::format_duration_ms;
pub use transcript::TranscriptEvent;

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
#[cfg(any(test, feature = "test-support"))]
pub use id::SequentialIdGen;
