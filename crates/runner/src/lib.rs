// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! muster-runner: session group and command queue execution.
//!
//! The group runner schedules a dependency-ordered batch of engine
//! invocations through a bounded worker pool with budget gates and
//! pause/resume/stop control. The queue runner executes a strictly
//! sequential prompt list in one working directory. Both talk to the
//! outside world only through the adapter ports and publish their life
//! cycle on the shared event bus.

pub mod cost;
pub mod error;
pub mod graph;
pub mod group;
pub mod ops;
pub mod progress;
pub mod queue;
pub mod sweep;

pub use cost::{CostExtractor, NullCostExtractor, StreamJsonCostExtractor};
pub use error::RunnerError;
pub use graph::{BlockedSession, DependencyGraph};
pub use group::{GroupRunOptions, GroupRunner, RunnerState};
pub use ops::{GroupOps, QueueOps};
pub use progress::{
    budget_usage_percent, is_budget_exceeded, is_budget_warning, ProgressAggregator,
};
pub use queue::{QueueRunOutcome, QueueRunner};
pub use sweep::{sweep_stale, SweepReport};
