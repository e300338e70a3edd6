// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! muster-adapters: capability ports between the core and the outside world.
//!
//! Every external dependency of the runners and monitors — the filesystem,
//! child processes, persisted entities, per-session config generation — is
//! reached through a trait defined here. Production implementations live
//! alongside the traits; deterministic fakes are available behind the
//! `test-support` feature.

pub mod config;
pub mod fs;
pub mod process;
pub mod repo;

pub use config::{ConfigError, ConfigGenerator, DirConfigGenerator, SessionConfig};
pub use fs::{ChangeStream, FileStat, FileSystem, FsError, LocalFileSystem};
pub use process::{
    LineStream, LocalProcessManager, ProcessError, ProcessHandle, ProcessManager,
    ProcessSignaller, Signal,
};
pub use repo::{
    CommandPatch, GroupPatch, GroupRepository, MemoryGroupRepository, MemoryQueueRepository,
    QueuePatch, QueueRepository, RepoError, SessionPatch,
};

#[cfg(any(test, feature = "test-support"))]
pub use config::FakeConfigGenerator;
#[cfg(any(test, feature = "test-support"))]
pub use fs::FakeFileSystem;
#[cfg(any(test, feature = "test-support"))]
pub use process::{FakeProcessManager, ProcessControl, SpawnRecord};
