// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session engine configuration generation.
//!
//! The group runner asks the generator to materialize config files for each
//! session before spawning its engine process; the resulting directory is
//! exported to the child as `ENGINE_CONFIG_DIR`. Template rendering beyond
//! a settings projection is an external concern.

use async_trait::async_trait;
use muster_core::{Session, SessionGroup};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from config generation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config write failed: {0}")]
    Write(String),
}

/// Materialized per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub config_dir: PathBuf,
}

/// Config-generation capability consumed by the group runner.
#[async_trait]
pub trait ConfigGenerator: Send + Sync {
    async fn generate_session_config(
        &self,
        session: &Session,
        group: &SessionGroup,
    ) -> Result<SessionConfig, ConfigError>;
}

/// Writes a settings projection to `{base_dir}/{group_id}/{session_id}/`.
pub struct DirConfigGenerator {
    base_dir: PathBuf,
}

impl DirConfigGenerator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl ConfigGenerator for DirConfigGenerator {
    async fn generate_session_config(
        &self,
        session: &Session,
        group: &SessionGroup,
    ) -> Result<SessionConfig, ConfigError> {
        let config_dir = self
            .base_dir
            .join(group.id.as_str())
            .join(session.id.as_str());
        tokio::fs::create_dir_all(&config_dir)
            .await
            .map_err(|e| ConfigError::Write(e.to_string()))?;

        let settings = serde_json::json!({
            "model": group.config.model,
            "projectPath": session.project_path,
        });
        let settings_path = config_dir.join("settings.json");
        let body = serde_json::to_vec_pretty(&settings)
            .map_err(|e| ConfigError::Write(e.to_string()))?;
        tokio::fs::write(&settings_path, body)
            .await
            .map_err(|e| ConfigError::Write(e.to_string()))?;

        tracing::debug!(
            session_id = %session.id,
            config_dir = %config_dir.display(),
            "session config generated"
        );
        Ok(SessionConfig { config_dir })
    }
}

/// Fake generator recording calls, with scriptable failure.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeConfigGenerator {
    inner: std::sync::Arc<parking_lot::Mutex<FakeConfigState>>,
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
struct FakeConfigState {
    calls: Vec<String>,
    fail_for: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeConfigGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session ids whose config generation should fail.
    pub fn fail_for(&self, session_id: impl Into<String>) {
        self.inner.lock().fail_for.push(session_id.into());
    }

    /// Session ids passed to `generate_session_config`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ConfigGenerator for FakeConfigGenerator {
    async fn generate_session_config(
        &self,
        session: &Session,
        group: &SessionGroup,
    ) -> Result<SessionConfig, ConfigError> {
        let mut inner = self.inner.lock();
        inner.calls.push(session.id.to_string());
        if inner.fail_for.iter().any(|id| id == session.id.as_str()) {
            return Err(ConfigError::Write(format!(
                "scripted failure for {}",
                session.id
            )));
        }
        Ok(SessionConfig {
            config_dir: PathBuf::from("/tmp/config")
                .join(group.id.as_str())
                .join(session.id.as_str()),
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
