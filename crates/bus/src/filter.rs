// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection event filters.

use muster_core::SdkEvent;
use serde::{Deserialize, Serialize};

/// Filter evaluated against every SDK event before it reaches a connection.
///
/// Each clause is "match all" when absent. An id clause matches only events
/// that expose the same id field with the same value. An **empty**
/// `event_types` list also matches all types — only a non-empty list
/// restricts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Filter that matches every event.
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn matches(&self, event: &SdkEvent) -> bool {
        if let Some(want) = &self.session_id {
            if event.session_id() != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = &self.group_id {
            if event.group_id() != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = &self.queue_id {
            if event.queue_id() != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(types) = &self.event_types {
            // Empty list means "no filter", not "match none"
            if !types.is_empty() && !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
