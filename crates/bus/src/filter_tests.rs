// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{DateTime, Utc};

fn ts() -> DateTime<Utc> {
    DateTime::from_timestamp(1_765_000_000, 0).unwrap()
}

fn tool_started(session_id: &str) -> SdkEvent {
    SdkEvent::ToolStarted {
        session_id: session_id.into(),
        tool: "Bash".into(),
        timestamp: ts(),
    }
}

fn group_started(group_id: &str) -> SdkEvent {
    SdkEvent::GroupStarted {
        group_id: group_id.into(),
        total_sessions: 1,
        timestamp: ts(),
    }
}

#[test]
fn default_filter_matches_everything() {
    let filter = EventFilter::match_all();
    assert!(filter.matches(&tool_started("S")));
    assert!(filter.matches(&group_started("G")));
}

#[test]
fn session_id_clause_requires_same_id() {
    let filter = EventFilter {
        session_id: Some("S".into()),
        ..EventFilter::default()
    };
    assert!(filter.matches(&tool_started("S")));
    assert!(!filter.matches(&tool_started("T")));
    // Events without a sessionId field are dropped too
    assert!(!filter.matches(&group_started("G")));
}

#[test]
fn group_and_queue_clauses() {
    let filter = EventFilter {
        group_id: Some("G".into()),
        ..EventFilter::default()
    };
    assert!(filter.matches(&group_started("G")));
    assert!(!filter.matches(&group_started("H")));
    assert!(!filter.matches(&tool_started("S")));

    let filter = EventFilter {
        queue_id: Some("Q".into()),
        ..EventFilter::default()
    };
    let queue_event = SdkEvent::QueueStopped {
        queue_id: "Q".into(),
        timestamp: ts(),
    };
    assert!(filter.matches(&queue_event));
    assert!(!filter.matches(&group_started("G")));
}

#[test]
fn event_types_clause_restricts_when_non_empty() {
    let filter = EventFilter {
        event_types: Some(vec!["tool_started".into()]),
        ..EventFilter::default()
    };
    assert!(filter.matches(&tool_started("S")));
    assert!(!filter.matches(&group_started("G")));
}

#[test]
fn empty_event_types_matches_all() {
    let filter = EventFilter {
        event_types: Some(Vec::new()),
        ..EventFilter::default()
    };
    assert!(filter.matches(&tool_started("S")));
    assert!(filter.matches(&group_started("G")));
}

#[test]
fn clauses_combine_conjunctively() {
    let filter = EventFilter {
        session_id: Some("S".into()),
        event_types: Some(vec!["tool_started".into()]),
        ..EventFilter::default()
    };
    assert!(filter.matches(&tool_started("S")));
    assert!(!filter.matches(&tool_started("T")));

    let completed = SdkEvent::ToolCompleted {
        session_id: "S".into(),
        tool: "Bash".into(),
        duration_ms: 3,
        timestamp: ts(),
    };
    assert!(!filter.matches(&completed));
}

#[test]
fn deserializes_from_camel_case_query_shape() {
    let filter: EventFilter = serde_json::from_str(
        r#"{"sessionId": "S", "eventTypes": ["tool_started", "tool_completed"]}"#,
    )
    .unwrap();
    assert_eq!(filter.session_id.as_deref(), Some("S"));
    assert_eq!(filter.event_types.as_ref().map(|t| t.len()), Some(2));
    assert!(filter.group_id.is_none());
}
