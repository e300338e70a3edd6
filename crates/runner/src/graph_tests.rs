// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use muster_core::{Clock, FakeClock};

fn session(id: &str, deps: &[&str]) -> Session {
    let clock = FakeClock::new();
    Session::new(id, "/w", "prompt", clock.now())
        .with_depends_on(deps.iter().map(|d| SessionId::new(*d)).collect())
}

fn ids(list: &[SessionId]) -> Vec<&str> {
    list.iter().map(|s| s.as_str()).collect()
}

#[test]
fn ready_starts_with_dependency_free_sessions() {
    let graph = DependencyGraph::build(&[
        session("s1", &[]),
        session("s2", &["s1"]),
        session("s3", &["s1"]),
        session("s4", &["s2", "s3"]),
    ])
    .unwrap();

    assert_eq!(ids(&graph.ready(true)), vec!["s1"]);
    assert_eq!(graph.remaining_count(), 4);
}

#[test]
fn diamond_unlocks_level_by_level() {
    let mut graph = DependencyGraph::build(&[
        session("s1", &[]),
        session("s2", &["s1"]),
        session("s3", &["s1"]),
        session("s4", &["s2", "s3"]),
    ])
    .unwrap();

    graph.mark_completed(&"s1".into());
    assert_eq!(ids(&graph.ready(true)), vec!["s2", "s3"]);

    graph.mark_completed(&"s2".into());
    assert_eq!(ids(&graph.ready(true)), vec!["s3"], "s4 still waits on s3");

    graph.mark_completed(&"s3".into());
    assert_eq!(ids(&graph.ready(true)), vec!["s4"]);
    assert_eq!(graph.remaining_count(), 1);
}

#[test]
fn failed_dependency_blocks_dependents_forever() {
    let mut graph = DependencyGraph::build(&[
        session("s1", &[]),
        session("s2", &["s1"]),
    ])
    .unwrap();

    graph.mark_failed(&"s1".into());
    assert!(graph.ready(true).is_empty());

    let blocked = graph.blocked();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].session_id, "s2");
    assert_eq!(ids(&blocked[0].waiting_on), vec!["s1"]);
}

#[test]
fn missing_dependency_is_never_satisfied() {
    let graph = DependencyGraph::build(&[session("s1", &["ghost"])]).unwrap();
    assert!(graph.ready(true).is_empty());
    let blocked = graph.blocked();
    assert_eq!(ids(&blocked[0].waiting_on), vec!["ghost"]);
}

#[test]
fn ready_ignores_deps_when_not_respected() {
    let graph = DependencyGraph::build(&[
        session("s1", &[]),
        session("s2", &["s1"]),
    ])
    .unwrap();
    assert_eq!(ids(&graph.ready(false)), vec!["s1", "s2"]);
}

#[test]
fn active_sessions_leave_the_ready_set() {
    let mut graph = DependencyGraph::build(&[session("s1", &[]), session("s2", &[])]).unwrap();
    graph.mark_active(&"s1".into());
    assert_eq!(ids(&graph.ready(true)), vec!["s2"]);

    graph.mark_pending(&"s1".into());
    assert_eq!(ids(&graph.ready(true)), vec!["s1", "s2"]);
}

#[test]
fn last_mark_wins_between_completed_and_failed() {
    let mut graph = DependencyGraph::build(&[session("s1", &[]), session("s2", &["s1"])]).unwrap();

    graph.mark_completed(&"s1".into());
    graph.mark_failed(&"s1".into());
    assert!(graph.ready(true).is_empty(), "failed wins");

    graph.mark_completed(&"s1".into());
    assert_eq!(ids(&graph.ready(true)), vec!["s2"], "completed wins back");
}

#[test]
fn self_loop_is_a_cycle() {
    let err = DependencyGraph::build(&[session("s1", &["s1"])]).unwrap_err();
    match err {
        RunnerError::CircularDependency { path } => {
            assert_eq!(path, vec!["s1", "s1"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn cycle_error_carries_a_sample_path() {
    let err = DependencyGraph::build(&[
        session("s1", &["s3"]),
        session("s2", &["s1"]),
        session("s3", &["s2"]),
    ])
    .unwrap_err();
    match err {
        RunnerError::CircularDependency { path } => {
            assert!(path.len() >= 3);
            assert_eq!(path.first(), path.last());
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn snapshot_outcomes_seed_the_sets() {
    let mut completed = session("s1", &[]);
    completed.status = muster_core::SessionStatus::Completed;
    let mut paused = session("s2", &["s1"]);
    paused.status = muster_core::SessionStatus::Paused;

    let graph = DependencyGraph::build(&[completed, paused]).unwrap();
    assert_eq!(graph.remaining_count(), 1);
    assert_eq!(ids(&graph.ready(true)), vec!["s2"], "paused resumes as pending");
}

#[test]
fn resolved_dependents_need_every_dep_decided() {
    let mut graph = DependencyGraph::build(&[
        session("s1", &[]),
        session("s2", &[]),
        session("s3", &["s1", "s2"]),
    ])
    .unwrap();

    graph.mark_completed(&"s1".into());
    assert!(graph.resolved_dependents(&"s1".into()).is_empty());

    graph.mark_failed(&"s2".into());
    assert_eq!(ids(&graph.resolved_dependents(&"s2".into())), vec!["s3"]);
}

#[test]
fn empty_graph_has_nothing_to_do() {
    let graph = DependencyGraph::build(&[]).unwrap();
    assert!(graph.ready(true).is_empty());
    assert_eq!(graph.remaining_count(), 0);
    assert!(graph.blocked().is_empty());
}
