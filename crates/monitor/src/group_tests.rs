// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use muster_adapters::{FakeFileSystem, MemoryGroupRepository};
use muster_core::{Clock, FakeClock, Session, SessionGroup};
use std::time::Duration;

struct Fixture {
    fs: FakeFileSystem,
    repo: MemoryGroupRepository,
    monitor: GroupMonitor,
    paths: TranscriptPaths,
}

async fn fixture(engine_ids: &[Option<&str>]) -> Fixture {
    let clock = FakeClock::new();
    let fs = FakeFileSystem::new();
    let repo = MemoryGroupRepository::new();
    let paths = TranscriptPaths::with_base("/claude/sessions");

    let mut group = SessionGroup::new("g1", "Group", clock.now());
    for (i, engine_id) in engine_ids.iter().enumerate() {
        let mut session = Session::new(format!("s{}", i), "/w", "prompt", clock.now());
        if let Some(id) = engine_id {
            session.engine_session_id = Some((*id).into());
            fs.seed(paths.transcript(id), "");
        }
        group.sessions.push(session);
    }
    muster_adapters::GroupRepository::save(&repo, &group)
        .await
        .unwrap();

    let monitor = GroupMonitor::new(
        Arc::new(repo.clone()),
        Arc::new(fs.clone()),
        Arc::new(clock),
        StateManager::new(),
        paths.clone(),
    )
    .with_watcher_config(WatcherConfig {
        debounce_ms: 5,
        include_existing: false,
    });

    Fixture {
        fs,
        repo,
        monitor,
        paths,
    }
}

async fn next_with_timeout(stream: &mut MonitorStream) -> Option<MonitorEvent> {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .ok()
        .flatten()
}

fn tool_use_line(name: &str) -> String {
    format!("{{\"type\":\"tool_use\",\"content\":{{\"name\":\"{}\"}}}}\n", name)
}

#[tokio::test]
async fn watch_merges_events_from_engine_backed_sessions() {
    let f = fixture(&[Some("e1"), Some("e2"), None]).await;
    let mut stream = f.monitor.watch(&"g1".into()).await.unwrap();

    f.fs.append(f.paths.transcript("e1"), tool_use_line("Bash"));
    let event = next_with_timeout(&mut stream).await.unwrap();
    assert_eq!(event.session_id(), "e1");

    f.fs.append(f.paths.transcript("e2"), tool_use_line("Read"));
    let event = next_with_timeout(&mut stream).await.unwrap();
    assert_eq!(event.session_id(), "e2");

    // Shared state manager sees both sessions
    assert_eq!(f.monitor.state().active_tools("e1").len(), 1);
    assert_eq!(f.monitor.state().active_tools("e2").len(), 1);
}

#[tokio::test]
async fn watch_unknown_group_errors() {
    let f = fixture(&[]).await;
    assert!(f.monitor.watch(&"missing".into()).await.is_err());
}

#[tokio::test]
async fn add_session_attaches_child_at_runtime() {
    let f = fixture(&[Some("e1")]).await;
    let mut stream = f.monitor.watch(&"g1".into()).await.unwrap();

    f.fs.seed(f.paths.transcript("late"), "");
    f.monitor.add_session("late").await.unwrap();

    f.fs.append(f.paths.transcript("late"), tool_use_line("Grep"));
    let event = next_with_timeout(&mut stream).await.unwrap();
    assert_eq!(event.session_id(), "late");
}

#[tokio::test]
async fn add_session_before_watch_errors() {
    let f = fixture(&[]).await;
    assert!(matches!(
        f.monitor.add_session("e9").await,
        Err(MonitorError::NotStarted)
    ));
}

#[tokio::test]
async fn remove_session_stops_one_child_only() {
    let f = fixture(&[Some("e1"), Some("e2")]).await;
    let mut stream = f.monitor.watch(&"g1".into()).await.unwrap();

    f.monitor.remove_session("e1");

    // The removed child closes out with a session end; e2 still flows
    f.fs.append(f.paths.transcript("e2"), tool_use_line("Read"));
    loop {
        let event = next_with_timeout(&mut stream).await.unwrap();
        if event.session_id() == "e2" {
            assert!(matches!(event, MonitorEvent::ToolStart { .. }));
            break;
        }
        assert!(matches!(event, MonitorEvent::SessionEnd { .. }));
        assert_eq!(event.session_id(), "e1");
    }
}

#[tokio::test]
async fn stop_ends_the_merged_stream() {
    let f = fixture(&[Some("e1")]).await;
    let mut stream = f.monitor.watch(&"g1".into()).await.unwrap();

    f.monitor.stop();
    f.monitor.stop();

    // Stop may let a final session end slip through before the merge closes
    while let Some(event) = next_with_timeout(&mut stream).await {
        assert!(matches!(event, MonitorEvent::SessionEnd { .. }));
    }

    let _ = f.repo; // fixture keeps the repo alive for the monitor
}

#[tokio::test]
async fn one_session_ending_does_not_end_the_merge() {
    let f = fixture(&[Some("e1"), Some("e2")]).await;
    let mut stream = f.monitor.watch(&"g1".into()).await.unwrap();

    // Child e1's monitor stops; its tail drains and ends
    f.monitor.remove_session("e1");
    tokio::time::sleep(Duration::from_millis(20)).await;

    f.fs.append(f.paths.transcript("e2"), tool_use_line("Write"));
    loop {
        let event = next_with_timeout(&mut stream).await.unwrap();
        if event.session_id() == "e2" {
            break;
        }
        assert!(matches!(event, MonitorEvent::SessionEnd { .. }));
    }
}
