// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::cost::StreamJsonCostExtractor;
use muster_adapters::{FakeConfigGenerator, FakeProcessManager, MemoryGroupRepository};
use muster_core::event::ALL_EVENT_TYPES;
use muster_core::{FakeClock, Session, SessionGroup};
use std::time::Duration;

struct Fixture {
    repo: MemoryGroupRepository,
    processes: FakeProcessManager,
    config: FakeConfigGenerator,
    runner: Arc<GroupRunner>,
    events: Arc<Mutex<Vec<SdkEvent>>>,
}

fn record_all(bus: &EventBus) -> Arc<Mutex<Vec<SdkEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for event_type in ALL_EVENT_TYPES {
        let sink = Arc::clone(&events);
        bus.subscribe(event_type, move |event| {
            sink.lock().push(event.clone());
            Ok(())
        });
    }
    events
}

async fn fixture(sessions: Vec<Session>) -> Fixture {
    let clock = FakeClock::new();
    let repo = MemoryGroupRepository::new();
    let mut group = SessionGroup::new("g1", "Group", clock.now());
    group.sessions = sessions;
    muster_adapters::GroupRepository::save(&repo, &group)
        .await
        .unwrap();

    let processes = FakeProcessManager::new();
    let config = FakeConfigGenerator::new();
    let bus = EventBus::new();
    let events = record_all(&bus);
    let runner = Arc::new(GroupRunner::new(
        Arc::new(repo.clone()),
        Arc::new(processes.clone()),
        Arc::new(config.clone()),
        bus.clone(),
        Arc::new(clock),
        Arc::new(StreamJsonCostExtractor),
    ));
    Fixture {
        repo,
        processes,
        config,
        runner,
        events,
    }
}

fn session(id: &str, deps: &[&str]) -> Session {
    let clock = FakeClock::new();
    Session::new(id, format!("/w/{}", id), format!("prompt {}", id), clock.now())
        .with_depends_on(deps.iter().map(|d| SessionId::new(*d)).collect())
}

fn event_types(events: &Arc<Mutex<Vec<SdkEvent>>>) -> Vec<&'static str> {
    events.lock().iter().map(|e| e.event_type()).collect()
}

async fn group_status(fixture: &Fixture) -> GroupStatus {
    muster_adapters::GroupRepository::get(&fixture.repo, &"g1".into())
        .await
        .unwrap()
        .status
}

async fn session_status(fixture: &Fixture, id: &str) -> SessionStatus {
    muster_adapters::GroupRepository::get(&fixture.repo, &"g1".into())
        .await
        .unwrap()
        .session(id)
        .unwrap()
        .status
}

async fn wait_for<F: Fn() -> bool>(predicate: F) {
    for _ in 0..500 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn diamond_dependency_runs_in_topological_order() {
    let f = fixture(vec![
        session("s1", &[]),
        session("s2", &["s1"]),
        session("s3", &["s1"]),
        session("s4", &["s2", "s3"]),
    ])
    .await;

    f.runner
        .run(
            &"g1".into(),
            GroupRunOptions {
                max_concurrent: Some(2),
                ..GroupRunOptions::default()
            },
        )
        .await
        .unwrap();

    let spawns = f.processes.spawns();
    assert_eq!(spawns.len(), 4);
    assert_eq!(spawns[0].args.last().unwrap(), "prompt s1");
    let middle: Vec<&str> = spawns[1..3]
        .iter()
        .map(|s| s.args.last().unwrap().as_str())
        .collect();
    assert!(middle.contains(&"prompt s2") && middle.contains(&"prompt s3"));
    assert_eq!(spawns[3].args.last().unwrap(), "prompt s4");

    assert_eq!(group_status(&f).await, GroupStatus::Completed);
    let completed = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupCompleted {
            completed, failed, ..
        } => Some((*completed, *failed)),
        _ => None,
    });
    assert_eq!(completed, Some((4, 0)));
    assert_eq!(f.runner.state(), RunnerState::Completed);
}

#[tokio::test]
async fn engine_argv_and_env_follow_the_contract() {
    let f = fixture(vec![session("s1", &[])]).await;
    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();

    let spawns = f.processes.spawns();
    assert_eq!(spawns[0].cmd, "claude");
    assert_eq!(
        spawns[0].args,
        vec!["-p", "--output-format", "stream-json", "prompt s1"]
    );
    assert_eq!(spawns[0].cwd, std::path::PathBuf::from("/w/s1"));
    assert!(spawns[0]
        .env
        .iter()
        .any(|(k, v)| k == "ENGINE_CONFIG_DIR" && v.contains("s1")));
    assert_eq!(f.config.calls(), vec!["s1"]);
}

#[tokio::test]
async fn empty_group_completes_immediately() {
    let f = fixture(vec![]).await;
    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();

    assert_eq!(group_status(&f).await, GroupStatus::Completed);
    assert!(f.processes.spawns().is_empty());
    let types = event_types(&f.events);
    assert!(types.contains(&"group_started"));
    assert!(types.contains(&"group_completed"));
}

#[tokio::test]
async fn max_concurrent_one_serializes_in_group_order() {
    let f = fixture(vec![
        session("s1", &[]),
        session("s2", &[]),
        session("s3", &[]),
    ])
    .await;
    f.runner
        .run(
            &"g1".into(),
            GroupRunOptions {
                max_concurrent: Some(1),
                ..GroupRunOptions::default()
            },
        )
        .await
        .unwrap();

    let prompts: Vec<String> = f
        .processes
        .spawns()
        .iter()
        .map(|s| s.args.last().unwrap().clone())
        .collect();
    assert_eq!(prompts, vec!["prompt s1", "prompt s2", "prompt s3"]);
}

#[tokio::test]
async fn cycle_aborts_before_any_status_write() {
    let f = fixture(vec![session("s1", &["s1"])]).await;
    let err = f
        .runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::CircularDependency { .. }));

    assert_eq!(group_status(&f).await, GroupStatus::Created);
    assert!(f.events.lock().is_empty());
    assert_eq!(f.runner.state(), RunnerState::Idle);
}

#[tokio::test]
async fn run_rejected_while_already_running() {
    let f = fixture(vec![session("s1", &[])]).await;
    f.processes.script_held();

    let runner = Arc::clone(&f.runner);
    let task = tokio::spawn(async move { runner.run(&"g1".into(), GroupRunOptions::default()).await });
    wait_for(|| f.processes.running_count() == 1).await;

    let err = f
        .runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::InvalidState { .. }));

    f.processes.controls()[0].exit(0);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn config_failure_fails_session_without_spawning() {
    let f = fixture(vec![session("s1", &[])]).await;
    f.config.fail_for("s1");
    f.runner
        .run(
            &"g1".into(),
            GroupRunOptions {
                pause_on_error: Some(false),
                ..GroupRunOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(f.processes.spawns().is_empty());
    assert_eq!(session_status(&f, "s1").await, SessionStatus::Failed);
    let error = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupSessionFailed { error, .. } => Some(error.clone()),
        _ => None,
    });
    assert_eq!(error.as_deref(), Some("Configuration generation failed"));
}

#[tokio::test]
async fn nonzero_exit_records_engine_error() {
    let f = fixture(vec![session("s1", &[])]).await;
    f.processes.script_exit(3);
    f.runner
        .run(
            &"g1".into(),
            GroupRunOptions {
                pause_on_error: Some(false),
                ..GroupRunOptions::default()
            },
        )
        .await
        .unwrap();

    let error = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupSessionFailed { error, .. } => Some(error.clone()),
        _ => None,
    });
    assert_eq!(error.as_deref(), Some("engine exited with code 3"));
}

#[tokio::test]
async fn error_threshold_pauses_and_terminates_survivors() {
    let f = fixture(vec![
        session("s1", &[]),
        session("s2", &[]),
        session("s3", &[]),
    ])
    .await;
    f.processes.script_exit(1);
    f.processes.script_exit(1);
    f.processes.script_held();

    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();

    assert_eq!(f.runner.state(), RunnerState::Paused);
    assert_eq!(group_status(&f).await, GroupStatus::Paused);
    assert_eq!(session_status(&f, "s1").await, SessionStatus::Failed);
    assert_eq!(session_status(&f, "s2").await, SessionStatus::Failed);
    // SIGTERMed for pause, never failed
    assert_eq!(session_status(&f, "s3").await, SessionStatus::Paused);
    assert!(f
        .processes
        .signals()
        .iter()
        .any(|(_, s)| *s == muster_adapters::Signal::Term));

    let reason = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupPaused { reason, .. } => Some(*reason),
        _ => None,
    });
    assert_eq!(reason, Some(PauseReason::ErrorThreshold));
}

#[tokio::test]
async fn resume_restarts_paused_sessions_with_resume_flag() {
    let f = fixture(vec![
        session("s1", &[]),
        session("s2", &[]),
        session("s3", &[]),
    ])
    .await;
    f.processes.script_exit(1);
    f.processes.script_exit(1);
    f.processes.script_held();
    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();
    assert_eq!(f.runner.state(), RunnerState::Paused);

    // s3 re-runs with --resume and succeeds
    f.processes.script_exit(0);
    f.runner.resume().await.unwrap();

    let spawns = f.processes.spawns();
    assert_eq!(spawns.len(), 4);
    assert!(spawns[3].args.contains(&"--resume".to_string()));
    assert_eq!(spawns[3].args.last().unwrap(), "prompt s3");

    assert_eq!(f.runner.state(), RunnerState::Completed);
    assert_eq!(session_status(&f, "s3").await, SessionStatus::Completed);
    let completed = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupCompleted {
            completed, failed, ..
        } => Some((*completed, *failed)),
        _ => None,
    });
    assert_eq!(completed, Some((1, 2)));
}

#[tokio::test]
async fn stop_kills_workers_and_fails_the_group() {
    let f = fixture(vec![session("s1", &[])]).await;
    f.processes.script_held();

    let runner = Arc::clone(&f.runner);
    let task = tokio::spawn(async move { runner.run(&"g1".into(), GroupRunOptions::default()).await });
    wait_for(|| f.processes.running_count() == 1).await;

    f.runner.stop().await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(f.runner.state(), RunnerState::Stopped);
    assert_eq!(group_status(&f).await, GroupStatus::Failed);
    assert_eq!(session_status(&f, "s1").await, SessionStatus::Failed);
    assert!(f
        .processes
        .signals()
        .iter()
        .any(|(_, s)| *s == muster_adapters::Signal::Kill));
    let reason = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupFailed { reason, .. } => Some(reason.clone()),
        _ => None,
    });
    assert_eq!(reason.as_deref(), Some("Manually stopped"));

    // Stopped is terminal
    assert!(f.runner.stop().await.is_err());
    assert!(f.runner.resume().await.is_err());
}

#[tokio::test]
async fn blocked_by_failed_dependencies_fails_the_group() {
    let f = fixture(vec![session("s1", &[]), session("s2", &["s1"])]).await;
    f.processes.script_exit(1);
    f.runner
        .run(
            &"g1".into(),
            GroupRunOptions {
                pause_on_error: Some(false),
                ..GroupRunOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(group_status(&f).await, GroupStatus::Failed);
    assert_eq!(session_status(&f, "s2").await, SessionStatus::Pending);
    let reason = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupFailed { reason, .. } => Some(reason.clone()),
        _ => None,
    });
    assert_eq!(reason.as_deref(), Some("blocked by failed dependencies"));
    assert_eq!(f.processes.spawns().len(), 1, "s2 never spawned");
}

#[tokio::test]
async fn engine_session_id_is_captured_from_stdout() {
    let f = fixture(vec![session("s1", &[])]).await;
    f.processes
        .script_with_stdout(vec!["{\"sessionId\":\"engine-9\"}".to_string()], 0);
    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();

    let group = muster_adapters::GroupRepository::get(&f.repo, &"g1".into())
        .await
        .unwrap();
    assert_eq!(
        group
            .session("s1")
            .unwrap()
            .engine_session_id
            .as_ref()
            .map(|i| i.as_str()),
        Some("engine-9")
    );
}

#[tokio::test]
async fn dependency_events_flow() {
    let f = fixture(vec![session("s1", &[]), session("s2", &["s1"])]).await;
    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();

    let types = event_types(&f.events);
    assert!(types.contains(&"dependency_waiting"));
    assert!(types.contains(&"dependency_resolved"));

    let waiting = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::DependencyWaiting {
            session_id,
            waiting_on,
            ..
        } => Some((session_id.clone(), waiting_on.clone())),
        _ => None,
    });
    assert_eq!(waiting, Some(("s2".to_string(), vec!["s1".to_string()])));
}

#[tokio::test]
async fn budget_exceeded_pause_action_pauses_the_run() {
    let f = fixture(vec![session("s1", &[]), session("s2", &["s1"])]).await;
    {
        let mut group = muster_adapters::GroupRepository::get(&f.repo, &"g1".into())
            .await
            .unwrap();
        group.config.max_budget_usd = Some(1.0);
        group.config.on_budget_exceeded = BudgetAction::Pause;
        muster_adapters::GroupRepository::save(&f.repo, &group)
            .await
            .unwrap();
    }
    f.processes.script_with_stdout(
        vec!["{\"type\":\"result\",\"total_cost_usd\":2.0}".to_string()],
        0,
    );

    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();

    assert_eq!(f.runner.state(), RunnerState::Paused);
    assert_eq!(group_status(&f).await, GroupStatus::Paused);
    assert_eq!(session_status(&f, "s2").await, SessionStatus::Pending);

    let exceeded = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::BudgetExceeded {
            cost_usd, action, ..
        } => Some((*cost_usd, *action)),
        _ => None,
    });
    assert_eq!(exceeded, Some((2.0, BudgetAction::Pause)));
    let reason = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::GroupPaused { reason, .. } => Some(*reason),
        _ => None,
    });
    assert_eq!(reason, Some(PauseReason::BudgetExceeded));
}

#[tokio::test]
async fn budget_warning_fires_once_per_run() {
    let f = fixture(vec![
        session("s1", &[]),
        session("s2", &[]),
        session("s3", &[]),
    ])
    .await;
    {
        let mut group = muster_adapters::GroupRepository::get(&f.repo, &"g1".into())
            .await
            .unwrap();
        group.config.max_budget_usd = Some(100.0);
        group.config.warning_threshold = 0.05;
        muster_adapters::GroupRepository::save(&f.repo, &group)
            .await
            .unwrap();
    }
    for _ in 0..3 {
        f.processes.script_with_stdout(
            vec!["{\"type\":\"result\",\"total_cost_usd\":3.0}".to_string()],
            0,
        );
    }

    f.runner
        .run(
            &"g1".into(),
            GroupRunOptions {
                max_concurrent: Some(1),
                ..GroupRunOptions::default()
            },
        )
        .await
        .unwrap();

    let warnings = f
        .events
        .lock()
        .iter()
        .filter(|e| e.event_type() == "budget_warning")
        .count();
    assert_eq!(warnings, 1);
    assert_eq!(group_status(&f).await, GroupStatus::Completed);
}

#[tokio::test]
async fn progress_events_follow_each_completion() {
    let f = fixture(vec![session("s1", &[])]).await;
    f.runner
        .run(&"g1".into(), GroupRunOptions::default())
        .await
        .unwrap();

    let types = event_types(&f.events);
    assert!(types.contains(&"session_progress"));
    assert!(types.contains(&"group_progress"));

    let counts = f.events.lock().iter().rev().find_map(|e| match e {
        SdkEvent::GroupProgress { progress, .. } => Some(progress.counts),
        _ => None,
    });
    assert_eq!(counts.map(|c| c.completed), Some(1));
}
