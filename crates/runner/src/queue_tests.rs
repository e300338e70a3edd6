// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::cost::StreamJsonCostExtractor;
use muster_adapters::{FakeProcessManager, MemoryQueueRepository};
use muster_core::event::ALL_EVENT_TYPES;
use muster_core::FakeClock;
use std::time::Duration;

struct Fixture {
    repo: MemoryQueueRepository,
    processes: FakeProcessManager,
    runner: Arc<QueueRunner>,
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

async fn fixture(modes: &[SessionMode]) -> Fixture {
    let clock = FakeClock::new();
    let repo = MemoryQueueRepository::new();
    let mut queue = CommandQueue::new("q1", "review", "/work/api", clock.now());
    for (i, mode) in modes.iter().enumerate() {
        queue.commands.push(QueueCommand::new(
            format!("c{}", i),
            i,
            format!("prompt {}", i),
            *mode,
        ));
    }
    muster_adapters::QueueRepository::save(&repo, &queue)
        .await
        .unwrap();

    let processes = FakeProcessManager::new();
    let bus = EventBus::new();
    let events = record_all(&bus);
    let runner = Arc::new(QueueRunner::new(
        Arc::new(repo.clone()),
        Arc::new(processes.clone()),
        bus,
        Arc::new(clock),
        Arc::new(StreamJsonCostExtractor),
    ));
    Fixture {
        repo,
        processes,
        runner,
        events,
    }
}

async fn queue_of(fixture: &Fixture) -> CommandQueue {
    muster_adapters::QueueRepository::get(&fixture.repo, &"q1".into())
        .await
        .unwrap()
}

fn statuses(queue: &CommandQueue) -> Vec<CommandStatus> {
    queue.commands.iter().map(|c| c.status).collect()
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
async fn session_continuity_passes_resume_after_first_command() {
    let f = fixture(&[SessionMode::Continue, SessionMode::Continue]).await;
    f.processes
        .script_with_stdout(vec!["{\"sessionId\":\"S\"}".to_string()], 0);
    f.processes
        .script_with_stdout(vec!["{\"sessionId\":\"S\"}".to_string()], 0);

    let outcome = f.runner.run(&"q1".into()).await.unwrap();
    assert_eq!(outcome.status, QueueStatus::Completed);
    assert_eq!(outcome.completed_commands, 2);

    let spawns = f.processes.spawns();
    assert_eq!(
        spawns[0].args,
        vec!["-p", "--output-format", "stream-json", "prompt 0"],
        "index 0 is implicitly a new session"
    );
    assert_eq!(
        spawns[1].args,
        vec!["-p", "--output-format", "stream-json", "--resume", "prompt 1"]
    );

    let engine_ids: Vec<String> = f
        .events
        .lock()
        .iter()
        .filter_map(|e| match e {
            SdkEvent::CommandCompleted {
                engine_session_id, ..
            } => Some(engine_session_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(engine_ids, vec!["S", "S"]);

    let queue = queue_of(&f).await;
    assert_eq!(
        queue.active_session_id.as_ref().map(|i| i.as_str()),
        Some("S")
    );
    assert_eq!(queue.current_index, 2);
}

#[tokio::test]
async fn new_mode_skips_resume_and_replaces_active_session() {
    let f = fixture(&[SessionMode::Continue, SessionMode::New]).await;
    f.processes
        .script_with_stdout(vec!["{\"sessionId\":\"A\"}".to_string()], 0);
    f.processes
        .script_with_stdout(vec!["{\"sessionId\":\"B\"}".to_string()], 0);

    f.runner.run(&"q1".into()).await.unwrap();

    let spawns = f.processes.spawns();
    assert!(!spawns[1].args.contains(&"--resume".to_string()));
    let queue = queue_of(&f).await;
    assert_eq!(
        queue.active_session_id.as_ref().map(|i| i.as_str()),
        Some("B")
    );
}

#[tokio::test]
async fn additional_args_are_passed_through() {
    let f = fixture(&[SessionMode::Continue]).await;
    {
        let mut queue = queue_of(&f).await;
        queue.additional_args = vec!["--model".to_string(), "opus".to_string()];
        muster_adapters::QueueRepository::save(&f.repo, &queue)
            .await
            .unwrap();
    }
    f.runner.run(&"q1".into()).await.unwrap();

    assert_eq!(
        f.processes.spawns()[0].args,
        vec![
            "-p",
            "--output-format",
            "stream-json",
            "--model",
            "opus",
            "prompt 0"
        ]
    );
}

#[tokio::test]
async fn missing_session_id_fabricates_one() {
    let f = fixture(&[SessionMode::Continue]).await;
    f.processes.script_exit(0);
    f.runner.run(&"q1".into()).await.unwrap();

    let queue = queue_of(&f).await;
    let id = queue.commands[0]
        .engine_session_id
        .as_ref()
        .map(|i| i.as_str())
        .unwrap();
    assert!(id.starts_with("session-"), "fabricated id, got {}", id);
}

#[tokio::test]
async fn stop_on_error_fails_queue_and_skips_remainder() {
    let f = fixture(&[SessionMode::Continue, SessionMode::Continue]).await;
    f.processes.script_exit(1);

    let outcome = f.runner.run(&"q1".into()).await.unwrap();
    assert_eq!(outcome.status, QueueStatus::Failed);
    assert_eq!(outcome.failed_commands, 1);

    let queue = queue_of(&f).await;
    assert_eq!(
        statuses(&queue),
        vec![CommandStatus::Failed, CommandStatus::Skipped]
    );
    assert_eq!(
        queue.commands[0].error.as_deref(),
        Some("engine exited with code 1")
    );

    let failed = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::QueueFailed {
            failed_command_index,
            error,
            ..
        } => Some((*failed_command_index, error.clone())),
        _ => None,
    });
    assert_eq!(
        failed,
        Some((Some(0), "engine exited with code 1".to_string()))
    );

    // A failed queue cannot be resumed
    assert!(f.runner.resume(&"q1".into()).await.is_err());
    assert_eq!(f.processes.spawns().len(), 1, "command 1 never spawned");
}

#[tokio::test]
async fn stop_on_error_false_runs_the_rest() {
    let f = fixture(&[SessionMode::Continue, SessionMode::Continue]).await;
    {
        let mut queue = queue_of(&f).await;
        queue.stop_on_error = false;
        muster_adapters::QueueRepository::save(&f.repo, &queue)
            .await
            .unwrap();
    }
    f.processes.script_exit(1);
    f.processes.script_exit(0);

    let outcome = f.runner.run(&"q1".into()).await.unwrap();
    assert_eq!(outcome.status, QueueStatus::Completed);
    assert_eq!(outcome.completed_commands, 1);
    assert_eq!(outcome.failed_commands, 1);
}

#[tokio::test]
async fn empty_queue_completes_immediately() {
    let f = fixture(&[]).await;
    let outcome = f.runner.run(&"q1".into()).await.unwrap();
    assert_eq!(outcome.status, QueueStatus::Completed);
    assert_eq!(outcome.completed_commands, 0);
    assert_eq!(queue_of(&f).await.status, QueueStatus::Completed);
}

#[tokio::test]
async fn cost_records_accumulate_per_command_and_queue() {
    let f = fixture(&[SessionMode::Continue, SessionMode::Continue]).await;
    f.processes.script_with_stdout(
        vec![
            "{\"sessionId\":\"S\"}".to_string(),
            "{\"type\":\"result\",\"total_cost_usd\":0.25}".to_string(),
        ],
        0,
    );
    f.processes.script_with_stdout(
        vec!["{\"type\":\"result\",\"total_cost_usd\":0.5}".to_string()],
        0,
    );

    let outcome = f.runner.run(&"q1".into()).await.unwrap();
    assert_eq!(outcome.total_cost_usd, 0.75);

    let queue = queue_of(&f).await;
    assert_eq!(queue.commands[0].cost_usd, Some(0.25));
    assert_eq!(queue.commands[1].cost_usd, Some(0.5));
    assert_eq!(queue.total_cost_usd, 0.75);
}

#[tokio::test]
async fn already_finished_commands_are_skipped_with_cost_carried() {
    let f = fixture(&[SessionMode::Continue, SessionMode::Continue]).await;
    {
        let mut queue = queue_of(&f).await;
        queue.commands[0].status = CommandStatus::Completed;
        queue.commands[0].cost_usd = Some(1.0);
        muster_adapters::QueueRepository::save(&f.repo, &queue)
            .await
            .unwrap();
    }
    f.processes.script_exit(0);

    let outcome = f.runner.run(&"q1".into()).await.unwrap();
    assert_eq!(outcome.status, QueueStatus::Completed);
    assert_eq!(outcome.total_cost_usd, 1.0);
    assert_eq!(f.processes.spawns().len(), 1, "only command 1 executed");
    assert_eq!(
        f.processes.spawns()[0].args.last().unwrap(),
        "prompt 1"
    );
}

#[tokio::test]
async fn run_preconditions() {
    let f = fixture(&[SessionMode::Continue]).await;
    {
        let mut queue = queue_of(&f).await;
        queue.status = QueueStatus::Completed;
        muster_adapters::QueueRepository::save(&f.repo, &queue)
            .await
            .unwrap();
    }
    assert!(matches!(
        f.runner.run(&"q1".into()).await,
        Err(RunnerError::InvalidState { .. })
    ));
    assert!(f.runner.run(&"missing".into()).await.is_err());
}

#[tokio::test]
async fn concurrent_run_for_one_queue_is_rejected() {
    let f = fixture(&[SessionMode::Continue]).await;
    f.processes.script_held();

    let runner = Arc::clone(&f.runner);
    let task = tokio::spawn(async move { runner.run(&"q1".into()).await });
    wait_for(|| f.processes.running_count() == 1).await;

    assert!(matches!(
        f.runner.run(&"q1".into()).await,
        Err(RunnerError::AlreadyRunning(_))
    ));

    f.processes.controls()[0].exit(0);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn pause_interrupts_and_resume_reruns_the_command() {
    let f = fixture(&[SessionMode::Continue, SessionMode::Continue]).await;
    f.processes.script_held();

    let runner = Arc::clone(&f.runner);
    let task = tokio::spawn(async move { runner.run(&"q1".into()).await });
    wait_for(|| f.processes.running_count() == 1).await;

    f.runner.pause(&"q1".into()).await.unwrap();
    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome.status, QueueStatus::Paused);

    let queue = queue_of(&f).await;
    assert_eq!(queue.status, QueueStatus::Paused);
    assert_eq!(queue.current_index, 0, "cursor did not advance");
    assert_eq!(
        statuses(&queue),
        vec![CommandStatus::Pending, CommandStatus::Pending],
        "interrupted command is pending again"
    );

    let paused_at = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::QueuePaused {
            current_command_index,
            ..
        } => Some(*current_command_index),
        _ => None,
    });
    assert_eq!(paused_at, Some(0));

    // Resume runs both commands to completion
    f.processes.script_with_stdout(vec!["{\"sessionId\":\"S\"}".to_string()], 0);
    f.processes.script_exit(0);
    let outcome = f.runner.resume(&"q1".into()).await.unwrap();
    assert_eq!(outcome.status, QueueStatus::Completed);
    assert_eq!(outcome.completed_commands, 2);

    let resumed_from = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::QueueResumed {
            from_command_index, ..
        } => Some(*from_command_index),
        _ => None,
    });
    assert_eq!(resumed_from, Some(0));
}

#[tokio::test]
async fn stop_skips_everything_left() {
    let f = fixture(&[SessionMode::Continue, SessionMode::Continue]).await;
    f.processes.script_held();

    let runner = Arc::clone(&f.runner);
    let task = tokio::spawn(async move { runner.run(&"q1".into()).await });
    wait_for(|| f.processes.running_count() == 1).await;

    f.runner.stop(&"q1".into()).await.unwrap();
    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome.status, QueueStatus::Stopped);

    let queue = queue_of(&f).await;
    assert_eq!(queue.status, QueueStatus::Stopped);
    assert_eq!(
        statuses(&queue),
        vec![CommandStatus::Skipped, CommandStatus::Skipped]
    );

    // A stopped queue cannot run again
    assert!(f.runner.run(&"q1".into()).await.is_err());
}

#[tokio::test]
async fn stop_while_paused_finalizes_without_a_loop() {
    let f = fixture(&[SessionMode::Continue]).await;
    {
        let mut queue = queue_of(&f).await;
        queue.status = QueueStatus::Paused;
        muster_adapters::QueueRepository::save(&f.repo, &queue)
            .await
            .unwrap();
    }
    f.runner.stop(&"q1".into()).await.unwrap();

    let queue = queue_of(&f).await;
    assert_eq!(queue.status, QueueStatus::Stopped);
    assert_eq!(statuses(&queue), vec![CommandStatus::Skipped]);
}

#[tokio::test]
async fn command_events_carry_session_mode_details() {
    let f = fixture(&[SessionMode::Continue]).await;
    f.runner.run(&"q1".into()).await.unwrap();

    let started = f.events.lock().iter().find_map(|e| match e {
        SdkEvent::CommandStarted {
            index,
            session_mode,
            is_new_session,
            prompt,
            ..
        } => Some((*index, *session_mode, *is_new_session, prompt.clone())),
        _ => None,
    });
    assert_eq!(
        started,
        Some((0, SessionMode::Continue, true, "prompt 0".to_string()))
    );
}
