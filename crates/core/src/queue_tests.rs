// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use crate::Clock;

fn queue_with_commands(n: usize) -> CommandQueue {
    let clock = FakeClock::new();
    let mut queue = CommandQueue::new("q", "review", "/work/api", clock.now());
    for i in 0..n {
        queue.commands.push(QueueCommand::new(
            format!("c{}", i),
            i,
            format!("prompt {}", i),
            SessionMode::Continue,
        ));
    }
    queue
}

#[test]
fn new_queue_is_pending_with_stop_on_error() {
    let queue = queue_with_commands(0);
    assert_eq!(queue.status, QueueStatus::Pending);
    assert_eq!(queue.current_index, 0);
    assert!(queue.stop_on_error);
    assert_eq!(queue.total_cost_usd, 0.0);
}

#[test]
fn command_lookup_by_id() {
    let mut queue = queue_with_commands(3);
    assert_eq!(queue.command("c1").map(|c| c.index), Some(1));
    assert!(queue.command("missing").is_none());

    queue.command_mut("c2").unwrap().status = CommandStatus::Running;
    assert_eq!(queue.command("c2").unwrap().status, CommandStatus::Running);
}

#[test]
fn reindex_restores_contiguous_indices() {
    let mut queue = queue_with_commands(4);
    queue.commands.remove(1);
    queue.reindex();
    let indices: Vec<usize> = queue.commands.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(queue.command("c0").unwrap().index, 0);
    assert_eq!(queue.command("c2").unwrap().index, 1);
    assert_eq!(queue.command("c3").unwrap().index, 2);
}

#[test]
fn stop_on_error_defaults_true_when_absent_in_json() {
    let clock = FakeClock::new();
    let queue = CommandQueue::new("q", "n", "/w", clock.now());
    let mut json = serde_json::to_value(&queue).unwrap();
    json.as_object_mut().unwrap().remove("stop_on_error");
    let back: CommandQueue = serde_json::from_value(json).unwrap();
    assert!(back.stop_on_error);
}
