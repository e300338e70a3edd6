// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn cwd() -> PathBuf {
    std::env::temp_dir()
}

#[tokio::test]
async fn local_captures_stdout_and_exit_code() {
    let manager = LocalProcessManager::new();
    let mut handle = manager
        .spawn(
            "sh",
            &["-c".to_string(), "echo one; echo two".to_string()],
            &cwd(),
            &[],
        )
        .await
        .unwrap();

    let mut stdout = handle.take_stdout().unwrap();
    assert!(handle.take_stdout().is_none(), "stdout is taken once");

    let code = handle.wait().await.unwrap();
    assert_eq!(code, Some(0));

    let mut lines = Vec::new();
    while let Some(line) = stdout.recv().await {
        lines.push(line);
    }
    assert_eq!(lines, vec!["one", "two"]);
}

#[tokio::test]
async fn local_nonzero_exit_code() {
    let manager = LocalProcessManager::new();
    let mut handle = manager
        .spawn("sh", &["-c".to_string(), "exit 3".to_string()], &cwd(), &[])
        .await
        .unwrap();
    assert_eq!(handle.wait().await.unwrap(), Some(3));
}

#[tokio::test]
async fn local_env_and_cwd_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let manager = LocalProcessManager::new();
    let mut handle = manager
        .spawn(
            "sh",
            &["-c".to_string(), "echo \"$MUSTER_TEST_VAR\"; pwd".to_string()],
            dir.path(),
            &[("MUSTER_TEST_VAR".to_string(), "hello".to_string())],
        )
        .await
        .unwrap();

    let mut stdout = handle.take_stdout().unwrap();
    handle.wait().await.unwrap();

    let mut lines = Vec::new();
    while let Some(line) = stdout.recv().await {
        lines.push(line);
    }
    assert_eq!(lines[0], "hello");
    let reported = std::fs::canonicalize(&lines[1]).unwrap();
    assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
}

#[tokio::test]
async fn local_sigterm_terminates_wait_with_none() {
    let manager = LocalProcessManager::new();
    let mut handle = manager
        .spawn("sleep", &["30".to_string()], &cwd(), &[])
        .await
        .unwrap();
    let signaller = handle.signaller();

    signaller.signal(Signal::Term).await.unwrap();
    let code = tokio::time::timeout(std::time::Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, None);
}

#[tokio::test]
async fn local_spawn_failure_surfaces() {
    let manager = LocalProcessManager::new();
    let result = manager
        .spawn("definitely-not-a-real-binary", &[], &cwd(), &[])
        .await;
    assert!(matches!(result, Err(ProcessError::SpawnFailed(_))));
}

#[tokio::test]
async fn fake_default_script_exits_zero() {
    let manager = FakeProcessManager::new();
    let mut handle = manager.spawn("claude", &[], &cwd(), &[]).await.unwrap();
    assert_eq!(handle.wait().await.unwrap(), Some(0));
    assert_eq!(manager.spawns().len(), 1);
}

#[tokio::test]
async fn fake_scripted_stdout_then_exit() {
    let manager = FakeProcessManager::new();
    manager.script_with_stdout(vec!["{\"sessionId\":\"S\"}".to_string()], 0);

    let mut handle = manager.spawn("claude", &[], &cwd(), &[]).await.unwrap();
    let mut stdout = handle.take_stdout().unwrap();
    assert_eq!(handle.wait().await.unwrap(), Some(0));

    let mut lines = Vec::new();
    while let Some(line) = stdout.recv().await {
        lines.push(line);
    }
    assert_eq!(lines, vec!["{\"sessionId\":\"S\"}"]);
}

#[tokio::test]
async fn fake_held_process_resolves_on_signal() {
    let manager = FakeProcessManager::new();
    manager.script_held();

    let mut handle = manager.spawn("claude", &[], &cwd(), &[]).await.unwrap();
    assert_eq!(manager.running_count(), 1);

    let signaller = handle.signaller();
    signaller.signal(Signal::Term).await.unwrap();

    assert_eq!(handle.wait().await.unwrap(), None);
    assert_eq!(manager.running_count(), 0);
    assert_eq!(manager.signals().len(), 1);
    assert_eq!(manager.signals()[0].1, Signal::Term);
}

#[tokio::test]
async fn fake_held_process_control_pushes_lines_and_exits() {
    let manager = FakeProcessManager::new();
    manager.script_held();

    let mut handle = manager.spawn("claude", &[], &cwd(), &[]).await.unwrap();
    let mut stdout = handle.take_stdout().unwrap();

    let control = manager.controls().remove(0);
    control.push_stdout("{\"sessionId\":\"live\"}");
    assert_eq!(stdout.recv().await.unwrap(), "{\"sessionId\":\"live\"}");

    control.exit(0);
    assert_eq!(handle.wait().await.unwrap(), Some(0));
    // stdout closes at exit
    assert!(stdout.recv().await.is_none());
}

#[tokio::test]
async fn fake_spawn_error_fires_once() {
    let manager = FakeProcessManager::new();
    manager.fail_next_spawn("boom");
    assert!(manager.spawn("claude", &[], &cwd(), &[]).await.is_err());
    assert!(manager.spawn("claude", &[], &cwd(), &[]).await.is_ok());
}

#[tokio::test]
async fn fake_records_argv_and_env() {
    let manager = FakeProcessManager::new();
    let args = vec!["-p".to_string(), "do it".to_string()];
    let env = vec![("ENGINE_CONFIG_DIR".to_string(), "/cfg".to_string())];
    manager.spawn("claude", &args, &cwd(), &env).await.unwrap();

    let spawns = manager.spawns();
    assert_eq!(spawns[0].cmd, "claude");
    assert_eq!(spawns[0].args, args);
    assert_eq!(spawns[0].env, env);
}
