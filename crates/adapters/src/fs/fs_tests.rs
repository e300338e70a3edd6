// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn local_read_write_stat_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.jsonl");
    let fs = LocalFileSystem::new();

    assert!(!fs.exists(&path).await);
    fs.write(&path, b"line one\n").await.unwrap();
    assert!(fs.exists(&path).await);
    assert_eq!(fs.read_to_string(&path).await.unwrap(), "line one\n");
    assert_eq!(fs.stat(&path).await.unwrap(), FileStat { size: 9 });
}

#[tokio::test]
async fn local_missing_file_errors_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent");
    let fs = LocalFileSystem::new();

    let err = fs.read_to_string(&path).await.unwrap_err();
    assert!(err.is_not_found());
    let err = fs.stat(&path).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn local_create_dir_all_is_recursive() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a/b/c");
    let fs = LocalFileSystem::new();
    fs.create_dir_all(&nested).await.unwrap();
    assert!(fs.exists(&nested).await);
}

#[tokio::test]
async fn local_watch_sees_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    std::fs::write(&path, "").unwrap();

    let fs = LocalFileSystem::new();
    let mut stream = fs.watch(&path).await.unwrap();

    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(file, "appended").unwrap();
    }

    let notified = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next()).await;
    assert!(matches!(notified, Ok(Some(()))));
}

#[tokio::test]
async fn fake_seed_does_not_notify_but_put_does() {
    let fs = FakeFileSystem::new();
    let path = Path::new("/t/log.jsonl");
    let mut stream = fs.watch(path).await.unwrap();

    fs.seed(path, "initial");
    assert!(
        tokio::time::timeout(std::time::Duration::from_millis(20), stream.next())
            .await
            .is_err()
    );

    fs.put(path, "replaced");
    assert_eq!(stream.next().await, Some(()));
    assert_eq!(fs.read_to_string(path).await.unwrap(), "replaced");
}

#[tokio::test]
async fn fake_append_grows_and_truncate_resets() {
    let fs = FakeFileSystem::new();
    let path = Path::new("/t/log.jsonl");
    fs.seed(path, "abc");
    fs.append(path, "def");
    assert_eq!(fs.stat(path).await.unwrap().size, 6);

    fs.truncate(path);
    assert_eq!(fs.stat(path).await.unwrap().size, 0);
    assert!(fs.exists(path).await);
}

#[tokio::test]
async fn fake_remove_makes_reads_not_found() {
    let fs = FakeFileSystem::new();
    let path = Path::new("/t/gone");
    fs.seed(path, "x");
    fs.remove(path);
    assert!(fs.read_to_string(path).await.unwrap_err().is_not_found());
}
