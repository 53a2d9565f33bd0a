//! Integration tests for the file watcher
//!
//! These use temporary directories and real filesystem operations, so
//! event delivery depends on the platform backend; assertions only
//! require that the expected change shows up eventually.

use codegraph_watcher::{FileChange, FileWatcher, WatcherConfig};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

fn fast_config() -> WatcherConfig {
    WatcherConfig {
        debounce_ms: 50,
        batch_size: 10,
        batch_timeout_ms: 100,
        ..WatcherConfig::default()
    }
}

/// Drain events until one for `path` satisfies `pred`, or time out
async fn wait_for(
    rx: &mut mpsc::Receiver<FileChange>,
    path: &Path,
    pred: impl Fn(&FileChange) -> bool,
) -> bool {
    let deadline = Duration::from_secs(5);
    timeout(deadline, async {
        while let Some(event) = rx.recv().await {
            if event.path().file_name() == path.file_name() && pred(&event) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false)
}

#[tokio::test]
async fn test_file_creation_detection() {
    let temp_dir = TempDir::new().unwrap();
    let mut watcher = FileWatcher::new(fast_config()).unwrap();
    let mut events = watcher.watch(temp_dir.path()).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    let file = temp_dir.path().join("test.rs");
    tokio::fs::write(&file, "fn main() {}").await.unwrap();

    assert!(
        wait_for(&mut events, &file, |e| !e.is_deletion()).await,
        "no event for created file"
    );
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn test_file_deletion_detection() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("gone.py");
    tokio::fs::write(&file, "def f():\n    pass\n").await.unwrap();

    let mut watcher = FileWatcher::new(fast_config()).unwrap();
    let mut events = watcher.watch(temp_dir.path()).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    tokio::fs::remove_file(&file).await.unwrap();

    assert!(
        wait_for(&mut events, &file, FileChange::is_deletion).await,
        "no deletion event"
    );
}

#[tokio::test]
async fn test_ignored_files_are_not_reported() {
    let temp_dir = TempDir::new().unwrap();
    let mut watcher = FileWatcher::new(fast_config()).unwrap();
    let mut events = watcher.watch(temp_dir.path()).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    let ignored = temp_dir.path().join("scratch.tmp");
    tokio::fs::write(&ignored, "x").await.unwrap();
    let kept = temp_dir.path().join("kept.go");
    tokio::fs::write(&kept, "package main\n").await.unwrap();

    let seen = timeout(Duration::from_secs(5), async {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            let is_kept = event.path().file_name() == kept.file_name();
            seen.push(event);
            if is_kept {
                break;
            }
        }
        seen
    })
    .await
    .unwrap_or_default();

    assert!(seen
        .iter()
        .any(|e| e.path().file_name() == kept.file_name()));
    assert!(seen
        .iter()
        .all(|e| e.path().file_name() != ignored.file_name()));
}

#[tokio::test]
async fn test_batched_watch_groups_changes() {
    let temp_dir = TempDir::new().unwrap();
    let mut watcher = FileWatcher::new(fast_config()).unwrap();
    let mut batches = watcher.watch_batches(temp_dir.path()).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    for name in ["a.rs", "b.rs"] {
        tokio::fs::write(temp_dir.path().join(name), "fn f() {}")
            .await
            .unwrap();
    }

    let collected = timeout(Duration::from_secs(5), async {
        let mut names = Vec::new();
        while let Some(batch) = batches.recv().await {
            for change in batch {
                if let Some(name) = change.path().file_name() {
                    let name = name.to_string_lossy().to_string();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            if names.len() >= 2 {
                break;
            }
        }
        names.sort();
        names
    })
    .await
    .unwrap_or_default();

    assert_eq!(collected, vec!["a.rs".to_string(), "b.rs".to_string()]);
}
