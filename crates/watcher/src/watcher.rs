//! Filesystem watcher built on the notify crate
//!
//! Raw notify events are filtered (ignore patterns, gitignore, directories),
//! converted to [`FileChange`]s and debounced per path before being handed
//! to the caller.

use crate::{
    debouncer::{spawn_batcher, EventDebouncer},
    events::FileChange,
    git::GitRepository,
    ignore::IgnoreFilter,
};
use codegraph_core::error::{Error, Result};
use codegraph_core::WatcherConfig;
use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const QUEUE_SIZE: usize = 1024;
const MAX_INIT_RETRIES: usize = 3;
const INIT_RETRY_DELAY_MS: u64 = 100;

/// Watches directory trees and reports debounced file changes
pub struct FileWatcher {
    config: Arc<WatcherConfig>,
    ignore_filter: Arc<IgnoreFilter>,
    /// Kept alive for as long as events should flow
    watchers: Vec<RecommendedWatcher>,
    watched_paths: Arc<RwLock<Vec<PathBuf>>>,
    cancellation_token: CancellationToken,
}

impl FileWatcher {
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let ignore_filter = IgnoreFilter::from_patterns(&config.ignore_patterns)?;

        Ok(Self {
            config: Arc::new(config),
            ignore_filter: Arc::new(ignore_filter),
            watchers: Vec::new(),
            watched_paths: Arc::new(RwLock::new(Vec::new())),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Start watching `path` recursively; events arrive debounced, one per
    /// settled path
    pub async fn watch(&mut self, path: impl AsRef<Path>) -> Result<mpsc::Receiver<FileChange>> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(Error::watcher(format!(
                "Cannot watch {}: not a directory",
                path.display()
            )));
        }

        let git_repo = match GitRepository::open(&path) {
            Ok(repo) => Some(repo),
            Err(e) => {
                debug!("No Git repository for {:?}: {}", path, e);
                None
            }
        };

        let (notify_tx, notify_rx) = mpsc::channel(QUEUE_SIZE);
        let (debounced_tx, debounced_rx) = mpsc::channel(QUEUE_SIZE);
        let debouncer = EventDebouncer::new(self.config.debounce_duration(), debounced_tx);

        self.start_event_processor(notify_rx, debouncer, git_repo);

        let mut watcher = Self::init_watcher_with_retry(notify_tx).await?;
        watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| Error::watcher(format!("Failed to watch path {path:?}: {e}")))?;
        info!("Watching path: {:?}", path);

        self.watchers.push(watcher);
        self.watched_paths.write().await.push(path);

        Ok(debounced_rx)
    }

    /// Like [`watch`](Self::watch), grouped into batches of at most
    /// `batch_size` changes or whatever settled within `batch_timeout_ms`
    pub async fn watch_batches(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<mpsc::Receiver<Vec<FileChange>>> {
        let events = self.watch(path).await?;
        Ok(spawn_batcher(
            events,
            self.config.batch_size,
            Duration::from_millis(self.config.batch_timeout_ms),
        ))
    }

    async fn init_watcher_with_retry(
        tx: mpsc::Sender<NotifyEvent>,
    ) -> Result<RecommendedWatcher> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match Self::create_notify_watcher(tx.clone()) {
                Ok(watcher) => return Ok(watcher),
                Err(e) if attempts < MAX_INIT_RETRIES => {
                    warn!(
                        "Failed to initialize watcher (attempt {}/{}): {}",
                        attempts, MAX_INIT_RETRIES, e
                    );
                    tokio::time::sleep(Duration::from_millis(INIT_RETRY_DELAY_MS)).await;
                }
                Err(e) => {
                    error!("Failed to initialize watcher after {} attempts", attempts);
                    return Err(e);
                }
            }
        }
    }

    fn create_notify_watcher(tx: mpsc::Sender<NotifyEvent>) -> Result<RecommendedWatcher> {
        let config = NotifyConfig::default().with_compare_contents(false);
        RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    if let Err(e) = tx.try_send(event) {
                        error!("Failed to send notify event: {}", e);
                    }
                }
                Err(e) => error!("Notify error: {}", e),
            },
            config,
        )
        .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))
    }

    fn start_event_processor(
        &self,
        mut notify_rx: mpsc::Receiver<NotifyEvent>,
        debouncer: EventDebouncer,
        git_repo: Option<GitRepository>,
    ) {
        let ignore_filter = Arc::clone(&self.ignore_filter);
        let cancel = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debouncer.flush().await;
                        break;
                    }
                    received = notify_rx.recv() => {
                        let Some(event) = received else { break };
                        trace!("Received notify event: {:?}", event);
                        for change in convert_notify_event(&event) {
                            if is_filtered(&change, &ignore_filter, git_repo.as_ref()) {
                                continue;
                            }
                            debouncer.process_event(change).await;
                        }
                    }
                }
            }
            debug!("Event processor stopped");
        });
    }

    /// Stop all watches; pending debounced events are flushed
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation_token.cancel();
        self.watchers.clear();
        self.watched_paths.write().await.clear();
        info!("File watcher stopped");
        Ok(())
    }

    pub async fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths.read().await.clone()
    }

    /// Whether `path` lies under a watched root
    pub async fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths
            .read()
            .await
            .iter()
            .any(|p| path.starts_with(p))
    }
}

fn is_filtered(change: &FileChange, filter: &IgnoreFilter, git_repo: Option<&GitRepository>) -> bool {
    let path = change.path();
    if filter.should_ignore(path) {
        return true;
    }
    if git_repo.is_some_and(|repo| repo.should_ignore(path)) {
        trace!("Git ignoring path: {:?}", path);
        return true;
    }
    // Directory events carry no source content of their own
    !change.is_deletion() && path.is_dir()
}

/// Map a notify event to zero or more file changes
pub(crate) fn convert_notify_event(event: &NotifyEvent) -> Vec<FileChange> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(FileChange::Added).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            vec![FileChange::Renamed {
                from: event.paths[0].clone(),
                to: event.paths[1].clone(),
            }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().cloned().map(FileChange::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().cloned().map(FileChange::Added).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                if path.exists() {
                    FileChange::Modified(path.clone())
                } else {
                    FileChange::Deleted(path.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event.paths.iter().cloned().map(FileChange::Modified).collect(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(FileChange::Deleted).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
