//! Event debouncing and batching
//!
//! Raw notify events arrive in bursts (an editor save is often a create, a
//! few writes and a rename). [`EventDebouncer`] holds each path until it has
//! been quiet for the debounce window; [`BatchProcessor`] then groups the
//! settled events into batches for reconciliation.

use crate::events::{DebouncedEvent, FileChange};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, trace};

/// Per-path trailing debouncer
pub struct EventDebouncer {
    debounce_duration: Duration,
    pending_events: Arc<DashMap<PathBuf, DebouncedEvent>>,
    output_tx: mpsc::Sender<FileChange>,
}

impl EventDebouncer {
    pub fn new(debounce_duration: Duration, output_tx: mpsc::Sender<FileChange>) -> Self {
        Self {
            debounce_duration,
            pending_events: Arc::new(DashMap::new()),
            output_tx,
        }
    }

    /// Record an event; it is emitted once its path has been quiet for the
    /// debounce window
    pub async fn process_event(&self, event: FileChange) {
        let path = event.path().to_path_buf();

        if let Some(mut existing) = self.pending_events.get_mut(&path) {
            trace!("Updating existing event for path: {:?}", path);
            existing.update(event);
            return;
        }

        debug!("New event for path: {:?}", path);
        self.pending_events
            .insert(path.clone(), DebouncedEvent::new(event));

        let pending_events = Arc::clone(&self.pending_events);
        let output_tx = self.output_tx.clone();
        let debounce_duration = self.debounce_duration;

        tokio::spawn(async move {
            let mut wait = debounce_duration;
            loop {
                sleep(wait).await;
                let remaining = match pending_events.get(&path) {
                    Some(entry) => debounce_duration.saturating_sub(entry.time_since_update()),
                    None => return,
                };
                if remaining.is_zero() {
                    break;
                }
                wait = remaining;
            }

            if let Some((_, event)) = pending_events.remove(&path) {
                debug!(
                    "Emitting debounced event for {:?} (aggregated {} times)",
                    path, event.occurrence_count
                );
                let _ = output_tx.send(event.event).await;
            }
        });
    }

    /// Emit every pending event now
    pub async fn flush(&self) {
        debug!("Flushing {} pending events", self.pending_events.len());

        let paths: Vec<PathBuf> = self
            .pending_events
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for path in paths {
            if let Some((_, event)) = self.pending_events.remove(&path) {
                let _ = self.output_tx.send(event.event).await;
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending_events.len()
    }
}

/// Folds events for the same path and orders the result
#[derive(Default)]
pub struct EventAggregator {
    events: HashMap<PathBuf, DebouncedEvent>,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, event: FileChange) {
        let path = event.path().to_path_buf();
        match self.events.get_mut(&path) {
            Some(existing) => existing.update(event),
            None => {
                self.events.insert(path, DebouncedEvent::new(event));
            }
        }
    }

    /// Drain into one event per path, deletions first, then by path
    pub fn drain(&mut self) -> Vec<FileChange> {
        let mut batch: Vec<FileChange> = self.events.drain().map(|(_, e)| e.event).collect();
        batch.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.path().cmp(b.path()))
        });
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Groups a stream of settled events into batches by size or timeout
pub struct BatchProcessor {
    aggregator: EventAggregator,
    batch_size: usize,
    batch_timeout: Duration,
    input_rx: mpsc::Receiver<FileChange>,
    output_tx: mpsc::Sender<Vec<FileChange>>,
}

impl BatchProcessor {
    pub fn new(
        batch_size: usize,
        batch_timeout: Duration,
        input_rx: mpsc::Receiver<FileChange>,
        output_tx: mpsc::Sender<Vec<FileChange>>,
    ) -> Self {
        Self {
            aggregator: EventAggregator::new(),
            batch_size: batch_size.max(1),
            batch_timeout,
            input_rx,
            output_tx,
        }
    }

    /// Run until the input channel closes, then flush what is left
    pub async fn run(mut self) {
        let mut timeout_interval = interval(self.batch_timeout);
        timeout_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        timeout_interval.tick().await;

        loop {
            tokio::select! {
                received = self.input_rx.recv() => {
                    match received {
                        Some(event) => {
                            self.aggregator.add_event(event);
                            if self.aggregator.len() >= self.batch_size {
                                self.flush_batch().await;
                            }
                        }
                        None => break,
                    }
                }
                _ = timeout_interval.tick() => {
                    if !self.aggregator.is_empty() {
                        self.flush_batch().await;
                    }
                }
            }
        }

        if !self.aggregator.is_empty() {
            self.flush_batch().await;
        }
        debug!("Batch processor stopped");
    }

    async fn flush_batch(&mut self) {
        let batch = self.aggregator.drain();
        if !batch.is_empty() {
            debug!("Flushing batch of {} events", batch.len());
            let _ = self.output_tx.send(batch).await;
        }
    }
}

/// Spawn a [`BatchProcessor`] over `input_rx` and return the batch receiver
pub fn spawn_batcher(
    input_rx: mpsc::Receiver<FileChange>,
    batch_size: usize,
    batch_timeout: Duration,
) -> mpsc::Receiver<Vec<FileChange>> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(BatchProcessor::new(batch_size, batch_timeout, input_rx, tx).run());
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::timeout;

    fn path(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    #[tokio::test]
    async fn test_debouncer_coalesces_burst_into_one_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let debouncer = EventDebouncer::new(Duration::from_millis(50), tx);

        debouncer.process_event(FileChange::Added(path("a.rs"))).await;
        debouncer.process_event(FileChange::Modified(path("a.rs"))).await;
        debouncer.process_event(FileChange::Modified(path("a.rs"))).await;
        assert_eq!(debouncer.pending_count(), 1);

        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, FileChange::Added(path("a.rs")));
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_debouncer_keeps_paths_separate() {
        let (tx, mut rx) = mpsc::channel(10);
        let debouncer = EventDebouncer::new(Duration::from_millis(20), tx);

        debouncer.process_event(FileChange::Modified(path("a.rs"))).await;
        debouncer.process_event(FileChange::Deleted(path("b.rs"))).await;

        let mut received = Vec::new();
        for _ in 0..2 {
            received.push(
                timeout(Duration::from_secs(2), rx.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        received.sort_by(|a, b| a.path().cmp(b.path()));
        assert_eq!(
            received,
            vec![
                FileChange::Modified(path("a.rs")),
                FileChange::Deleted(path("b.rs"))
            ]
        );
    }

    #[tokio::test]
    async fn test_flush_emits_pending_immediately() {
        let (tx, mut rx) = mpsc::channel(10);
        let debouncer = EventDebouncer::new(Duration::from_secs(60), tx);
        debouncer.process_event(FileChange::Modified(path("a.rs"))).await;
        debouncer.flush().await;

        assert_eq!(rx.try_recv().unwrap(), FileChange::Modified(path("a.rs")));
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[test]
    fn test_aggregator_orders_deletions_first() {
        let mut aggregator = EventAggregator::new();
        aggregator.add_event(FileChange::Added(path("c.rs")));
        aggregator.add_event(FileChange::Modified(path("a.rs")));
        aggregator.add_event(FileChange::Deleted(path("b.rs")));
        aggregator.add_event(FileChange::Modified(path("c.rs")));

        assert_eq!(
            aggregator.drain(),
            vec![
                FileChange::Deleted(path("b.rs")),
                FileChange::Modified(path("a.rs")),
                FileChange::Added(path("c.rs")),
            ]
        );
        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn test_batcher_flushes_on_size_and_on_close() {
        let (tx, rx) = mpsc::channel(10);
        let mut batches = spawn_batcher(rx, 2, Duration::from_secs(60));

        tx.send(FileChange::Modified(path("a.rs"))).await.unwrap();
        tx.send(FileChange::Modified(path("b.rs"))).await.unwrap();
        let first = timeout(Duration::from_secs(2), batches.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.len(), 2);

        tx.send(FileChange::Deleted(path("c.rs"))).await.unwrap();
        drop(tx);
        let last = timeout(Duration::from_secs(2), batches.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last, vec![FileChange::Deleted(path("c.rs"))]);
        assert!(batches.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_batcher_flushes_partial_batch_on_timeout() {
        let (tx, rx) = mpsc::channel(10);
        let mut batches = spawn_batcher(rx, 100, Duration::from_millis(30));

        tx.send(FileChange::Added(path("a.rs"))).await.unwrap();
        let batch = timeout(Duration::from_secs(2), batches.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch, vec![FileChange::Added(path("a.rs"))]);
        drop(tx);
    }
}
