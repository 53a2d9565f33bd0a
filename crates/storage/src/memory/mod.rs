//! In-memory backends
//!
//! Both stores support failure injection so callers can exercise retries,
//! batch atomicity and failure-domain isolation without a real server.

mod graph;
mod vector;

pub use graph::InMemoryGraphStore;
pub use vector::InMemoryVectorStore;

use crate::error::StorageError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Switchable failure modes shared by the in-memory stores
#[derive(Debug, Default)]
pub(crate) struct FailureInjector {
    unavailable: AtomicBool,
    failing_writes: AtomicUsize,
}

impl FailureInjector {
    pub(crate) fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub(crate) fn check_read(&self, store: &str) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailed(format!("{store} is unavailable")));
        }
        Ok(())
    }

    pub(crate) fn check_write(&self, store: &str) -> Result<(), StorageError> {
        self.check_read(store)?;
        let consumed = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(StorageError::ConnectionFailed(format!(
                "{store} rejected the write (injected)"
            )));
        }
        Ok(())
    }
}
