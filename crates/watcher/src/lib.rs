//! Change detection for incremental reconciliation
//!
//! Two sources of [`FileChange`]s live here: a live filesystem watcher
//! (notify, debounced and filtered) and git commit diffs (git2).

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod debouncer;
mod events;
mod git;
mod ignore;
mod watcher;

pub use debouncer::{spawn_batcher, BatchProcessor, EventAggregator, EventDebouncer};
pub use events::{DebouncedEvent, FileChange};
pub use git::GitRepository;
pub use ignore::IgnoreFilter;
pub use watcher::FileWatcher;

pub use codegraph_core::WatcherConfig;
