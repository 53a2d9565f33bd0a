//! Incremental reconciliation of source files into the code graph
//!
//! This crate keeps the graph and vector stores in step with a workspace:
//!
//! - [`GraphSync`] merges one file's extraction result atomically
//! - [`EmbeddingSync`] embeds changed symbols and skips unchanged ones
//! - [`SourceProvider`]s turn a [`ChangeSet`] into per-file work
//! - [`ReconciliationEngine`] drives all of it concurrently and reports
//!   per-file outcomes in a [`ReconciliationReport`]

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod common;
mod embedding_sync;
mod engine;
mod graph_sync;
mod report;
mod source;

pub use common::{normalize_path, Exclusion, RetryPolicy};
pub use embedding_sync::{
    embedding_text, text_hash, EmbeddingFailure, EmbeddingOutcome, EmbeddingSync,
};
pub use engine::ReconciliationEngine;
pub use graph_sync::{GraphSync, MergeOutcome};
pub use report::{FileFailure, ReconciliationReport};
pub use source::{
    source_for, ChangeSet, FileContent, FileTask, GitDiffSource, SourcePlan, SourceProvider,
    WorkspaceSource,
};

pub use codegraph_core::error::{Error, Result};
pub use codegraph_watcher::FileChange;
