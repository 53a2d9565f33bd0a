//! Query layer and facade for the code graph
//!
//! [`QueryEngine`] answers structural queries (goto, callers, callees, refs,
//! sig) from the graph store and semantic queries from the vector store.
//! [`CodeGraph`] bundles it with the reconciliation engine.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod code_graph;
mod models;
mod query_engine;
mod semantic_search;

pub use code_graph::CodeGraph;
pub use models::*;
pub use query_engine::QueryEngine;

pub use codegraph_core::config::Config;
pub use codegraph_core::error::{Error, Result};
pub use codegraph_indexer::{ChangeSet, ReconciliationReport};
