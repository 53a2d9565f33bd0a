//! Core types for the codegraph code-intelligence system
//!
//! This crate provides the foundational abstractions used throughout the
//! workspace:
//!
//! - **Graph model**: symbol nodes, edges, file index entries and embedding records
//! - **Identity**: deterministic node and edge identities, content fingerprints
//! - **Signatures**: normalized signature shapes and structural patterns
//! - **Resolution**: tie-break ordering among same-named candidates
//! - **Configuration**: system configuration management
//! - **Error handling**: the unified error taxonomy

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod entities;
pub mod entity_id;
pub mod error;
pub mod logging;
pub mod resolution;
pub mod signature;

// Re-export main types for convenience
pub use config::{
    Config, EmbeddingsConfig, IndexerConfig, QueryConfig, ResolutionConfig, StorageConfig,
    WatcherConfig,
};
pub use entities::{
    Direction, Edge, EdgeId, EdgeKind, EdgeTarget, EmbeddingPayload, EmbeddingRecord,
    ExtractionRecord, FileIndexEntry, Language, NodeId, ParseFailureInfo, SourceSpan, SymbolKind,
    SymbolNode,
};
pub use entity_id::{
    content_fingerprint, derive_module_path, generate_edge_id, generate_node_id, ScopeContext,
};
pub use error::{Error, Result, ResultExt};
pub use resolution::{rank_candidates, TieBreak};
pub use signature::{SignaturePattern, SignatureShape};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::entities::{Edge, EdgeKind, NodeId, SymbolKind, SymbolNode};
    pub use crate::error::{Result, ResultExt};
}
