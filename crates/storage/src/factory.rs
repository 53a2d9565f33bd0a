use crate::error::StorageError;
use crate::{
    GraphStore, InMemoryGraphStore, InMemoryVectorStore, Neo4jGraphStore, QdrantVectorStore,
    VectorStore,
};
use codegraph_core::{config::StorageConfig, Result};
use std::sync::Arc;
use tracing::info;

/// Creates the graph store selected by `storage.graph_backend`
///
/// # Errors
/// Returns an error for an unknown backend name or when the remote backend
/// cannot be reached
pub async fn create_graph_store(config: &StorageConfig) -> Result<Arc<dyn GraphStore>> {
    match config.graph_backend.as_str() {
        "memory" => {
            info!("Using in-memory graph store");
            Ok(Arc::new(InMemoryGraphStore::new()))
        }
        "neo4j" => Ok(Arc::new(Neo4jGraphStore::connect(config).await?)),
        other => Err(StorageError::InvalidConfig(format!("unknown graph backend '{other}'")).into()),
    }
}

/// Creates the vector store selected by `storage.vector_backend`
///
/// `dimension` is the embedding provider's output size; remote collections
/// are created with it and checked against it.
pub async fn create_vector_store(
    config: &StorageConfig,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    match config.vector_backend.as_str() {
        "memory" => {
            info!("Using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::with_dimension(dimension)))
        }
        "qdrant" => Ok(Arc::new(QdrantVectorStore::connect(config, dimension).await?)),
        other => Err(StorageError::InvalidConfig(format!("unknown vector backend '{other}'")).into()),
    }
}
