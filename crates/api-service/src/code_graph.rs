//! One handle over indexing and querying a workspace

use crate::models::{
    CallGraphResult, GotoResult, RefsResult, SemanticSearchResult, SignatureResult,
};
use crate::query_engine::QueryEngine;
use codegraph_core::config::Config;
use codegraph_core::error::Result;
use codegraph_embeddings::EmbeddingManager;
use codegraph_indexer::{
    ChangeSet, EmbeddingSync, GraphSync, ReconciliationEngine, ReconciliationReport, RetryPolicy,
};
use codegraph_languages::ParserManager;
use codegraph_storage::{create_graph_store, create_vector_store, GraphStore, VectorStore};
use codegraph_watcher::FileWatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Code graph for one workspace: the reconciliation engine that keeps the
/// stores current and the query engine that reads them
pub struct CodeGraph {
    config: Config,
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    engine: Arc<ReconciliationEngine>,
    queries: QueryEngine,
}

impl CodeGraph {
    /// Wire the engines over stores the caller already holds
    pub fn new(
        config: Config,
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        embeddings: Arc<EmbeddingManager>,
    ) -> Result<Self> {
        config.validate()?;

        let retry = RetryPolicy::from_config(&config.indexer);
        let graph_sync = Arc::new(GraphSync::new(Arc::clone(&graph), &config.resolution));
        let embedding_sync = Arc::new(EmbeddingSync::new(
            Arc::clone(&embeddings),
            Arc::clone(&vectors),
            config.embeddings.clone(),
            retry,
        ));
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::new(ParserManager::from_config(&config)),
            graph_sync,
            embedding_sync,
            config.indexer.clone(),
        ));
        let queries = QueryEngine::new(
            Arc::clone(&graph),
            Arc::clone(&vectors),
            embeddings,
            config.query.clone(),
            &config.resolution,
        );

        Ok(Self {
            config,
            graph,
            vectors,
            engine,
            queries,
        })
    }

    /// Build the stores and embedding provider named by `config`
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let embeddings = Arc::new(EmbeddingManager::from_config(&config.embeddings)?);
        let dimension = embeddings.provider().embedding_dimension();
        let graph = create_graph_store(&config.storage).await?;
        let vectors = create_vector_store(&config.storage, dimension).await?;
        info!(
            graph_backend = %config.storage.graph_backend,
            vector_backend = %config.storage.vector_backend,
            model = embeddings.model_version(),
            "Code graph initialized"
        );
        Self::new(config, graph, vectors, embeddings)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph_store(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vectors
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    /// Full reconciliation of `root`
    pub async fn index(&self, root: &Path) -> Result<ReconciliationReport> {
        self.engine.index(root).await
    }

    pub async fn reconcile(
        &self,
        root: &Path,
        change_set: ChangeSet,
    ) -> Result<ReconciliationReport> {
        self.engine.reconcile(root, change_set).await
    }

    /// Watch `root` with the configured debounce and reconcile every batch
    ///
    /// Reports arrive on the returned channel for as long as the watcher
    /// is alive.
    pub async fn watch(
        &self,
        root: PathBuf,
    ) -> Result<(FileWatcher, mpsc::Receiver<Result<ReconciliationReport>>)> {
        Arc::clone(&self.engine)
            .watch(root, self.config.watcher.clone())
            .await
    }

    pub async fn goto(&self, name: &str) -> Result<GotoResult> {
        self.queries.goto(name).await
    }

    pub async fn callers(&self, name: &str, depth: usize) -> Result<CallGraphResult> {
        self.queries.callers(name, depth).await
    }

    pub async fn callees(&self, name: &str, depth: usize) -> Result<CallGraphResult> {
        self.queries.callees(name, depth).await
    }

    pub async fn refs(&self, name: &str) -> Result<RefsResult> {
        self.queries.refs(name).await
    }

    pub async fn sig(&self, pattern: &str) -> Result<SignatureResult> {
        self.queries.sig(pattern).await
    }

    pub async fn query(&self, text: &str, top_k: Option<usize>) -> Result<SemanticSearchResult> {
        self.queries.query(text, top_k).await
    }
}
