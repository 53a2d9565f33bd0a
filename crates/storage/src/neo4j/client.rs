use crate::error::StorageError;
use crate::{
    edge_target_matches, name_matches, simple_name, EdgeTargetQuery, GraphBatch, GraphStore,
};
use async_trait::async_trait;
use codegraph_core::entities::{
    Edge, EdgeId, EdgeKind, FileIndexEntry, Language, NodeId, SymbolNode,
};
use codegraph_core::error::Result;
use codegraph_core::StorageConfig;
use neo4rs::{BoltType, Graph, Query};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Empty string stands for "not resolved" in the `target_id` property
const UNRESOLVED: &str = "";

fn neo4j_error(context: &str, err: neo4rs::Error) -> StorageError {
    match err {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => {
            StorageError::ConnectionFailed(format!("{context}: {err}"))
        }
        other => StorageError::BackendError(format!("{context}: {other}")),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> std::result::Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

fn node_map(node: &SymbolNode) -> std::result::Result<HashMap<String, BoltType>, StorageError> {
    let mut map = HashMap::new();
    map.insert("id".to_string(), node.id.as_str().into());
    map.insert("name".to_string(), node.name.clone().into());
    map.insert("qualified_name".to_string(), node.qualified_name.clone().into());
    map.insert("file".to_string(), node.file.clone().into());
    map.insert("kind".to_string(), node.kind.to_string().into());
    map.insert("data".to_string(), to_json(node)?.into());
    Ok(map)
}

fn edge_map(edge: &Edge) -> std::result::Result<HashMap<String, BoltType>, StorageError> {
    let mut map = HashMap::new();
    map.insert("id".to_string(), edge.id.as_str().into());
    map.insert("kind".to_string(), edge.kind.to_string().into());
    map.insert("source".to_string(), edge.source.as_str().into());
    map.insert("target_name".to_string(), edge.target.name.clone().into());
    map.insert(
        "target_key".to_string(),
        simple_name(&edge.target.name).into(),
    );
    map.insert(
        "target_id".to_string(),
        edge.target_id().map_or(UNRESOLVED, NodeId::as_str).into(),
    );
    map.insert("file".to_string(), edge.file.clone().into());
    map.insert("data".to_string(), to_json(edge)?.into());
    Ok(map)
}

fn decode<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::SerializationError(err.to_string())
}

fn strings<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    ids.into_iter().map(str::to_string).collect()
}

/// Graph store backed by a Neo4j database
///
/// Symbols, edges and file entries are stored as `CodegraphSymbol`,
/// `CodegraphEdge` and `CodegraphFile` nodes. Edges are nodes rather than
/// relationships so that unresolved edges, which have no target node, live
/// in the same place as resolved ones. Each symbol and edge keeps its full
/// JSON form in a `data` property beside the indexed lookup fields.
pub struct Neo4jGraphStore {
    graph: Arc<Graph>,
}

impl Neo4jGraphStore {
    /// Connect and make sure constraints and indexes exist
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        info!("Connecting to Neo4j at {}", config.neo4j_uri);

        let password = config.neo4j_password.clone().unwrap_or_default();
        let graph = Graph::new(&config.neo4j_uri, &config.neo4j_user, &password)
            .await
            .map_err(|e| neo4j_error("Failed to connect to Neo4j", e))?;

        let store = Self {
            graph: Arc::new(graph),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT codegraph_symbol_id IF NOT EXISTS FOR (n:CodegraphSymbol) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT codegraph_edge_id IF NOT EXISTS FOR (n:CodegraphEdge) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT codegraph_file_path IF NOT EXISTS FOR (n:CodegraphFile) REQUIRE n.path IS UNIQUE",
            "CREATE INDEX codegraph_symbol_name IF NOT EXISTS FOR (n:CodegraphSymbol) ON (n.name)",
            "CREATE INDEX codegraph_edge_source IF NOT EXISTS FOR (n:CodegraphEdge) ON (n.source)",
            "CREATE INDEX codegraph_edge_target_id IF NOT EXISTS FOR (n:CodegraphEdge) ON (n.target_id)",
            "CREATE INDEX codegraph_edge_target_key IF NOT EXISTS FOR (n:CodegraphEdge) ON (n.target_key)",
        ];
        for statement in statements {
            self.graph
                .run(Query::new(statement.to_string()))
                .await
                .map_err(|e| neo4j_error("Failed to create schema", e))?;
        }
        debug!("Neo4j schema ready");
        Ok(())
    }

    /// Run a read query and deserialize the `data` column of every row
    async fn fetch_data<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>> {
        let mut rows = self
            .graph
            .execute(query)
            .await
            .map_err(|e| neo4j_error("Query failed", e))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| neo4j_error("Failed to read row", e))?
        {
            let data: String = row.get("data").map_err(decode)?;
            items.push(serde_json::from_str(&data).map_err(StorageError::from)?);
        }
        Ok(items)
    }

    async fn fetch_file_entries(&self, query: Query) -> Result<Vec<FileIndexEntry>> {
        let mut rows = self
            .graph
            .execute(query)
            .await
            .map_err(|e| neo4j_error("Query failed", e))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| neo4j_error("Failed to read row", e))?
        {
            let language: String = row.get("language").map_err(decode)?;
            let node_ids: Vec<String> = row.get("node_ids").map_err(decode)?;
            let edge_ids: Vec<String> = row.get("edge_ids").map_err(decode)?;
            entries.push(FileIndexEntry {
                path: row.get("path").map_err(decode)?,
                fingerprint: row.get("fingerprint").map_err(decode)?,
                language: language.parse().unwrap_or(Language::Unknown),
                node_ids: node_ids.into_iter().map(NodeId::new).collect(),
                edge_ids: edge_ids.into_iter().map(EdgeId::new).collect(),
                degraded: row.get("degraded").map_err(decode)?,
            });
        }
        Ok(entries)
    }

    fn batch_queries(batch: &GraphBatch) -> std::result::Result<Vec<Query>, StorageError> {
        let mut queries = Vec::new();

        if !batch.delete_edges.is_empty() {
            queries.push(
                Query::new(
                    "UNWIND $ids AS id
                     MATCH (e:CodegraphEdge {id: id})
                     OPTIONAL MATCH (f:CodegraphFile {path: e.file})
                     SET f.edge_ids = [x IN f.edge_ids WHERE x <> id]
                     DETACH DELETE e"
                        .to_string(),
                )
                .param("ids", strings(batch.delete_edges.iter().map(EdgeId::as_str))),
            );
        }

        if !batch.delete_nodes.is_empty() {
            queries.push(
                Query::new(
                    "UNWIND $ids AS id
                     MATCH (s:CodegraphSymbol {id: id})
                     OPTIONAL MATCH (f:CodegraphFile {path: s.file})
                     SET f.node_ids = [x IN f.node_ids WHERE x <> id]
                     DETACH DELETE s"
                        .to_string(),
                )
                .param("ids", strings(batch.delete_nodes.iter().map(NodeId::as_str))),
            );
        }

        if !batch.upsert_nodes.is_empty() {
            let nodes = batch
                .upsert_nodes
                .iter()
                .map(node_map)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            queries.push(
                Query::new(
                    "UNWIND $nodes AS node
                     MERGE (s:CodegraphSymbol {id: node.id})
                     SET s.name = node.name,
                         s.qualified_name = node.qualified_name,
                         s.file = node.file,
                         s.kind = node.kind,
                         s.data = node.data"
                        .to_string(),
                )
                .param("nodes", nodes),
            );
        }

        if !batch.upsert_edges.is_empty() {
            let edges = batch
                .upsert_edges
                .iter()
                .map(edge_map)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            queries.push(
                Query::new(
                    "UNWIND $edges AS edge
                     MERGE (e:CodegraphEdge {id: edge.id})
                     SET e.kind = edge.kind,
                         e.source = edge.source,
                         e.target_name = edge.target_name,
                         e.target_key = edge.target_key,
                         e.target_id = edge.target_id,
                         e.file = edge.file,
                         e.data = edge.data
                     WITH e, edge
                     OPTIONAL MATCH (f:CodegraphFile {path: edge.file})
                     FOREACH (_ IN CASE WHEN f IS NULL OR edge.id IN f.edge_ids THEN [] ELSE [1] END |
                         SET f.edge_ids = f.edge_ids + edge.id)"
                        .to_string(),
                )
                .param("edges", edges),
            );
        }

        if let Some(path) = &batch.remove_file_entry {
            queries.push(
                Query::new("MATCH (f:CodegraphFile {path: $path}) DELETE f".to_string())
                    .param("path", path.clone()),
            );
        }

        if let Some(entry) = &batch.put_file_entry {
            queries.push(
                Query::new(
                    "MERGE (f:CodegraphFile {path: $path})
                     SET f.fingerprint = $fingerprint,
                         f.language = $language,
                         f.node_ids = $node_ids,
                         f.edge_ids = $edge_ids,
                         f.degraded = $degraded"
                        .to_string(),
                )
                .param("path", entry.path.clone())
                .param("fingerprint", entry.fingerprint.clone())
                .param("language", entry.language.to_string())
                .param("node_ids", strings(entry.node_ids.iter().map(NodeId::as_str)))
                .param("edge_ids", strings(entry.edge_ids.iter().map(EdgeId::as_str)))
                .param("degraded", entry.degraded),
            );
        }

        Ok(queries)
    }
}

const FILE_COLUMNS: &str = "f.path AS path, f.fingerprint AS fingerprint, f.language AS language, \
     f.node_ids AS node_ids, f.edge_ids AS edge_ids, f.degraded AS degraded";

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn apply_batch(&self, batch: GraphBatch) -> Result<()> {
        let queries = Self::batch_queries(&batch)?;
        if queries.is_empty() {
            return Ok(());
        }

        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| neo4j_error("Failed to start transaction", e))?;
        txn.run_queries(queries)
            .await
            .map_err(|e| neo4j_error("Failed to apply graph batch", e))?;
        txn.commit()
            .await
            .map_err(|e| neo4j_error("Failed to commit graph batch", e))?;

        debug!(
            upserted_nodes = batch.upsert_nodes.len(),
            upserted_edges = batch.upsert_edges.len(),
            deleted_nodes = batch.delete_nodes.len(),
            deleted_edges = batch.delete_edges.len(),
            "Applied graph batch"
        );
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<SymbolNode>> {
        let query = Query::new(
            "MATCH (s:CodegraphSymbol {name: $name}) RETURN s.data AS data".to_string(),
        )
        .param("name", simple_name(name));
        let nodes: Vec<SymbolNode> = self.fetch_data(query).await?;
        Ok(nodes
            .into_iter()
            .filter(|node| name_matches(node, name))
            .collect())
    }

    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<SymbolNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new(
            "UNWIND $ids AS id MATCH (s:CodegraphSymbol {id: id}) RETURN s.data AS data"
                .to_string(),
        )
        .param("ids", strings(ids.iter().map(NodeId::as_str)));
        self.fetch_data(query).await
    }

    async fn get_edges(&self, ids: &[EdgeId]) -> Result<Vec<Edge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new(
            "UNWIND $ids AS id MATCH (e:CodegraphEdge {id: id}) RETURN e.data AS data"
                .to_string(),
        )
        .param("ids", strings(ids.iter().map(EdgeId::as_str)));
        self.fetch_data(query).await
    }

    async fn edges_from(&self, sources: &[NodeId], kind: Option<EdgeKind>) -> Result<Vec<Edge>> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new(
            "MATCH (e:CodegraphEdge)
             WHERE e.source IN $sources AND ($kind = '' OR e.kind = $kind)
             RETURN e.data AS data"
                .to_string(),
        )
        .param("sources", strings(sources.iter().map(NodeId::as_str)))
        .param("kind", kind.map(|k| k.to_string()).unwrap_or_default());
        self.fetch_data(query).await
    }

    async fn edges_targeting(&self, target: &EdgeTargetQuery) -> Result<Vec<Edge>> {
        match target {
            EdgeTargetQuery::ById(id) => {
                let query = Query::new(
                    "MATCH (e:CodegraphEdge {target_id: $id}) RETURN e.data AS data".to_string(),
                )
                .param("id", id.as_str());
                self.fetch_data(query).await
            }
            EdgeTargetQuery::ByName(name) => {
                let query = Query::new(
                    "MATCH (e:CodegraphEdge {target_key: $key}) RETURN e.data AS data"
                        .to_string(),
                )
                .param("key", simple_name(name));
                let edges: Vec<Edge> = self.fetch_data(query).await?;
                Ok(edges
                    .into_iter()
                    .filter(|edge| edge_target_matches(edge, name))
                    .collect())
            }
        }
    }

    async fn unresolved_edges_named(&self, names: &[String]) -> Result<Vec<Edge>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let keys = strings(names.iter().map(|n| simple_name(n)));
        let query = Query::new(
            "MATCH (e:CodegraphEdge)
             WHERE e.target_key IN $keys AND e.target_id = $unresolved
             RETURN e.data AS data"
                .to_string(),
        )
        .param("keys", keys)
        .param("unresolved", UNRESOLVED);
        self.fetch_data(query).await
    }

    async fn file_entry(&self, path: &str) -> Result<Option<FileIndexEntry>> {
        let query = Query::new(format!(
            "MATCH (f:CodegraphFile {{path: $path}}) RETURN {FILE_COLUMNS}"
        ))
        .param("path", path);
        Ok(self.fetch_file_entries(query).await?.into_iter().next())
    }

    async fn file_entries(&self) -> Result<Vec<FileIndexEntry>> {
        let query = Query::new(format!(
            "MATCH (f:CodegraphFile) RETURN {FILE_COLUMNS} ORDER BY f.path"
        ));
        self.fetch_file_entries(query).await
    }
}
