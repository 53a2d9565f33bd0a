use crate::error::StorageError;
use crate::{VectorHit, VectorStore};
use async_trait::async_trait;
use codegraph_core::entities::{EmbeddingPayload, EmbeddingRecord, NodeId};
use codegraph_core::error::Result;
use codegraph_core::StorageConfig;
use qdrant_client::qdrant::{
    value::Kind, CreateCollection, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    GetPointsBuilder, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParams, VectorParamsBuilder, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Payload key holding the symbol identity
const NODE_ID_KEY: &str = "node_id";

fn qdrant_error(context: &str, err: QdrantError) -> StorageError {
    match &err {
        QdrantError::ResponseError { status }
            if matches!(
                status.code(),
                tonic::Code::Unavailable | tonic::Code::DeadlineExceeded
            ) =>
        {
            StorageError::ConnectionFailed(format!("{context}: {err}"))
        }
        _ => StorageError::BackendError(format!("{context}: {err}")),
    }
}

/// Qdrant point ids must be integers or UUIDs; symbol ids map onto UUIDv5
fn point_id(id: &NodeId) -> PointId {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_str().as_bytes())
        .to_string()
        .into()
}

fn record_payload(record: &EmbeddingRecord) -> std::result::Result<Payload, StorageError> {
    let mut map = match serde_json::to_value(&record.payload)? {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    map.insert(NODE_ID_KEY.to_string(), json!(record.node_id.as_str()));
    Ok(Payload::from(map))
}

fn qdrant_value_to_json(value: &QdrantValue) -> serde_json::Value {
    match &value.kind {
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => json!(*i),
        Some(Kind::DoubleValue(d)) => json!(*d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
                .collect(),
        ),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

/// Split a stored payload into the symbol identity and its metadata
fn decode_payload(
    payload: &HashMap<String, QdrantValue>,
) -> std::result::Result<(NodeId, EmbeddingPayload), StorageError> {
    let map: serde_json::Map<String, serde_json::Value> = payload
        .iter()
        .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
        .collect();
    let node_id = map
        .get(NODE_ID_KEY)
        .and_then(|v| v.as_str())
        .map(NodeId::new)
        .ok_or_else(|| StorageError::SerializationError("point without node_id".to_string()))?;
    let payload = serde_json::from_value(serde_json::Value::Object(map))?;
    Ok((node_id, payload))
}

/// Vector store backed by a Qdrant collection
pub struct QdrantVectorStore {
    client: Arc<Qdrant>,
    collection_name: String,
    dimension: usize,
}

impl QdrantVectorStore {
    /// Connect and create the collection when it does not exist yet
    pub async fn connect(config: &StorageConfig, dimension: usize) -> Result<Self> {
        info!("Connecting to Qdrant at {}", config.qdrant_url);

        let client = Qdrant::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| StorageError::InvalidConfig(format!("Invalid Qdrant URL: {e}")))?;

        let store = Self {
            client: Arc::new(client),
            collection_name: config.collection_name.clone(),
            dimension,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .list_collections()
            .await
            .map_err(|e| qdrant_error("Failed to list collections", e))?
            .collections
            .iter()
            .any(|c| c.name == self.collection_name);

        if exists {
            let info = self
                .client
                .collection_info(&self.collection_name)
                .await
                .map_err(|e| qdrant_error("Failed to get collection info", e))?;
            let current = info
                .result
                .and_then(|r| r.config)
                .and_then(|c| c.params)
                .and_then(|p| p.vectors_config)
                .and_then(|v| v.config)
                .and_then(|config| match config {
                    qdrant_client::qdrant::vectors_config::Config::Params(p) => Some(p.size),
                    _ => None,
                });
            if let Some(size) = current {
                if size as usize != self.dimension {
                    return Err(StorageError::InvalidDimensions {
                        expected: self.dimension,
                        actual: size as usize,
                    }
                    .into());
                }
            }
            return Ok(());
        }

        self.client
            .create_collection(CreateCollection::from(
                CreateCollectionBuilder::new(&self.collection_name).vectors_config(
                    VectorsConfig::from(VectorParams::from(VectorParamsBuilder::new(
                        self.dimension as u64,
                        Distance::Cosine,
                    ))),
                ),
            ))
            .await
            .map_err(|e| qdrant_error("Failed to create collection", e))?;
        info!(
            collection = %self.collection_name,
            dimension = self.dimension,
            "Created Qdrant collection"
        );
        Ok(())
    }

    fn check_dimension(&self, actual: usize) -> std::result::Result<(), StorageError> {
        if actual != self.dimension {
            return Err(StorageError::InvalidDimensions {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut points = Vec::with_capacity(records.len());
        for record in &records {
            self.check_dimension(record.vector.len())?;
            points.push(PointStruct::new(
                point_id(&record.node_id),
                record.vector.clone(),
                record_payload(record)?,
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await
            .map_err(|e| qdrant_error("Failed to upsert vectors", e))?;
        debug!(count = records.len(), "Upserted vectors");
        Ok(())
    }

    async fn delete(&self, ids: &[NodeId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let points = PointsIdsList {
            ids: ids.iter().map(point_id).collect(),
        };
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(points)
                    .wait(true),
            )
            .await
            .map_err(|e| qdrant_error("Failed to delete vectors", e))?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        self.check_dimension(vector.len())?;
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, vector.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| qdrant_error("Search failed", e))?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let (node_id, payload) = decode_payload(&point.payload)?;
            hits.push(VectorHit {
                node_id,
                score: point.score,
                payload,
            });
        }
        Ok(hits)
    }

    async fn text_hashes(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    &self.collection_name,
                    ids.iter().map(point_id).collect::<Vec<_>>(),
                )
                .with_payload(true),
            )
            .await
            .map_err(|e| qdrant_error("Failed to fetch vectors", e))?;

        let mut hashes = HashMap::new();
        for point in response.result {
            let (node_id, payload) = decode_payload(&point.payload)?;
            hashes.insert(node_id, payload.text_hash);
        }
        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::entities::SymbolKind;

    #[test]
    fn test_point_ids_are_stable_uuids() {
        let id = NodeId::new("sym-00112233445566778899aabbccddeeff");
        assert_eq!(point_id(&id), point_id(&id));
        assert_ne!(point_id(&id), point_id(&NodeId::new("sym-other")));
    }

    #[test]
    fn test_payload_round_trips_through_qdrant_values() {
        let record = EmbeddingRecord {
            node_id: NodeId::new("sym-1"),
            vector: vec![0.0; 4],
            payload: EmbeddingPayload {
                name: "process".to_string(),
                qualified_name: "orders.process".to_string(),
                kind: SymbolKind::Function,
                file: "orders.py".to_string(),
                signature: Some("process(count: int)".to_string()),
                text_hash: "abc".to_string(),
            },
        };
        let payload: HashMap<String, QdrantValue> = record_payload(&record).unwrap().into();
        let (node_id, decoded) = decode_payload(&payload).unwrap();
        assert_eq!(node_id, record.node_id);
        assert_eq!(decoded, record.payload);
    }
}
