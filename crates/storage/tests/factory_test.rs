use codegraph_core::config::StorageConfig;
use codegraph_core::entities::{
    EmbeddingPayload, EmbeddingRecord, Language, NodeId, SourceSpan, SymbolKind, SymbolNode,
};
use codegraph_storage::{create_graph_store, create_vector_store, GraphStore, VectorStore};

#[tokio::test]
async fn test_factory_creates_memory_backends() {
    let config = StorageConfig::default();

    let graph: std::sync::Arc<dyn GraphStore> = create_graph_store(&config).await.unwrap();
    let node = SymbolNode::new(
        SymbolKind::Function,
        "main",
        "main",
        "main.go",
        SourceSpan::lines(3, 5),
        Language::Go,
    );
    graph.upsert_node(node.clone()).await.unwrap();
    assert_eq!(graph.find_by_name("main").await.unwrap(), vec![node]);

    let vectors: std::sync::Arc<dyn VectorStore> = create_vector_store(&config, 2).await.unwrap();
    vectors
        .upsert(vec![EmbeddingRecord {
            node_id: NodeId::new("sym-main"),
            vector: vec![1.0, 0.0],
            payload: EmbeddingPayload {
                name: "main".to_string(),
                qualified_name: "main".to_string(),
                kind: SymbolKind::Function,
                file: "main.go".to_string(),
                signature: Some("main()".to_string()),
                text_hash: "h".to_string(),
            },
        }])
        .await
        .unwrap();
    assert_eq!(vectors.search(&[1.0, 0.0], 10).await.unwrap().len(), 1);
    assert!(vectors.search(&[1.0, 0.0, 0.0], 10).await.is_err());
}

#[tokio::test]
async fn test_factory_rejects_unknown_backends() {
    let config = StorageConfig {
        graph_backend: "sqlite".to_string(),
        vector_backend: "faiss".to_string(),
        ..StorageConfig::default()
    };
    let err = create_graph_store(&config).await.err().unwrap();
    assert!(err.to_string().contains("unknown graph backend 'sqlite'"));
    assert!(create_vector_store(&config, 8).await.is_err());
}
