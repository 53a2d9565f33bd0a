//! Index a small workspace through `CodeGraph` and query it

use codegraph_api_service::{ChangeSet, CodeGraph, Config};
use codegraph_embeddings::{EmbeddingManager, MockEmbeddingProvider};
use codegraph_storage::{InMemoryGraphStore, InMemoryVectorStore};
use codegraph_watcher::FileChange;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: usize = 64;

struct Workspace {
    dir: TempDir,
    vectors: Arc<InMemoryVectorStore>,
    code_graph: CodeGraph,
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.indexer.max_retries = 1;
    config.indexer.retry_initial_backoff_ms = 1;
    config.indexer.retry_max_backoff_ms = 2;
    config.embeddings.provider = "mock".to_string();
    config.embeddings.embedding_dimension = DIMENSION;
    config
}

fn workspace() -> Workspace {
    let graph = Arc::new(InMemoryGraphStore::new());
    let vectors = Arc::new(InMemoryVectorStore::with_dimension(DIMENSION));
    let embeddings = Arc::new(EmbeddingManager::new(
        Arc::new(MockEmbeddingProvider::new(DIMENSION)),
        "mock-64",
    ));
    let code_graph =
        CodeGraph::new(test_config(), graph, vectors.clone(), embeddings).unwrap();
    Workspace {
        dir: TempDir::new().unwrap(),
        vectors,
        code_graph,
    }
}

impl Workspace {
    fn write(&self, path: &str, content: &str) {
        fs::write(self.dir.path().join(path), content).unwrap();
    }

    fn path(&self, path: &str) -> PathBuf {
        self.dir.path().join(path)
    }
}

#[tokio::test]
async fn test_callers_of_foo_then_deletion() {
    let ws = workspace();
    ws.write("a.py", "def foo():\n    return 1\n");
    ws.write("b.py", "from a import foo\n\ndef bar():\n    return foo()\n");
    let report = ws.code_graph.index(ws.dir.path()).await.unwrap();
    assert_eq!(report.files_indexed, 2);

    let callers = ws.code_graph.callers("foo", 1).await.unwrap();
    assert_eq!(callers.names_by_depth(), vec![vec!["bar".to_string()]]);

    fs::remove_file(ws.dir.path().join("b.py")).unwrap();
    let report = ws
        .code_graph
        .reconcile(
            ws.dir.path(),
            ChangeSet::Explicit(vec![FileChange::Deleted(ws.path("b.py"))]),
        )
        .await
        .unwrap();
    assert_eq!(report.files_deleted, 1);

    let callers = ws.code_graph.callers("foo", 1).await.unwrap();
    assert!(callers.levels.is_empty());
    assert!(ws.code_graph.goto("bar").await.unwrap().symbols.is_empty());
    assert_eq!(ws.code_graph.goto("foo").await.unwrap().symbols.len(), 1);
}

#[tokio::test]
async fn test_sig_matches_by_order_and_arity() {
    let ws = workspace();
    ws.write(
        "a.py",
        "def process(count: int, label: String):\n    pass\n",
    );
    ws.write(
        "b.py",
        "def process(label: String, count: int):\n    pass\n",
    );
    ws.write("c.py", "def process(count: int):\n    pass\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let result = ws.code_graph.sig("process(int, String)").await.unwrap();
    let files: Vec<&str> = result.symbols.iter().map(|s| s.file.as_str()).collect();
    assert_eq!(files, vec!["a.py"]);

    let err = ws.code_graph.sig("(int, String)").await.unwrap_err();
    assert_eq!(err.kind_label(), "invalid_input");
}

#[tokio::test]
async fn test_refs_show_pending_references() {
    let ws = workspace();
    ws.write("b.py", "def bar():\n    return foo()\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let refs = ws.code_graph.refs("foo").await.unwrap();
    assert!(refs.targets.is_empty());
    assert_eq!(refs.references.len(), 1);
    assert!(!refs.references[0].is_resolved());
    assert_eq!(
        refs.references[0].source.as_ref().map(|s| s.name.as_str()),
        Some("bar")
    );

    ws.write("a.py", "def foo():\n    return 1\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let refs = ws.code_graph.refs("foo").await.unwrap();
    assert_eq!(refs.targets.len(), 1);
    assert_eq!(refs.references.len(), 1);
    assert!(refs.references[0].is_resolved());
}

#[tokio::test]
async fn test_callers_of_undefined_name_reach_transitive_callers() {
    let ws = workspace();
    ws.write(
        "c.py",
        "def baz():\n    return foo()\n\ndef qux():\n    return baz()\n",
    );
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let callers = ws.code_graph.callers("foo", 2).await.unwrap();
    assert_eq!(
        callers.names_by_depth(),
        vec![vec!["baz".to_string()], vec!["qux".to_string()]]
    );
}

#[tokio::test]
async fn test_callees_see_every_namesake_whatever_the_order() {
    let ws = workspace();
    ws.write("main.py", "def main():\n    return run()\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();
    ws.write("x.py", "def run():\n    return 1\n");
    ws.write("y.py", "def run():\n    return 2\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let callees = ws.code_graph.callees("main", 1).await.unwrap();
    let qualified: Vec<&str> = callees.levels[0]
        .symbols
        .iter()
        .map(|s| s.qualified_name.as_str())
        .collect();
    assert_eq!(qualified, vec!["x.run", "y.run"]);
}

#[tokio::test]
async fn test_graph_queries_work_while_vector_store_is_down() {
    let ws = workspace();
    ws.write("a.py", "def foo():\n    return 1\n");
    ws.write("b.py", "def bar():\n    return foo()\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    ws.vectors.set_available(false);
    let err = ws.code_graph.query("foo", None).await.unwrap_err();
    assert_eq!(err.kind_label(), "store_unavailable");

    assert_eq!(ws.code_graph.goto("foo").await.unwrap().symbols.len(), 1);
    assert_eq!(
        ws.code_graph.callers("foo", 2).await.unwrap().names_by_depth(),
        vec![vec!["bar".to_string()]]
    );
    assert_eq!(
        ws.code_graph.callees("bar", 1).await.unwrap().names_by_depth(),
        vec![vec!["foo".to_string()]]
    );
    assert_eq!(ws.code_graph.refs("foo").await.unwrap().references.len(), 1);
}

#[tokio::test]
async fn test_depth_zero_is_rejected_and_large_depth_clamped() {
    let ws = workspace();
    let chain: String = (0..13)
        .map(|i| format!("def f{i}():\n    return f{}()\n\n", i + 1))
        .collect();
    ws.write("chain.py", &chain);
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let err = ws.code_graph.callees("f0", 0).await.unwrap_err();
    assert_eq!(err.kind_label(), "invalid_input");

    let result = ws.code_graph.callees("f0", 50).await.unwrap();
    assert_eq!(result.levels.len(), 10);
    assert_eq!(result.levels[9].symbols[0].name, "f10");
}

#[tokio::test]
async fn test_semantic_query_finds_indexed_symbol() {
    let ws = workspace();
    ws.write(
        "config.py",
        "def parse_config(path: str):\n    \"\"\"Read the configuration file.\"\"\"\n    return path\n",
    );
    ws.write("net.py", "def send_request(url: str):\n    return url\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let result = ws.code_graph.query("parse config", None).await.unwrap();
    let rank = |name: &str| result.hits.iter().position(|h| h.name == name);
    assert!(rank("parse_config").unwrap() < rank("send_request").unwrap());
    assert_eq!(ws.code_graph.query("parse config", Some(1)).await.unwrap().hits.len(), 1);

    // Retracted symbols never surface, even if their vectors linger
    ws.write("config.py", "def load_settings(path: str):\n    return path\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();
    let result = ws.code_graph.query("parse config", None).await.unwrap();
    assert!(result.hits.iter().all(|h| h.name != "parse_config"));
    assert!(ws.code_graph.goto("load_settings").await.is_ok_and(|r| r.symbols.len() == 1));
}

#[tokio::test]
async fn test_results_serialize_for_collaborators() {
    let ws = workspace();
    ws.write("a.py", "def foo():\n    return 1\n");
    ws.code_graph.index(ws.dir.path()).await.unwrap();

    let goto = ws.code_graph.goto("foo").await.unwrap();
    let json = serde_json::to_value(&goto).unwrap();
    assert_eq!(json["query"], "foo");
    assert_eq!(json["symbols"][0]["kind"], "function");
    assert_eq!(json["symbols"][0]["qualified_name"], "a.foo");
    assert_eq!(json["symbols"][0]["file"], "a.py");
}
