//! End-to-end extraction tests across the grammar adapters

use codegraph_core::entities::{Edge, EdgeKind, ExtractionRecord, Language, SymbolKind, SymbolNode};
use codegraph_core::signature::SignaturePattern;
use codegraph_languages::{ParserManager, ParserOptions};
use pretty_assertions::assert_eq;

fn extract(path: &str, source: &str) -> ExtractionRecord {
    ParserManager::default()
        .extract(path, source, None)
        .expect("extraction should succeed")
}

fn node<'a>(record: &'a ExtractionRecord, qualified_name: &str) -> &'a SymbolNode {
    record
        .nodes
        .iter()
        .find(|n| n.qualified_name == qualified_name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = record.nodes.iter().map(|n| n.qualified_name.as_str()).collect();
            panic!("no node {qualified_name}; have {names:?}")
        })
}

fn edges_of<'a>(record: &'a ExtractionRecord, kind: EdgeKind, target: &str) -> Vec<&'a Edge> {
    record
        .edges
        .iter()
        .filter(|e| e.kind == kind && e.target.name == target)
        .collect()
}

#[test]
fn test_python_call_to_undefined_function_stays_unresolved() {
    let record = extract("b.py", "def bar():\n    foo()\n");

    let bar = node(&record, "b.bar");
    assert_eq!(bar.kind, SymbolKind::Function);

    let calls = edges_of(&record, EdgeKind::Calls, "foo");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].source, bar.id);
    assert!(!calls[0].is_resolved());
    assert_eq!(calls[0].site.start_line, 2);
}

#[test]
fn test_python_signature_matches_structural_pattern() {
    let record = extract(
        "worker.py",
        "def process(count: int, label: String):\n    pass\n",
    );
    let process = node(&record, "worker.process");
    let signature = process.signature.as_deref().expect("signature");
    assert_eq!(signature, "process(count: int, label: String)");

    let matches = |pattern: &str| {
        pattern
            .parse::<SignaturePattern>()
            .expect("pattern")
            .matches_signature(signature)
    };
    assert!(matches("process(int, String)"));
    assert!(!matches("process(String, int)"));
    assert!(!matches("process(int)"));
}

#[test]
fn test_python_classes_methods_and_overrides() {
    let source = r#""""Shapes module."""

class Shape:
    """Base shape."""
    sides = 0

    def area(self) -> float:
        return 0.0


class Square(Shape):
    def area(self) -> float:
        return self.side * self.side

    def describe(self, label: str) -> str:
        return label + str(self.area())
"#;
    let record = extract("geometry/shapes.py", source);
    assert!(record.failure.is_none());

    let module = node(&record, "geometry.shapes");
    assert_eq!(module.kind, SymbolKind::Module);
    assert_eq!(module.docstring.as_deref(), Some("Shapes module."));

    let shape = node(&record, "geometry.shapes.Shape");
    assert_eq!(shape.kind, SymbolKind::Type);
    assert_eq!(shape.docstring.as_deref(), Some("Base shape."));
    assert_eq!(node(&record, "geometry.shapes.Shape.sides").kind, SymbolKind::Field);

    let base_area = node(&record, "geometry.shapes.Shape.area");
    assert_eq!(base_area.kind, SymbolKind::Method);
    assert_eq!(base_area.signature.as_deref(), Some("area() -> float"));

    let describe = node(&record, "geometry.shapes.Square.describe");
    assert_eq!(describe.signature.as_deref(), Some("describe(label: str) -> str"));

    let square = node(&record, "geometry.shapes.Square");
    let inherits = edges_of(&record, EdgeKind::Inherits, "Shape");
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].source, square.id);
    assert_eq!(inherits[0].target_id(), Some(&shape.id));

    let square_area = node(&record, "geometry.shapes.Square.area");
    let overrides = edges_of(&record, EdgeKind::Overrides, "area");
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0].source, square_area.id);
    assert_eq!(overrides[0].target_id(), Some(&base_area.id));

    // `self.area()` is ambiguous within the file: both methods are recorded
    let mut area_calls: Vec<_> = edges_of(&record, EdgeKind::Calls, "area")
        .into_iter()
        .map(|e| (e.ordinal, e.target_id().cloned()))
        .collect();
    area_calls.sort();
    assert_eq!(
        area_calls,
        vec![
            (0, Some(base_area.id.clone())),
            (1, Some(square_area.id.clone()))
        ]
    );
}

#[test]
fn test_rust_traits_impls_and_overrides() {
    let source = r#"//! Billing primitives.

/// Something that can be charged.
pub trait Billable {
    fn total(&self) -> u64;
}

pub struct Invoice {
    pub lines: Vec<Line>,
}

pub struct Line {
    pub amount: u64,
}

impl Billable for Invoice {
    fn total(&self) -> u64 {
        self.lines.iter().map(|l| l.amount).sum()
    }
}

impl Invoice {
    pub fn add(&mut self, line: Line) {
        self.lines.push(line);
        audit(self.total());
    }
}

fn audit(amount: u64) {}
"#;
    let record = extract("src/billing.rs", source);
    assert!(record.failure.is_none());
    assert_eq!(record.language, Language::Rust);

    assert_eq!(
        node(&record, "billing").docstring.as_deref(),
        Some("Billing primitives.")
    );

    let billable = node(&record, "billing::Billable");
    assert_eq!(billable.kind, SymbolKind::Interface);
    assert_eq!(
        billable.docstring.as_deref(),
        Some("Something that can be charged.")
    );

    let trait_total = node(&record, "billing::Billable::total");
    assert_eq!(trait_total.kind, SymbolKind::Method);
    assert_eq!(trait_total.signature.as_deref(), Some("total() -> u64"));

    let invoice = node(&record, "billing::Invoice");
    let impl_total = node(&record, "billing::Invoice::total");
    assert_eq!(impl_total.kind, SymbolKind::Method);
    assert_eq!(node(&record, "billing::Invoice::lines").kind, SymbolKind::Field);

    let add = node(&record, "billing::Invoice::add");
    assert_eq!(add.signature.as_deref(), Some("add(line: Line)"));

    let audit = node(&record, "billing::audit");
    assert_eq!(audit.kind, SymbolKind::Function);
    assert_eq!(audit.signature.as_deref(), Some("audit(amount: u64)"));

    let implements = edges_of(&record, EdgeKind::Implements, "Billable");
    assert_eq!(implements.len(), 1);
    assert_eq!(implements[0].source, invoice.id);
    assert_eq!(implements[0].target_id(), Some(&billable.id));

    let overrides = edges_of(&record, EdgeKind::Overrides, "total");
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0].source, impl_total.id);
    assert_eq!(overrides[0].target_id(), Some(&trait_total.id));

    let audit_calls = edges_of(&record, EdgeKind::Calls, "audit");
    assert_eq!(audit_calls.len(), 1);
    assert_eq!(audit_calls[0].source, add.id);
    assert_eq!(audit_calls[0].target_id(), Some(&audit.id));

    let line = node(&record, "billing::Line");
    let line_refs = edges_of(&record, EdgeKind::References, "Line");
    assert!(line_refs
        .iter()
        .any(|e| e.source == add.id && e.target_id() == Some(&line.id)));

    // Method calls on std types never resolve in-file
    let push = edges_of(&record, EdgeKind::Calls, "push");
    assert_eq!(push.len(), 1);
    assert!(!push[0].is_resolved());
}

#[test]
fn test_typescript_interfaces_and_arrow_functions() {
    let source = r#"/** Persists orders. */
export interface Repository {
  save(order: Order): Promise<void>;
}

export class Order {
  id: string;
}

export class SqlRepository implements Repository {
  save(order: Order): Promise<void> {
    return persist(order);
  }
}

export const persist = async (order: Order): Promise<void> => {
  log(order.id);
};
"#;
    let record = extract("src/store.ts", source);
    assert!(record.failure.is_none());

    let repository = node(&record, "store.Repository");
    assert_eq!(repository.kind, SymbolKind::Interface);
    assert_eq!(repository.docstring.as_deref(), Some("Persists orders."));

    let interface_save = node(&record, "store.Repository.save");
    assert_eq!(interface_save.kind, SymbolKind::Method);
    assert_eq!(
        interface_save.signature.as_deref(),
        Some("save(order: Order) -> Promise<void>")
    );

    assert_eq!(node(&record, "store.Order.id").kind, SymbolKind::Field);

    let persist = node(&record, "store.persist");
    assert_eq!(persist.kind, SymbolKind::Function);
    assert_eq!(
        persist.signature.as_deref(),
        Some("persist(order: Order) -> Promise<void>")
    );

    let sql = node(&record, "store.SqlRepository");
    let implements = edges_of(&record, EdgeKind::Implements, "Repository");
    assert_eq!(implements.len(), 1);
    assert_eq!(implements[0].source, sql.id);
    assert_eq!(implements[0].target_id(), Some(&repository.id));

    let class_save = node(&record, "store.SqlRepository.save");
    let overrides = edges_of(&record, EdgeKind::Overrides, "save");
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0].source, class_save.id);
    assert_eq!(overrides[0].target_id(), Some(&interface_save.id));

    let persist_calls = edges_of(&record, EdgeKind::Calls, "persist");
    assert_eq!(persist_calls.len(), 1);
    assert_eq!(persist_calls[0].source, class_save.id);
    assert_eq!(persist_calls[0].target_id(), Some(&persist.id));

    let log_calls = edges_of(&record, EdgeKind::Calls, "log");
    assert_eq!(log_calls.len(), 1);
    assert_eq!(log_calls[0].source, persist.id);
    assert!(!log_calls[0].is_resolved());

    let order = node(&record, "store.Order");
    assert!(edges_of(&record, EdgeKind::References, "Order")
        .iter()
        .all(|e| e.target_id() == Some(&order.id)));
}

#[test]
fn test_javascript_classes_imports_and_constructors() {
    let source = r#"import { helper } from './util';

class Base {
  run() {}
}

class Worker extends Base {
  run() {
    helper();
    this.stop();
  }
  stop() {}
}

const start = () => new Worker();
"#;
    let record = extract("src/worker.js", source);
    assert_eq!(record.language, Language::JavaScript);

    let module = node(&record, "worker");
    let imports = edges_of(&record, EdgeKind::Imports, "helper");
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].source, module.id);
    assert!(!imports[0].is_resolved());

    let base_run = node(&record, "worker.Base.run");
    let worker_run = node(&record, "worker.Worker.run");
    let overrides = edges_of(&record, EdgeKind::Overrides, "run");
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0].source, worker_run.id);
    assert_eq!(overrides[0].target_id(), Some(&base_run.id));

    let stop = node(&record, "worker.Worker.stop");
    let stop_calls = edges_of(&record, EdgeKind::Calls, "stop");
    assert_eq!(stop_calls.len(), 1);
    assert_eq!(stop_calls[0].target_id(), Some(&stop.id));

    let worker = node(&record, "worker.Worker");
    let start = node(&record, "worker.start");
    let constructs = edges_of(&record, EdgeKind::Calls, "Worker");
    assert_eq!(constructs.len(), 1);
    assert_eq!(constructs[0].source, start.id);
    assert_eq!(constructs[0].target_id(), Some(&worker.id));
}

#[test]
fn test_go_methods_interfaces_and_imports() {
    let source = r#"// Package store persists things.
package store

import "fmt"

// Store keeps items.
type Store struct {
	items map[string]int
}

type Reader interface {
	Get(key string) (int, bool)
}

func (s *Store) Get(key string) (int, bool) {
	v, ok := s.items[key]
	return v, ok
}

func NewStore() *Store {
	fmt.Println("new store")
	return &Store{}
}
"#;
    let record = extract("store/store.go", source);
    assert!(record.failure.is_none());

    assert_eq!(
        node(&record, "store.store").docstring.as_deref(),
        Some("Package store persists things.")
    );

    let store = node(&record, "store.store.Store");
    assert_eq!(store.kind, SymbolKind::Type);
    assert_eq!(store.docstring.as_deref(), Some("Store keeps items."));
    assert_eq!(node(&record, "store.store.Store.items").kind, SymbolKind::Field);

    assert_eq!(node(&record, "store.store.Reader").kind, SymbolKind::Interface);
    assert_eq!(node(&record, "store.store.Reader.Get").kind, SymbolKind::Method);

    let get = node(&record, "store.store.Store.Get");
    assert_eq!(get.kind, SymbolKind::Method);
    assert_eq!(get.signature.as_deref(), Some("Get(key: string) -> (int, bool)"));

    let new_store = node(&record, "store.store.NewStore");
    assert_eq!(new_store.signature.as_deref(), Some("NewStore() -> *Store"));

    assert_eq!(edges_of(&record, EdgeKind::Imports, "fmt").len(), 1);
    let println = edges_of(&record, EdgeKind::Calls, "Println");
    assert_eq!(println.len(), 1);
    assert_eq!(println[0].source, new_store.id);
}

#[test]
fn test_syntax_error_yields_partial_record() {
    let source = "def ok():\n    return 1\n\n\ndef broken(:\n    pass\n";
    let record = extract("partial.py", source);

    let failure = record.failure.as_ref().expect("failure flag");
    assert_eq!(failure.message, "syntax error");
    assert!(record.is_partial());
    node(&record, "partial.ok");
}

#[test]
fn test_identities_are_stable_across_extractions() {
    let source = "def helper(x):\n    return x\n\ndef main():\n    helper(1)\n";
    let first = extract("pkg/app.py", source);
    let second = extract("pkg/app.py", source);

    assert_eq!(first.node_ids(), second.node_ids());
    assert_eq!(first.edge_ids(), second.edge_ids());

    // Same content in another file yields different identities
    let elsewhere = extract("pkg/other.py", source);
    assert!(first.node_ids().is_disjoint(&elsewhere.node_ids()));
}

#[test]
fn test_degraded_and_unsupported_languages() {
    let manager = ParserManager::default();

    let java = manager
        .extract("src/Main.java", "public class Main {\n}\n", None)
        .expect("degraded extraction");
    assert!(java.degraded);
    assert_eq!(java.nodes.len(), 1);
    assert_eq!(java.nodes[0].kind, SymbolKind::Type);

    assert!(manager.extract("notes.txt", "hello", None).is_err());

    let explicit = manager
        .extract("script.xyz", "def run\nend\n", Some(Language::Unknown))
        .expect("explicit unknown language goes degraded");
    assert_eq!(explicit.nodes[0].name, "run");

    let strict = ParserManager::new(ParserOptions {
        include_degraded: false,
        ..ParserOptions::default()
    });
    assert!(strict.extract("src/Main.java", "public class Main {}", None).is_err());
    assert!(!strict.supports(Language::Java));
    assert!(strict.supports(Language::Go));
}

#[test]
fn test_language_override_beats_extension() {
    let record = ParserManager::default()
        .extract("scripts/build", "def build():\n    pass\n", Some(Language::Python))
        .expect("explicit language");
    assert_eq!(record.language, Language::Python);
    node(&record, "scripts.build.build");
}

#[test]
fn test_max_candidates_caps_ambiguous_edges() {
    let source = "class A:\n    def save(self):\n        pass\n\nclass B:\n    def save(self):\n        pass\n\nclass C:\n    def save(self):\n        pass\n\ndef run(x):\n    x.save()\n";
    let manager = ParserManager::new(ParserOptions {
        max_candidates: 2,
        ..ParserOptions::default()
    });
    let record = manager.extract("repo.py", source, None).expect("extract");
    let saves = edges_of(&record, EdgeKind::Calls, "save");
    assert_eq!(saves.len(), 2);
    assert!(saves.iter().all(|e| e.is_resolved()));
    assert_ne!(saves[0].id, saves[1].id);
}
