//! End-to-end import flows against the in-memory store.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use cyberkg_core::PropertyMap;
use cyberkg_graph::client::Result as GraphResult;
use cyberkg_graph::store::EdgeBatch;
use cyberkg_graph::{
    EdgeBatchOutcome, GraphStore, MemoryGraphStore, NodeRecord, Pattern, PatternRow, TypeCatalog,
};
use cyberkg_import::{BundleImporter, ImportConfig, ImportError};

fn technique(id: &str, phases: &[&str]) -> Value {
    let phases: Vec<Value> = phases
        .iter()
        .map(|p| json!({"kill_chain_name": "mitre-attack", "phase_name": p}))
        .collect();
    json!({
        "type": "attack-pattern",
        "id": id,
        "name": format!("Technique {id}"),
        "description": "A long description of how the technique works.",
        "external_references": [{"external_id": id, "url": format!("https://example.test/{id}")}],
        "kill_chain_phases": phases,
        "created": "2021-01-01T00:00:00Z",
        "modified": "2022-01-01T00:00:00Z"
    })
}

fn tactic(id: &str, shortname: &str) -> Value {
    json!({
        "type": "x-mitre-tactic",
        "id": id,
        "name": format!("Tactic {id}"),
        "description": "Why the adversary acts.",
        "x_mitre_shortname": shortname
    })
}

fn write_bundle(objects: Vec<Value>) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let bundle = json!({"type": "bundle", "id": "bundle--test", "objects": objects});
    file.write_all(bundle.to_string().as_bytes()).unwrap();
    file
}

fn scenario_one() -> NamedTempFile {
    write_bundle(vec![
        technique("T1", &["exec"]),
        technique("T2", &[]),
        tactic("TA1", "exec"),
        json!({"type": "relationship", "id": "relationship--1"}),
    ])
}

#[tokio::test]
async fn test_technique_links_to_matching_tactic() {
    let store = Arc::new(MemoryGraphStore::new());
    let importer = BundleImporter::new(Arc::clone(&store), ImportConfig::default());
    let file = scenario_one();

    let report = importer.import_core(file.path()).await.unwrap();
    assert_eq!(report.techniques, 2);
    assert_eq!(report.tactics, 1);
    assert_eq!(report.ignored_objects, 1);
    assert_eq!(report.edges_requested, 1);
    assert_eq!(report.edges_created, 1);
    assert_eq!(report.edges_skipped, 0);

    let rows = store
        .run_pattern(&Pattern::Triples {
            labels: vec![],
            limit: 100,
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source.key(), "T1");
    assert_eq!(rows[0].target.as_ref().map(|t| t.key()), Some("TA1".to_string()));

    let t1 = store.find_by_business_id("T1").await.unwrap().unwrap();
    assert_eq!(t1.str_property("external_id"), "T1");
    assert_eq!(t1.primary_label(), "Technique");
    let ta1 = store.find_by_business_id("TA1").await.unwrap().unwrap();
    assert_eq!(ta1.str_property("shortname"), "exec");
}

#[tokio::test]
async fn test_large_bundle_is_batched() {
    let objects: Vec<Value> = (0..250).map(|i| technique(&format!("T{i}"), &[])).collect();
    let file = write_bundle(objects);
    let store = Arc::new(MemoryGraphStore::new());
    let importer = BundleImporter::new(Arc::clone(&store), ImportConfig::default());

    let report = importer.import_core(file.path()).await.unwrap();
    assert_eq!(report.technique_batches, 3);
    assert_eq!(report.tactic_batches, 0);

    let mut sizes: Vec<usize> = store
        .batch_log()
        .into_iter()
        .filter(|b| b.label == "Technique")
        .map(|b| b.size)
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![50, 100, 100]);
    assert_eq!(store.count_nodes(Some("Technique")).await.unwrap(), 250);
}

#[tokio::test]
async fn test_reimport_after_clear_is_identical() {
    let store = Arc::new(MemoryGraphStore::new());
    let importer = BundleImporter::new(Arc::clone(&store), ImportConfig::default());
    let file = scenario_one();

    importer.clear_and_import(file.path()).await.unwrap();
    let first = importer.verify().await.unwrap();
    importer.clear_and_import(file.path()).await.unwrap();
    let second = importer.verify().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.techniques, 2);
    assert_eq!(second.tactics, 1);
    assert_eq!(second.belongs_to, 1);
}

#[tokio::test]
async fn test_refuses_non_empty_store() {
    let store = Arc::new(MemoryGraphStore::new());
    let importer = BundleImporter::new(Arc::clone(&store), ImportConfig::default());
    let file = scenario_one();

    importer.import_core(file.path()).await.unwrap();
    let err = importer.import_core(file.path()).await.unwrap_err();
    assert!(matches!(err, ImportError::StoreNotEmpty { nodes: 3 }));

    let lenient = BundleImporter::new(
        Arc::clone(&store),
        ImportConfig {
            require_empty_store: false,
            ..Default::default()
        },
    );
    lenient.import_core(file.path()).await.unwrap();
    assert_eq!(store.count_nodes(None).await.unwrap(), 6);
}

#[tokio::test]
async fn test_descriptions_truncate_only_when_configured() {
    let file = scenario_one();

    let store = Arc::new(MemoryGraphStore::new());
    BundleImporter::new(Arc::clone(&store), ImportConfig::default())
        .import_core(file.path())
        .await
        .unwrap();
    let full = store.find_by_business_id("T1").await.unwrap().unwrap();
    assert_eq!(
        full.str_property("description"),
        "A long description of how the technique works."
    );

    let store = Arc::new(MemoryGraphStore::new());
    let config = ImportConfig {
        max_text_len: Some(6),
        ..Default::default()
    };
    BundleImporter::new(Arc::clone(&store), config)
        .import_core(file.path())
        .await
        .unwrap();
    let short = store.find_by_business_id("T1").await.unwrap().unwrap();
    assert_eq!(short.str_property("description"), "A long");
}

#[tokio::test]
async fn test_failed_batch_aborts_before_edges() {
    let store = Arc::new(MemoryGraphStore::failing_on_label("Tactic"));
    let importer = BundleImporter::new(Arc::clone(&store), ImportConfig::default());
    let file = scenario_one();

    let err = importer.import_core(file.path()).await.unwrap_err();
    match err {
        ImportError::BatchFailed { label, batch, .. } => {
            assert_eq!(label, "Tactic");
            assert_eq!(batch, 0);
        }
        other => panic!("expected BatchFailed, got {other:?}"),
    }
    // Technique batches already committed stay committed.
    assert_eq!(store.count_nodes(Some("Technique")).await.unwrap(), 2);
    assert_eq!(store.count_edges(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_bundle_is_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{\"objects\": [").unwrap();
    let importer = BundleImporter::new(Arc::new(MemoryGraphStore::new()), ImportConfig::default());
    let err = importer.import_core(file.path()).await.unwrap_err();
    assert!(matches!(err, ImportError::Parse(_)));
}

#[tokio::test]
async fn test_missing_bundle_is_io_error() {
    let importer = BundleImporter::new(Arc::new(MemoryGraphStore::new()), ImportConfig::default());
    let err = importer
        .import_core(std::path::Path::new("/nonexistent/bundle.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Io(_)));
}

// ── Unresolved endpoints ─────────────────────────────────────────

/// Acknowledges every node write but never stores technique rows whose id
/// starts with `lost-`.
struct LossyStore {
    inner: MemoryGraphStore,
}

#[async_trait]
impl GraphStore for LossyStore {
    async fn clear(&self) -> GraphResult<u64> {
        self.inner.clear().await
    }

    async fn create_nodes_batch(&self, label: &str, rows: &[PropertyMap]) -> GraphResult<usize> {
        let kept: Vec<PropertyMap> = rows
            .iter()
            .filter(|r| {
                !r.get("id")
                    .and_then(|v| v.as_str())
                    .is_some_and(|id| id.starts_with("lost-"))
            })
            .cloned()
            .collect();
        self.inner.create_nodes_batch(label, &kept).await?;
        Ok(rows.len())
    }

    async fn create_edges_batch(&self, batch: &EdgeBatch) -> GraphResult<EdgeBatchOutcome> {
        self.inner.create_edges_batch(batch).await
    }

    async fn run_pattern(&self, pattern: &Pattern) -> GraphResult<Vec<PatternRow>> {
        self.inner.run_pattern(pattern).await
    }

    async fn find_by_business_id(&self, id: &str) -> GraphResult<Option<NodeRecord>> {
        self.inner.find_by_business_id(id).await
    }

    async fn get_node(&self, internal_id: i64) -> GraphResult<Option<NodeRecord>> {
        self.inner.get_node(internal_id).await
    }

    async fn update_node_properties(&self, id: i64, patch: &PropertyMap) -> GraphResult<()> {
        self.inner.update_node_properties(id, patch).await
    }

    async fn swap_node_label(&self, id: i64, current: &[String], new: &str) -> GraphResult<()> {
        self.inner.swap_node_label(id, current, new).await
    }

    async fn delete_node(&self, internal_id: i64) -> GraphResult<bool> {
        self.inner.delete_node(internal_id).await
    }

    async fn catalog_types(&self) -> GraphResult<TypeCatalog> {
        self.inner.catalog_types().await
    }

    async fn scan_types(&self) -> GraphResult<TypeCatalog> {
        self.inner.scan_types().await
    }

    async fn count_nodes(&self, label: Option<&str>) -> GraphResult<i64> {
        self.inner.count_nodes(label).await
    }

    async fn count_edges(&self, rel_type: Option<&str>) -> GraphResult<i64> {
        self.inner.count_edges(rel_type).await
    }
}

#[tokio::test]
async fn test_unresolved_endpoints_are_skipped_and_counted() {
    let store = Arc::new(LossyStore {
        inner: MemoryGraphStore::new(),
    });
    let importer = BundleImporter::new(Arc::clone(&store), ImportConfig::default());
    let file = write_bundle(vec![
        technique("T1", &["exec"]),
        technique("lost-T2", &["exec"]),
        tactic("TA1", "exec"),
    ]);

    let report = importer.import_core(file.path()).await.unwrap();
    assert_eq!(report.edges_requested, 2);
    assert_eq!(report.edges_created, 1);
    assert_eq!(report.edges_skipped, 1);
    assert_eq!(store.count_edges(Some("BELONGS_TO")).await.unwrap(), 1);

    let lost = store.find_by_business_id("lost-T2").await.unwrap();
    assert!(lost.is_none());
}

#[tokio::test]
async fn test_shared_ids_do_not_hide_skipped_pairs() {
    let store = Arc::new(LossyStore {
        inner: MemoryGraphStore::new(),
    });
    let config = ImportConfig {
        require_empty_store: false,
        ..Default::default()
    };
    let importer = BundleImporter::new(Arc::clone(&store), config);
    let file = write_bundle(vec![
        technique("T1", &["exec"]),
        technique("lost-T2", &["exec"]),
        tactic("TA1", "exec"),
    ]);

    importer.import_core(file.path()).await.unwrap();
    let second = importer.import_core(file.path()).await.unwrap();

    // Two T1 nodes and two TA1 nodes now exist.
    assert_eq!(second.edges_requested, 2);
    assert_eq!(second.edges_created, 4);
    assert_eq!(second.edges_skipped, 1);
}
