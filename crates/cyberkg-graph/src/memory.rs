//! In-process `GraphStore` used by tests and `--dry-run`.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use cyberkg_core::types::ID_PROPERTY;
use cyberkg_core::{EdgeType, PropertyMap};

use crate::client::{GraphError, Result};
use crate::mutations::checked_identifier;
use crate::store::{
    EdgeBatch, EdgeBatchOutcome, GraphStore, NodeRecord, Pattern, PatternRow, RelationRecord,
    TypeCatalog,
};

/// One acknowledged node batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLog {
    pub label: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
struct StoredEdge {
    internal_id: i64,
    rel_type: String,
    source: i64,
    target: i64,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    nodes: Vec<NodeRecord>,
    edges: Vec<StoredEdge>,
    batches: Vec<BatchLog>,
}

impl State {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node(&self, iid: i64) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.internal_id == iid)
    }

    fn business_id(node: &NodeRecord) -> Option<&str> {
        node.properties.get(ID_PROPERTY).and_then(|v| v.as_str())
    }

    /// String ids match first; a numeric `id` property matches its decimal
    /// form.
    fn find_by_id(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes
            .iter()
            .find(|n| Self::business_id(n) == Some(id))
            .or_else(|| {
                self.nodes.iter().find(|n| match n.properties.get(ID_PROPERTY) {
                    Some(Value::Number(num)) => num.to_string() == id,
                    _ => false,
                })
            })
    }

    fn matching(&self, label: &str, id: &str) -> Vec<i64> {
        self.nodes
            .iter()
            .filter(|n| n.labels.iter().any(|l| l == label) && Self::business_id(n) == Some(id))
            .map(|n| n.internal_id)
            .collect()
    }
}

/// A graph held in memory behind a mutex.
///
/// Insertion order is preserved for nodes and edges, so pattern results
/// are deterministic.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    state: Mutex<State>,
    catalog_disabled: bool,
    failing_label: Option<String>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose catalog always comes back empty, forcing callers onto
    /// the scan path.
    pub fn without_catalog() -> Self {
        Self {
            catalog_disabled: true,
            ..Self::default()
        }
    }

    /// A store that rejects any write adding `label` to a node.
    pub fn failing_on_label(label: impl Into<String>) -> Self {
        Self {
            failing_label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Node batches acknowledged so far, in completion order.
    pub fn batch_log(&self) -> Vec<BatchLog> {
        self.state.lock().batches.clone()
    }

    /// Insert a node directly. Returns its internal id.
    pub fn insert_node(&self, labels: &[&str], properties: PropertyMap) -> i64 {
        let mut state = self.state.lock();
        let iid = state.allocate();
        state.nodes.push(NodeRecord {
            internal_id: iid,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties,
        });
        iid
    }

    /// Insert an edge between two nodes addressed by business id.
    /// Returns false when either end is missing.
    pub fn insert_edge(&self, source_id: &str, rel_type: EdgeType, target_id: &str) -> bool {
        let mut state = self.state.lock();
        let ends = (
            state.find_by_id(source_id).map(|n| n.internal_id),
            state.find_by_id(target_id).map(|n| n.internal_id),
        );
        let (Some(source), Some(target)) = ends else {
            return false;
        };
        let iid = state.allocate();
        state.edges.push(StoredEdge {
            internal_id: iid,
            rel_type: rel_type.as_cypher().to_string(),
            source,
            target,
        });
        true
    }

    fn check_writable(&self, label: &str) -> Result<()> {
        match &self.failing_label {
            Some(failing) if failing == label => Err(GraphError::Connection(format!(
                "write rejected for label {label}"
            ))),
            _ => Ok(()),
        }
    }

    fn triples(state: &State, labels: &[String], limit: usize) -> Vec<PatternRow> {
        state
            .edges
            .iter()
            .filter_map(|e| {
                let source = state.node(e.source)?;
                if !labels.is_empty() && !source.has_any_label(labels) {
                    return None;
                }
                Some(PatternRow {
                    source: source.clone(),
                    relation: Some(RelationRecord {
                        internal_id: Some(e.internal_id),
                        rel_type: e.rel_type.clone(),
                    }),
                    target: state.node(e.target).cloned(),
                })
            })
            .take(limit)
            .collect()
    }

    fn ancestors(state: &State, target_ids: &[String], rel_types: &[EdgeType]) -> Vec<PatternRow> {
        let types: Vec<&str> = rel_types.iter().map(EdgeType::as_cypher).collect();
        let ordering = |e: &&StoredEdge| types.contains(&e.rel_type.as_str());

        let mut order: Vec<i64> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut queue: VecDeque<i64> = VecDeque::new();
        for id in target_ids {
            if let Some(n) = state.find_by_id(id) {
                if seen.insert(n.internal_id) {
                    order.push(n.internal_id);
                    queue.push_back(n.internal_id);
                }
            }
        }
        while let Some(current) = queue.pop_front() {
            for edge in state.edges.iter().filter(ordering) {
                if edge.target == current && seen.insert(edge.source) {
                    order.push(edge.source);
                    queue.push_back(edge.source);
                }
            }
        }

        let mut rows = Vec::new();
        for iid in order {
            let Some(source) = state.node(iid) else {
                continue;
            };
            let mut emitted = false;
            for edge in state
                .edges
                .iter()
                .filter(ordering)
                .filter(|e| e.source == iid && seen.contains(&e.target))
            {
                rows.push(PatternRow {
                    source: source.clone(),
                    relation: Some(RelationRecord {
                        internal_id: Some(edge.internal_id),
                        rel_type: edge.rel_type.clone(),
                    }),
                    target: state.node(edge.target).cloned(),
                });
                emitted = true;
            }
            if !emitted {
                rows.push(PatternRow {
                    source: source.clone(),
                    relation: None,
                    target: None,
                });
            }
        }
        rows
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn clear(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let removed = state.nodes.len() as u64;
        state.nodes.clear();
        state.edges.clear();
        Ok(removed)
    }

    async fn create_nodes_batch(&self, label: &str, rows: &[PropertyMap]) -> Result<usize> {
        checked_identifier(label)?;
        self.check_writable(label)?;
        let mut state = self.state.lock();
        for row in rows {
            let iid = state.allocate();
            state.nodes.push(NodeRecord {
                internal_id: iid,
                labels: vec![label.to_string()],
                properties: row.clone(),
            });
        }
        state.batches.push(BatchLog {
            label: label.to_string(),
            size: rows.len(),
        });
        Ok(rows.len())
    }

    async fn create_edges_batch(&self, batch: &EdgeBatch) -> Result<EdgeBatchOutcome> {
        let mut state = self.state.lock();
        let mut outcome = EdgeBatchOutcome::default();
        for (source_id, target_id) in &batch.pairs {
            let sources = state.matching(batch.source_label.as_str(), source_id);
            let targets = state.matching(batch.target_label.as_str(), target_id);
            if !sources.is_empty() && !targets.is_empty() {
                outcome.matched_pairs += 1;
            }
            for &source in &sources {
                for &target in &targets {
                    let iid = state.allocate();
                    state.edges.push(StoredEdge {
                        internal_id: iid,
                        rel_type: batch.rel_type.as_cypher().to_string(),
                        source,
                        target,
                    });
                    outcome.created += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn run_pattern(&self, pattern: &Pattern) -> Result<Vec<PatternRow>> {
        let state = self.state.lock();
        Ok(match pattern {
            Pattern::Triples { labels, limit } => Self::triples(&state, labels, *limit),
            Pattern::Ancestors {
                target_ids,
                rel_types,
            } => Self::ancestors(&state, target_ids, rel_types),
        })
    }

    async fn find_by_business_id(&self, id: &str) -> Result<Option<NodeRecord>> {
        Ok(self.state.lock().find_by_id(id).cloned())
    }

    async fn get_node(&self, internal_id: i64) -> Result<Option<NodeRecord>> {
        Ok(self.state.lock().node(internal_id).cloned())
    }

    async fn update_node_properties(&self, internal_id: i64, patch: &PropertyMap) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.iter_mut().find(|n| n.internal_id == internal_id) {
            for (k, v) in patch {
                node.properties.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn swap_node_label(
        &self,
        internal_id: i64,
        current: &[String],
        new_label: &str,
    ) -> Result<()> {
        checked_identifier(new_label)?;
        let mut state = self.state.lock();
        let Some(node) = state.nodes.iter_mut().find(|n| n.internal_id == internal_id) else {
            return Ok(());
        };
        node.labels.retain(|l| !current.contains(l));

        self.check_writable(new_label)
            .map_err(|e| GraphError::LabelSwapIncomplete {
                id: internal_id.to_string(),
                label: new_label.to_string(),
                reason: e.to_string(),
            })?;
        if !node.labels.iter().any(|l| l == new_label) {
            node.labels.push(new_label.to_string());
        }
        Ok(())
    }

    async fn delete_node(&self, internal_id: i64) -> Result<bool> {
        let mut state = self.state.lock();
        let before = state.nodes.len();
        state.nodes.retain(|n| n.internal_id != internal_id);
        if state.nodes.len() == before {
            return Ok(false);
        }
        state
            .edges
            .retain(|e| e.source != internal_id && e.target != internal_id);
        Ok(true)
    }

    async fn catalog_types(&self) -> Result<TypeCatalog> {
        if self.catalog_disabled {
            return Ok(TypeCatalog::default());
        }
        self.scan_types().await
    }

    async fn scan_types(&self) -> Result<TypeCatalog> {
        let state = self.state.lock();
        let mut catalog = TypeCatalog::default();
        for label in state.nodes.iter().flat_map(|n| n.labels.iter()) {
            if !catalog.labels.contains(label) {
                catalog.labels.push(label.clone());
            }
        }
        for edge in &state.edges {
            if !catalog.relationship_types.contains(&edge.rel_type) {
                catalog.relationship_types.push(edge.rel_type.clone());
            }
        }
        Ok(catalog)
    }

    async fn count_nodes(&self, label: Option<&str>) -> Result<i64> {
        let state = self.state.lock();
        let count = match label {
            Some(l) => state
                .nodes
                .iter()
                .filter(|n| n.labels.iter().any(|x| x == l))
                .count(),
            None => state.nodes.len(),
        };
        Ok(count as i64)
    }

    async fn count_edges(&self, rel_type: Option<&str>) -> Result<i64> {
        let state = self.state.lock();
        let count = match rel_type {
            Some(t) => state.edges.iter().filter(|e| e.rel_type == t).count(),
            None => state.edges.len(),
        };
        Ok(count as i64)
    }
}
