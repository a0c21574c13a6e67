//! The narrow store interface the importer, gateway and path generator depend on.
//!
//! Records returned from a store are plain owned data. Nothing handed back
//! through this trait borrows from a driver session, so callers may keep
//! them after the underlying connection has gone back to the pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cyberkg_core::types::{node_key, DEFAULT_NODE_TYPE, NAME_PROPERTY};
use cyberkg_core::{EdgeType, NodeLabel, PropertyMap};

use crate::client::{GraphClient, Result};

/// A node as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Store-assigned identifier.
    pub internal_id: i64,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl NodeRecord {
    /// Business id when present, otherwise the internal id.
    pub fn key(&self) -> String {
        node_key(&self.properties, self.internal_id)
    }

    /// First label, or `"Node"` for unlabeled nodes.
    pub fn primary_label(&self) -> &str {
        self.labels
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_NODE_TYPE)
    }

    pub fn name(&self) -> &str {
        self.str_property(NAME_PROPERTY)
    }

    /// A string property, or `""` when missing or not a string.
    pub fn str_property(&self, key: &str) -> &str {
        self.properties
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn has_any_label(&self, labels: &[String]) -> bool {
        labels.iter().any(|l| self.labels.contains(l))
    }
}

/// A relationship as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub internal_id: Option<i64>,
    pub rel_type: String,
}

/// One row of a pattern query: a node, optionally with an outgoing
/// relationship and the node it points to.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRow {
    pub source: NodeRecord,
    pub relation: Option<RelationRecord>,
    pub target: Option<NodeRecord>,
}

/// The bounded patterns the core knows how to ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Directed triples `(n)-[r]->(m)`; when `labels` is non-empty only
    /// triples whose source carries one of them are returned.
    Triples { labels: Vec<String>, limit: usize },
    /// Nodes whose business id is in `target_ids`, every ancestor reachable
    /// over `rel_types` at any depth, and the `rel_types` edges among them.
    /// Nodes come back in discovery order, targets first.
    Ancestors {
        target_ids: Vec<String>,
        rel_types: Vec<EdgeType>,
    },
}

/// A batch of edges to create, matched by business id on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeBatch {
    pub rel_type: EdgeType,
    pub source_label: NodeLabel,
    pub target_label: NodeLabel,
    /// `(source_id, target_id)` pairs.
    pub pairs: Vec<(String, String)>,
}

/// What an edge batch actually wrote.
///
/// `created` can exceed the number of pairs when business ids are shared by
/// several nodes; `matched_pairs` counts pairs that produced at least one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeBatchOutcome {
    pub created: usize,
    pub matched_pairs: usize,
}

/// Distinct node labels and relationship types present in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCatalog {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

impl TypeCatalog {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.relationship_types.is_empty()
    }
}

/// Storage backend for the knowledge graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Detach-delete every node. Returns the number of nodes removed.
    async fn clear(&self) -> Result<u64>;

    /// Create one node per row under `label`. Returns the number created.
    async fn create_nodes_batch(&self, label: &str, rows: &[PropertyMap]) -> Result<usize>;

    /// Create edges between existing nodes. Pairs whose endpoints are not
    /// found are skipped silently.
    async fn create_edges_batch(&self, batch: &EdgeBatch) -> Result<EdgeBatchOutcome>;

    /// Run a bounded pattern and return fully materialized rows.
    async fn run_pattern(&self, pattern: &Pattern) -> Result<Vec<PatternRow>>;

    /// Look a node up by its business `id` property.
    async fn find_by_business_id(&self, id: &str) -> Result<Option<NodeRecord>>;

    /// Look a node up by its internal identifier.
    async fn get_node(&self, internal_id: i64) -> Result<Option<NodeRecord>>;

    /// Merge `patch` into the node's properties.
    async fn update_node_properties(&self, internal_id: i64, patch: &PropertyMap) -> Result<()>;

    /// Remove `current` labels, then add `new_label`, as two separate writes.
    async fn swap_node_label(
        &self,
        internal_id: i64,
        current: &[String],
        new_label: &str,
    ) -> Result<()>;

    /// Detach-delete a node. Returns whether anything was deleted.
    async fn delete_node(&self, internal_id: i64) -> Result<bool>;

    /// Labels and relationship types from the store's catalog.
    async fn catalog_types(&self) -> Result<TypeCatalog>;

    /// Labels and relationship types from a full scan.
    async fn scan_types(&self) -> Result<TypeCatalog>;

    async fn count_nodes(&self, label: Option<&str>) -> Result<i64>;

    async fn count_edges(&self, rel_type: Option<&str>) -> Result<i64>;
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn clear(&self) -> Result<u64> {
        GraphClient::clear(self).await
    }

    async fn create_nodes_batch(&self, label: &str, rows: &[PropertyMap]) -> Result<usize> {
        GraphClient::create_nodes_batch(self, label, rows).await
    }

    async fn create_edges_batch(&self, batch: &EdgeBatch) -> Result<EdgeBatchOutcome> {
        GraphClient::create_edges_batch(self, batch).await
    }

    async fn run_pattern(&self, pattern: &Pattern) -> Result<Vec<PatternRow>> {
        GraphClient::run_pattern(self, pattern).await
    }

    async fn find_by_business_id(&self, id: &str) -> Result<Option<NodeRecord>> {
        GraphClient::find_by_business_id(self, id).await
    }

    async fn get_node(&self, internal_id: i64) -> Result<Option<NodeRecord>> {
        GraphClient::get_node(self, internal_id).await
    }

    async fn update_node_properties(&self, internal_id: i64, patch: &PropertyMap) -> Result<()> {
        GraphClient::update_node_properties(self, internal_id, patch).await
    }

    async fn swap_node_label(
        &self,
        internal_id: i64,
        current: &[String],
        new_label: &str,
    ) -> Result<()> {
        GraphClient::swap_node_label(self, internal_id, current, new_label).await
    }

    async fn delete_node(&self, internal_id: i64) -> Result<bool> {
        GraphClient::delete_node(self, internal_id).await
    }

    async fn catalog_types(&self) -> Result<TypeCatalog> {
        GraphClient::catalog_types(self).await
    }

    async fn scan_types(&self) -> Result<TypeCatalog> {
        GraphClient::scan_types(self).await
    }

    async fn count_nodes(&self, label: Option<&str>) -> Result<i64> {
        GraphClient::count_nodes(self, label).await
    }

    async fn count_edges(&self, rel_type: Option<&str>) -> Result<i64> {
        GraphClient::count_edges(self, rel_type).await
    }
}
