//! Query Gateway: bounded reads and node edits over a `GraphStore`,
//! returned as JSON-ready DTOs.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cyberkg_core::types::ID_PROPERTY;
use cyberkg_core::{EdgeType, NodeLabel, PropertyMap};

use crate::client::{GraphError, Result};
use crate::mutations::checked_identifier;
use crate::store::{GraphStore, NodeRecord, Pattern, PatternRow};

const EXTERNAL_ID_PROPERTY: &str = "external_id";

/// Property keys a node update may never overwrite.
pub const PROTECTED_KEYS: [&str; 3] = [ID_PROPERTY, "x", "y"];

/// Labels shown by the filtered (ATT&CK) subgraph view.
pub const ATTACK_LABELS: [NodeLabel; 2] = [NodeLabel::Technique, NodeLabel::Tactic];

// ── DTOs ─────────────────────────────────────────────────────────

/// A node as presented to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: String,
    /// `external_id` when present, otherwise `id`.
    pub display_id: String,
    /// The `name` property, or empty.
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub x: Option<Value>,
    pub y: Option<Value>,
    pub properties: PropertyMap,
}

impl From<&NodeRecord> for NodeDto {
    fn from(node: &NodeRecord) -> Self {
        let id = node.key();
        let display_id = match node.properties.get(EXTERNAL_ID_PROPERTY) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => id.clone(),
        };
        Self {
            id,
            display_id,
            label: node.name().to_string(),
            node_type: node.primary_label().to_string(),
            x: node.properties.get("x").cloned(),
            y: node.properties.get("y").cloned(),
            properties: node.properties.clone(),
        }
    }
}

/// An edge as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDto {
    /// `{source}_{type}_{target}_{seq}`.
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubgraphDto {
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
}

/// Which lookup answered a `get_node_types` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSource {
    Catalog,
    Scan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypes {
    pub node_types: Vec<String>,
    pub edge_types: Vec<String>,
    pub source: TypeSource,
}

/// Requested changes to one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default, rename = "type")]
    pub node_type: Option<String>,
}

/// Nodes and edges of a prerequisite working set, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
}

/// Node and edge counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: i64,
    pub techniques: i64,
    pub tactics: i64,
    pub belongs_to: i64,
    pub relations: i64,
}

// ── Gateway ──────────────────────────────────────────────────────

/// Read and edit access to the graph. Clone is cheap.
pub struct QueryGateway<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for QueryGateway<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GraphStore + ?Sized> QueryGateway<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Up to `limit` directed triples of any kind.
    pub async fn get_subgraph(&self, limit: usize) -> Result<SubgraphDto> {
        self.get_filtered_subgraph(&[], limit).await
    }

    /// Up to `limit` triples whose source node carries one of `labels`.
    /// An empty `labels` slice means no filter.
    pub async fn get_filtered_subgraph(
        &self,
        labels: &[String],
        limit: usize,
    ) -> Result<SubgraphDto> {
        for label in labels {
            checked_identifier(label)?;
        }
        let rows = self
            .store
            .run_pattern(&Pattern::Triples {
                labels: labels.to_vec(),
                limit,
            })
            .await?;

        let (nodes, edges) = materialize(&rows);
        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            limit,
            "Subgraph materialized"
        );
        Ok(SubgraphDto { nodes, edges })
    }

    /// Distinct node labels and relationship types.
    ///
    /// Tries the catalog first and scans the data only when the catalog
    /// returns nothing at all.
    pub async fn get_node_types(&self) -> Result<NodeTypes> {
        let catalog = self.store.catalog_types().await?;
        if !catalog.is_empty() {
            return Ok(NodeTypes {
                node_types: catalog.labels,
                edge_types: catalog.relationship_types,
                source: TypeSource::Catalog,
            });
        }

        tracing::debug!("Type catalog empty, falling back to scan");
        let scanned = self.store.scan_types().await?;
        Ok(NodeTypes {
            node_types: scanned.labels,
            edge_types: scanned.relationship_types,
            source: TypeSource::Scan,
        })
    }

    /// Patch a node's properties and optionally replace its label.
    pub async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<NodeDto> {
        if let Some(label) = &update.node_type {
            checked_identifier(label)?;
        }
        let node = self.resolve(id).await?;

        let patch: PropertyMap = update
            .properties
            .into_iter()
            .filter(|(k, _)| !PROTECTED_KEYS.contains(&k.as_str()))
            .collect();
        if !patch.is_empty() {
            self.store
                .update_node_properties(node.internal_id, &patch)
                .await?;
        }

        if let Some(label) = update.node_type {
            let unchanged = node.labels.len() == 1 && node.labels[0] == label;
            if !unchanged {
                self.store
                    .swap_node_label(node.internal_id, &node.labels, &label)
                    .await?;
                tracing::info!(id, from = ?node.labels, to = %label, "Node label replaced");
            }
        }

        let updated = self
            .store
            .get_node(node.internal_id)
            .await?
            .ok_or_else(|| GraphError::NotFound { id: id.to_string() })?;
        Ok(NodeDto::from(&updated))
    }

    /// Detach-delete a node.
    pub async fn delete_node(&self, id: &str) -> Result<()> {
        let node = self.resolve(id).await?;
        if !self.store.delete_node(node.internal_id).await? {
            return Err(GraphError::NotFound { id: id.to_string() });
        }
        tracing::info!(id, "Node deleted");
        Ok(())
    }

    /// Targets, all of their prerequisite ancestors, and the ordering
    /// edges among them.
    pub async fn prerequisite_subgraph(&self, target_ids: &[String]) -> Result<WorkingSet> {
        let rows = self
            .store
            .run_pattern(&Pattern::Ancestors {
                target_ids: target_ids.to_vec(),
                rel_types: EdgeType::ordering().to_vec(),
            })
            .await?;
        let (nodes, edges) = materialize(&rows);
        Ok(WorkingSet { nodes, edges })
    }

    /// Node and edge counts for verification.
    pub async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            nodes: self.store.count_nodes(None).await?,
            techniques: self
                .store
                .count_nodes(Some(NodeLabel::Technique.as_str()))
                .await?,
            tactics: self
                .store
                .count_nodes(Some(NodeLabel::Tactic.as_str()))
                .await?,
            belongs_to: self
                .store
                .count_edges(Some(EdgeType::BelongsTo.as_cypher()))
                .await?,
            relations: self.store.count_edges(None).await?,
        })
    }

    /// Business id first, then internal id.
    ///
    /// The internal-id fallback only accepts a node whose DTO id would be
    /// `id`, i.e. one without a business id of its own.
    async fn resolve(&self, id: &str) -> Result<NodeRecord> {
        if let Some(node) = self.store.find_by_business_id(id).await? {
            return Ok(node);
        }
        if let Ok(iid) = id.parse::<i64>() {
            if let Some(node) = self.store.get_node(iid).await? {
                if node.key() == id {
                    return Ok(node);
                }
            }
        }
        Err(GraphError::NotFound { id: id.to_string() })
    }
}

/// Deduplicate nodes by DTO id in first-seen order and number edges by
/// row index.
fn materialize(rows: &[PatternRow]) -> (Vec<NodeDto>, Vec<EdgeDto>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        for node in std::iter::once(&row.source).chain(row.target.as_ref()) {
            if seen.insert(node.key()) {
                nodes.push(NodeDto::from(node));
            }
        }

        if let (Some(rel), Some(target)) = (&row.relation, &row.target) {
            let source = row.source.key();
            let target = target.key();
            edges.push(EdgeDto {
                id: format!("{source}_{}_{target}_{idx}", rel.rel_type),
                source,
                target,
                edge_type: rel.rel_type.clone(),
                label: rel.rel_type.clone(),
            });
        }
    }
    (nodes, edges)
}
