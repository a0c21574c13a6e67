//! cyberkg-pathfind: prerequisite-ordered learning paths over the knowledge graph.
//!
//! Resolves the target nodes and every prerequisite ancestor through the
//! Query Gateway, orders them with Kahn's algorithm, and returns a capped
//! sequence of path steps. Cycles are reported, never partially ordered.

pub mod algorithms;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod types;

pub use error::{PathError, Result};
pub use types::{PathConfig, PathNode, PathRequest, PathResult};

use cyberkg_graph::{GraphStore, QueryGateway};

use crate::graph::PrerequisiteGraph;

/// Builds learning paths from prerequisite relationships.
pub struct PathGenerator<S: GraphStore + ?Sized> {
    gateway: QueryGateway<S>,
    config: PathConfig,
}

impl<S: GraphStore + ?Sized> PathGenerator<S> {
    /// Create a generator with default settings.
    pub fn new(gateway: QueryGateway<S>) -> Self {
        Self {
            gateway,
            config: PathConfig::default(),
        }
    }

    /// Set a custom configuration.
    pub fn with_config(mut self, config: PathConfig) -> Self {
        self.config = config;
        self
    }

    /// Generate a learning path ending at the requested targets.
    ///
    /// fetch working set → build graph → Kahn order → truncate → describe.
    pub async fn generate_path(&self, request: PathRequest) -> Result<PathResult> {
        let max_nodes = request.max_nodes.unwrap_or(self.config.default_max_nodes);
        let minutes = self.config.estimated_minutes_per_node;

        let set = fetch::fetch_working_set(&self.gateway, &request.target_ids).await?;
        if set.nodes.is_empty() {
            tracing::warn!(targets = ?request.target_ids, "No target nodes resolved");
            return Ok(PathResult {
                difficulty: request.difficulty,
                ..Default::default()
            });
        }

        let graph = PrerequisiteGraph::from_working_set(&set);
        let order = algorithms::kahn_order(&graph).map_err(|unresolved| {
            let unresolved: Vec<String> = unresolved
                .into_iter()
                .map(|i| graph.nodes[i].id.clone())
                .collect();
            tracing::warn!(?unresolved, "Prerequisite cycle detected");
            PathError::CycleDetected { unresolved }
        })?;

        let nodes: Vec<PathNode> = order
            .into_iter()
            .take(max_nodes)
            .enumerate()
            .map(|(idx, i)| {
                let node = &graph.nodes[i];
                PathNode {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    description: node.description.clone(),
                    order: idx + 1,
                    estimated_time: minutes,
                    node_type: node.node_type.clone(),
                }
            })
            .collect();

        let total_nodes = nodes.len();
        tracing::info!(
            working_set = graph.node_count(),
            total_nodes,
            max_nodes,
            "Learning path generated"
        );

        Ok(PathResult {
            nodes,
            total_nodes,
            estimated_duration: total_nodes as u64 * u64::from(minutes),
            difficulty: request.difficulty,
        })
    }
}
