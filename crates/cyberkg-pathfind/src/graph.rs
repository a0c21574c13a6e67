//! In-memory prerequisite graph.
//!
//! Converts a gateway `WorkingSet` into dense indices and an adjacency list.
//! Node order is the working set's discovery order and is preserved, since
//! the sort uses it to break ties.

use std::collections::HashMap;

use cyberkg_graph::{NodeDto, WorkingSet};

/// Node metadata kept for building path descriptors.
#[derive(Debug, Clone)]
pub struct LearningNode {
    /// Dense index (0..N-1).
    pub index: usize,
    pub id: String,
    pub name: String,
    pub description: String,
    pub node_type: String,
}

impl From<(usize, &NodeDto)> for LearningNode {
    fn from((index, dto): (usize, &NodeDto)) -> Self {
        Self {
            index,
            id: dto.id.clone(),
            name: dto.label.clone(),
            description: dto
                .properties
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            node_type: dto.node_type.clone(),
        }
    }
}

pub struct PrerequisiteGraph {
    pub nodes: Vec<LearningNode>,
    /// `adjacency[i]` = nodes that require `i` first.
    pub adjacency: Vec<Vec<usize>>,
    /// Map from business id → dense index.
    pub node_index: HashMap<String, usize>,
}

impl PrerequisiteGraph {
    /// Build from a working set. Edges with an endpoint outside the set are
    /// dropped.
    pub fn from_working_set(set: &WorkingSet) -> Self {
        let mut node_index = HashMap::with_capacity(set.nodes.len());
        let mut nodes = Vec::with_capacity(set.nodes.len());

        for dto in &set.nodes {
            if node_index.contains_key(&dto.id) {
                continue;
            }
            let index = nodes.len();
            node_index.insert(dto.id.clone(), index);
            nodes.push(LearningNode::from((index, dto)));
        }

        let mut adjacency = vec![Vec::new(); nodes.len()];
        for edge in &set.edges {
            if let (Some(&src), Some(&tgt)) =
                (node_index.get(&edge.source), node_index.get(&edge.target))
            {
                adjacency[src].push(tgt);
            }
        }

        Self {
            nodes,
            adjacency,
            node_index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Incoming edge count per node.
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for targets in &self.adjacency {
            for &t in targets {
                degrees[t] += 1;
            }
        }
        degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyberkg_graph::EdgeDto;

    fn node(id: &str) -> NodeDto {
        NodeDto {
            id: id.to_string(),
            display_id: id.to_string(),
            label: format!("Node {id}"),
            node_type: "Course".to_string(),
            x: None,
            y: None,
            properties: serde_json::json!({"id": id, "description": format!("about {id}")})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn edge(source: &str, target: &str) -> EdgeDto {
        EdgeDto {
            id: format!("{source}_PREREQUISITE_{target}_0"),
            source: source.to_string(),
            target: target.to_string(),
            edge_type: "PREREQUISITE".to_string(),
            label: "PREREQUISITE".to_string(),
        }
    }

    #[test]
    fn test_from_working_set() {
        let set = WorkingSet {
            nodes: vec![node("C"), node("B"), node("A")],
            edges: vec![edge("B", "C"), edge("A", "B")],
        };
        let graph = PrerequisiteGraph::from_working_set(&set);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.node_index.get("C"), Some(&0));
        assert_eq!(graph.in_degrees(), vec![1, 1, 0]);
        assert_eq!(graph.nodes[2].description, "about A");
        assert_eq!(graph.nodes[2].name, "Node A");
    }

    #[test]
    fn test_edge_with_missing_node_ignored() {
        let set = WorkingSet {
            nodes: vec![node("A")],
            edges: vec![edge("A", "missing")],
        };
        let graph = PrerequisiteGraph::from_working_set(&set);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_nodes_collapse() {
        let set = WorkingSet {
            nodes: vec![node("A"), node("A")],
            edges: vec![],
        };
        assert_eq!(PrerequisiteGraph::from_working_set(&set).node_count(), 1);
    }
}
