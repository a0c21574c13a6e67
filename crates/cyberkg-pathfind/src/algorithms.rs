//! Topological ordering over the prerequisite graph (Kahn's algorithm).

use std::collections::VecDeque;

use crate::graph::PrerequisiteGraph;

/// Order nodes so every prerequisite precedes its dependents.
///
/// The queue is seeded with zero in-degree nodes in index order and nodes
/// become ready in the order their last incoming edge is removed, so the
/// result is deterministic for a given graph. On a cycle, returns the
/// indices that could not be placed, in index order.
pub fn kahn_order(graph: &PrerequisiteGraph) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = graph.in_degrees();
    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in &graph.adjacency[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() == graph.node_count() {
        Ok(order)
    } else {
        let unresolved = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 0)
            .map(|(i, _)| i)
            .collect();
        Err(unresolved)
    }
}

/// Whether `order` places every edge's source before its target, counting
/// only edges with both ends present in `order`.
pub fn is_topological(graph: &PrerequisiteGraph, order: &[usize]) -> bool {
    let mut position = vec![None; graph.node_count()];
    for (pos, &node) in order.iter().enumerate() {
        position[node] = Some(pos);
    }
    graph.adjacency.iter().enumerate().all(|(src, targets)| {
        targets.iter().all(|&tgt| match (position[src], position[tgt]) {
            (Some(a), Some(b)) => a < b,
            _ => true,
        })
    })
}
