//! Working-set fetching through the Query Gateway.

use cyberkg_graph::{GraphStore, QueryGateway, WorkingSet};

use crate::error::Result;

/// Fetch the targets, all of their prerequisite ancestors, and the
/// ordering edges among them.
pub async fn fetch_working_set<S: GraphStore + ?Sized>(
    gateway: &QueryGateway<S>,
    target_ids: &[String],
) -> Result<WorkingSet> {
    let set = gateway.prerequisite_subgraph(target_ids).await?;
    tracing::debug!(
        targets = target_ids.len(),
        nodes = set.nodes.len(),
        edges = set.edges.len(),
        "Working set fetched"
    );
    Ok(set)
}
