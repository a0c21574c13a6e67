//! Write operations for the knowledge graph.
//!
//! Bulk loads use plain CREATE: the importer only runs against an empty
//! store, so there is nothing to merge with. Labels and relationship types
//! cannot be bound as parameters and are validated before being formatted
//! into Cypher.

use neo4rs::query;

use cyberkg_core::types::is_valid_identifier;
use cyberkg_core::PropertyMap;

use crate::client::{GraphClient, GraphError, Result};
use crate::store::{EdgeBatch, EdgeBatchOutcome};

impl GraphClient {
    // ── Bulk Loading ─────────────────────────────────────────────

    /// Detach-delete every node in the database.
    pub async fn clear(&self) -> Result<u64> {
        let q = query("MATCH (n) DETACH DELETE n RETURN count(n) AS cnt");
        let removed = self.query_count(q).await?;
        tracing::info!(removed, "Cleared graph");
        Ok(removed.max(0) as u64)
    }

    /// Create one node per row under `label` in a single statement.
    pub async fn create_nodes_batch(&self, label: &str, rows: &[PropertyMap]) -> Result<usize> {
        let label = checked_identifier(label)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let encoded = rows
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GraphError::Serialization(e.to_string()))?;

        let cypher = format!(
            "UNWIND $rows AS row
             CREATE (n:{label})
             SET n = apoc.convert.fromJsonMap(row)
             RETURN count(n) AS cnt"
        );

        let created = self
            .query_count(query(&cypher).param("rows", encoded))
            .await?;
        tracing::debug!(label, created, "Node batch written");
        Ok(created.max(0) as usize)
    }

    /// Create edges between existing nodes, matched by business id.
    pub async fn create_edges_batch(&self, batch: &EdgeBatch) -> Result<EdgeBatchOutcome> {
        if batch.pairs.is_empty() {
            return Ok(EdgeBatchOutcome::default());
        }

        let (sources, targets): (Vec<String>, Vec<String>) = batch.pairs.iter().cloned().unzip();

        let cypher = format!(
            "UNWIND range(0, size($sources) - 1) AS i
             MATCH (a:{src} {{id: $sources[i]}})
             MATCH (b:{tgt} {{id: $targets[i]}})
             CREATE (a)-[r:{rel}]->(b)
             RETURN count(r) AS cnt, count(DISTINCT i) AS matched",
            src = batch.source_label.as_str(),
            tgt = batch.target_label.as_str(),
            rel = batch.rel_type.as_cypher(),
        );

        let q = query(&cypher)
            .param("sources", sources)
            .param("targets", targets);

        let outcome = match self.query_one(q).await? {
            Some(row) => EdgeBatchOutcome {
                created: row.get::<i64>("cnt").unwrap_or(0).max(0) as usize,
                matched_pairs: row.get::<i64>("matched").unwrap_or(0).max(0) as usize,
            },
            None => EdgeBatchOutcome::default(),
        };
        tracing::debug!(
            rel_type = batch.rel_type.as_cypher(),
            requested = batch.pairs.len(),
            created = outcome.created,
            matched = outcome.matched_pairs,
            "Edge batch written"
        );
        Ok(outcome)
    }

    // ── Node Edits ───────────────────────────────────────────────

    /// Merge `patch` into a node's properties.
    pub async fn update_node_properties(&self, internal_id: i64, patch: &PropertyMap) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let encoded =
            serde_json::to_string(patch).map_err(|e| GraphError::Serialization(e.to_string()))?;

        let q = query(
            "MATCH (n) WHERE id(n) = $iid
             SET n += apoc.convert.fromJsonMap($patch)",
        )
        .param("iid", internal_id)
        .param("patch", encoded);

        self.run(q).await
    }

    /// Replace a node's labels with `new_label`.
    ///
    /// Runs as two statements. If the second one fails the node is left
    /// with no labels and the caller gets `LabelSwapIncomplete`.
    pub async fn swap_node_label(
        &self,
        internal_id: i64,
        current: &[String],
        new_label: &str,
    ) -> Result<()> {
        let new_label = checked_identifier(new_label)?;
        for label in current {
            checked_identifier(label)?;
        }

        if !current.is_empty() {
            let cypher = format!(
                "MATCH (n) WHERE id(n) = $iid REMOVE n:{}",
                current.join(":")
            );
            self.run(query(&cypher).param("iid", internal_id)).await?;
        }

        let cypher = format!("MATCH (n) WHERE id(n) = $iid SET n:{new_label}");
        self.run(query(&cypher).param("iid", internal_id))
            .await
            .map_err(|e| GraphError::LabelSwapIncomplete {
                id: internal_id.to_string(),
                label: new_label.to_string(),
                reason: e.to_string(),
            })
    }

    /// Detach-delete a node by internal id.
    pub async fn delete_node(&self, internal_id: i64) -> Result<bool> {
        let q = query(
            "MATCH (n) WHERE id(n) = $iid
             DETACH DELETE n
             RETURN count(n) AS cnt",
        )
        .param("iid", internal_id);

        Ok(self.query_count(q).await? > 0)
    }
}

// ── Helpers ──────────────────────────────────────────────────────

pub(crate) fn checked_identifier(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(GraphError::InvalidLabel(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_checked() {
        assert_eq!(checked_identifier("Technique").unwrap(), "Technique");
        assert!(matches!(
            checked_identifier("Bad Label"),
            Err(GraphError::InvalidLabel(_))
        ));
        assert!(checked_identifier("x`) DETACH DELETE n //").is_err());
    }
}
