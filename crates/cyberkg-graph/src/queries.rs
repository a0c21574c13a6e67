//! Read operations for the knowledge graph.
//!
//! Every row is decoded into owned records before the call returns.
//! Property maps are shipped as JSON text (`apoc.convert.toJson`) and parsed
//! client-side so arbitrary property shapes survive the trip.

use std::collections::HashMap;

use neo4rs::query;

use cyberkg_core::{EdgeType, PropertyMap};

use crate::client::{GraphClient, GraphError, Result};
use crate::mutations::checked_identifier;
use crate::store::{NodeRecord, Pattern, PatternRow, RelationRecord, TypeCatalog};

impl GraphClient {
    // ── Pattern Queries ──────────────────────────────────────────

    /// Run one of the bounded patterns.
    pub async fn run_pattern(&self, pattern: &Pattern) -> Result<Vec<PatternRow>> {
        match pattern {
            Pattern::Triples { labels, limit } => self.triples(labels, *limit).await,
            Pattern::Ancestors {
                target_ids,
                rel_types,
            } => self.ancestors(target_ids, rel_types).await,
        }
    }

    async fn triples(&self, labels: &[String], limit: usize) -> Result<Vec<PatternRow>> {
        let filter = if labels.is_empty() {
            ""
        } else {
            "WHERE any(l IN labels(n) WHERE l IN $labels)"
        };
        let cypher = format!(
            "MATCH (n)-[r]->(m)
             {filter}
             RETURN id(n) AS n_iid, labels(n) AS n_labels,
                    apoc.convert.toJson(properties(n)) AS n_props,
                    id(r) AS r_iid, type(r) AS r_type,
                    id(m) AS m_iid, labels(m) AS m_labels,
                    apoc.convert.toJson(properties(m)) AS m_props
             LIMIT $limit"
        );

        let q = query(&cypher)
            .param("labels", labels.to_vec())
            .param("limit", limit as i64);

        let rows = self.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let source = decode_node(&row, "n")?.ok_or_else(|| missing_column("n_iid"))?;
            let target = decode_node(&row, "m")?;
            let relation = decode_relation(&row)?;
            results.push(PatternRow {
                source,
                relation: Some(relation),
                target,
            });
        }
        Ok(results)
    }

    /// Targets plus every ancestor over `rel_types`, then the edges among them.
    ///
    /// Nodes are ordered targets first (request order), then ancestors by
    /// shortest distance to any target.
    async fn ancestors(
        &self,
        target_ids: &[String],
        rel_types: &[EdgeType],
    ) -> Result<Vec<PatternRow>> {
        if target_ids.is_empty() || rel_types.is_empty() {
            return Ok(Vec::new());
        }
        let rels = rel_types
            .iter()
            .map(EdgeType::as_cypher)
            .collect::<Vec<_>>()
            .join("|");

        let cypher = format!(
            "UNWIND range(0, size($ids) - 1) AS i
             MATCH (t) WHERE t.id = $ids[i]
             OPTIONAL MATCH p = (a)-[:{rels}*]->(t)
             WITH i, t, a, min(length(p)) AS depth
             RETURN i, depth,
                    id(t) AS t_iid, labels(t) AS t_labels,
                    apoc.convert.toJson(properties(t)) AS t_props,
                    id(a) AS a_iid, labels(a) AS a_labels,
                    apoc.convert.toJson(properties(a)) AS a_props
             ORDER BY i, depth, a_iid"
        );
        let rows = self
            .query_rows(query(&cypher).param("ids", target_ids.to_vec()))
            .await?;

        let mut targets: Vec<(i64, NodeRecord)> = Vec::new();
        let mut ancestors: Vec<(i64, i64, NodeRecord)> = Vec::new();
        for row in rows {
            let i = column::<i64>(&row, "i")?;
            if let Some(t) = decode_node(&row, "t")? {
                targets.push((i, t));
            }
            if let Some(a) = decode_node(&row, "a")? {
                let depth = column::<Option<i64>>(&row, "depth")?;
                ancestors.push((depth.unwrap_or(i64::MAX), i, a));
            }
        }
        // Total order: equal (depth, i) keys fall back to the internal id.
        targets.sort_by_key(|(i, t)| (*i, t.internal_id));
        ancestors.sort_by_key(|(depth, i, a)| (*depth, *i, a.internal_id));

        let mut nodes: Vec<NodeRecord> = Vec::new();
        for node in targets
            .into_iter()
            .map(|(_, n)| n)
            .chain(ancestors.into_iter().map(|(_, _, n)| n))
        {
            if !nodes.iter().any(|n| n.internal_id == node.internal_id) {
                nodes.push(node);
            }
        }
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let iids: Vec<i64> = nodes.iter().map(|n| n.internal_id).collect();
        let cypher = format!(
            "MATCH (n)-[r:{rels}]->(m)
             WHERE id(n) IN $iids AND id(m) IN $iids
             RETURN id(n) AS n_iid, id(r) AS r_iid, type(r) AS r_type, id(m) AS m_iid
             ORDER BY r_iid"
        );
        let edge_rows = self
            .query_rows(query(&cypher).param("iids", iids))
            .await?;

        let mut outgoing: HashMap<i64, Vec<(RelationRecord, i64)>> = HashMap::new();
        for row in edge_rows {
            let source = column::<i64>(&row, "n_iid")?;
            let target = column::<i64>(&row, "m_iid")?;
            let relation = decode_relation(&row)?;
            outgoing.entry(source).or_default().push((relation, target));
        }

        let by_iid: HashMap<i64, NodeRecord> =
            nodes.iter().map(|n| (n.internal_id, n.clone())).collect();
        let mut results = Vec::new();
        for node in nodes {
            match outgoing.remove(&node.internal_id) {
                Some(edges) => {
                    for (relation, target) in edges {
                        results.push(PatternRow {
                            source: node.clone(),
                            relation: Some(relation),
                            target: by_iid.get(&target).cloned(),
                        });
                    }
                }
                None => results.push(PatternRow {
                    source: node,
                    relation: None,
                    target: None,
                }),
            }
        }
        Ok(results)
    }

    // ── Single Node Lookups ──────────────────────────────────────

    /// Find a node by its business `id` property.
    ///
    /// A numeric `id` matches its decimal form; string ids win when both
    /// exist.
    pub async fn find_by_business_id(&self, id: &str) -> Result<Option<NodeRecord>> {
        let q = query(
            "MATCH (n) WHERE n.id = $id OR toString(n.id) = $id
             RETURN id(n) AS n_iid, labels(n) AS n_labels,
                    apoc.convert.toJson(properties(n)) AS n_props
             ORDER BY CASE WHEN n.id = $id THEN 0 ELSE 1 END, n_iid
             LIMIT 1",
        )
        .param("id", id.to_string());

        match self.query_one(q).await? {
            Some(row) => decode_node(&row, "n"),
            None => Ok(None),
        }
    }

    /// Fetch a node by internal id.
    pub async fn get_node(&self, internal_id: i64) -> Result<Option<NodeRecord>> {
        let q = query(
            "MATCH (n) WHERE id(n) = $iid
             RETURN id(n) AS n_iid, labels(n) AS n_labels,
                    apoc.convert.toJson(properties(n)) AS n_props",
        )
        .param("iid", internal_id);

        match self.query_one(q).await? {
            Some(row) => decode_node(&row, "n"),
            None => Ok(None),
        }
    }

    // ── Type Discovery ───────────────────────────────────────────

    /// Labels and relationship types from the database catalog.
    pub async fn catalog_types(&self) -> Result<TypeCatalog> {
        let labels = self
            .collect_strings(
                query("CALL db.labels() YIELD label RETURN collect(label) AS items"),
            )
            .await?;
        let relationship_types = self
            .collect_strings(query(
                "CALL db.relationshipTypes() YIELD relationshipType
                 RETURN collect(relationshipType) AS items",
            ))
            .await?;
        Ok(TypeCatalog {
            labels,
            relationship_types,
        })
    }

    /// Labels and relationship types found by scanning the data.
    pub async fn scan_types(&self) -> Result<TypeCatalog> {
        let labels = self
            .collect_strings(query(
                "MATCH (n) UNWIND labels(n) AS label
                 RETURN collect(DISTINCT label) AS items",
            ))
            .await?;
        let relationship_types = self
            .collect_strings(query(
                "MATCH ()-[r]->() RETURN collect(DISTINCT type(r)) AS items",
            ))
            .await?;
        Ok(TypeCatalog {
            labels,
            relationship_types,
        })
    }

    async fn collect_strings(&self, q: neo4rs::Query) -> Result<Vec<String>> {
        match self.query_one(q).await? {
            Some(row) => Ok(column::<Option<Vec<String>>>(&row, "items")?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    // ── Counts ───────────────────────────────────────────────────

    /// Count nodes, optionally restricted to one label.
    pub async fn count_nodes(&self, label: Option<&str>) -> Result<i64> {
        let cypher = match label {
            Some(l) => format!("MATCH (n:{}) RETURN count(n) AS cnt", checked_identifier(l)?),
            None => "MATCH (n) RETURN count(n) AS cnt".to_string(),
        };
        self.query_count(query(&cypher)).await
    }

    /// Count relationships, optionally restricted to one type.
    pub async fn count_edges(&self, rel_type: Option<&str>) -> Result<i64> {
        let cypher = match rel_type {
            Some(t) => format!(
                "MATCH ()-[r:{}]->() RETURN count(r) AS cnt",
                checked_identifier(t)?
            ),
            None => "MATCH ()-[r]->() RETURN count(r) AS cnt".to_string(),
        };
        self.query_count(query(&cypher)).await
    }
}

// ── Row Decoding ─────────────────────────────────────────────────

/// Decode the `{prefix}_iid`, `{prefix}_labels` and `{prefix}_props`
/// columns into a record. A null id means the node was optional and absent.
fn decode_node(row: &neo4rs::Row, prefix: &str) -> Result<Option<NodeRecord>> {
    let Some(iid) = column::<Option<i64>>(row, &format!("{prefix}_iid"))? else {
        return Ok(None);
    };
    let labels = column::<Option<Vec<String>>>(row, &format!("{prefix}_labels"))?
        .unwrap_or_default();
    let raw = column::<Option<String>>(row, &format!("{prefix}_props"))?;

    Ok(Some(NodeRecord {
        internal_id: iid,
        labels,
        properties: parse_properties(raw.as_deref())?,
    }))
}

fn decode_relation(row: &neo4rs::Row) -> Result<RelationRecord> {
    Ok(RelationRecord {
        internal_id: column::<Option<i64>>(row, "r_iid")?,
        rel_type: column::<String>(row, "r_type")?,
    })
}

fn column<T: serde::de::DeserializeOwned>(row: &neo4rs::Row, name: &str) -> Result<T> {
    row.get::<T>(name).map_err(|e| decode_error(name, e))
}

fn parse_properties(raw: Option<&str>) -> Result<PropertyMap> {
    match raw {
        None | Some("") | Some("null") => Ok(PropertyMap::new()),
        Some(text) => serde_json::from_str(text).map_err(|e| {
            GraphError::Serialization(format!("Failed to deserialize node properties: {e}"))
        }),
    }
}

fn missing_column(name: &str) -> GraphError {
    GraphError::Serialization(format!("Missing column {name} in result row"))
}

fn decode_error(name: &str, err: impl std::fmt::Display) -> GraphError {
    GraphError::Serialization(format!("Failed to decode column {name}: {err}"))
}
