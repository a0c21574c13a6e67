//! Core domain types for the cyberkg knowledge graph.
//!
//! These types describe what lives in the graph (techniques, tactics and the
//! relationships between them) independently of any particular store.

use serde::{Deserialize, Serialize};

/// Property map carried by every graph node and relationship.
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// Type reported for nodes that carry no label at all.
pub const DEFAULT_NODE_TYPE: &str = "Node";

/// Property holding a node's business identity.
pub const ID_PROPERTY: &str = "id";

/// Property holding a node's display name.
pub const NAME_PROPERTY: &str = "name";

// ── Labels ────────────────────────────────────────────────────────

/// Node labels written by the importer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Technique,
    Tactic,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Technique => "Technique",
            NodeLabel::Tactic => "Tactic",
        }
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Edge Types ────────────────────────────────────────────────────

/// Relationship types the core reads or writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Technique → Tactic, derived from kill-chain phases.
    BelongsTo,
    /// Source must be learned before target.
    Prerequisite,
    /// Same ordering meaning as `Prerequisite`, used by course data.
    DependsOn,
}

impl EdgeType {
    /// The Cypher relationship type string.
    pub fn as_cypher(&self) -> &'static str {
        match self {
            EdgeType::BelongsTo => "BELONGS_TO",
            EdgeType::Prerequisite => "PREREQUISITE",
            EdgeType::DependsOn => "DEPENDS_ON",
        }
    }

    /// Relationship types that impose a learning order.
    pub fn ordering() -> [EdgeType; 2] {
        [EdgeType::Prerequisite, EdgeType::DependsOn]
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_cypher())
    }
}

// ── Node Types ────────────────────────────────────────────────────

/// An attack technique as stored on a `Technique` node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Technique {
    pub id: String,
    pub name: String,
    pub description: String,
    pub external_id: String,
    pub url: String,
    pub created: String,
    pub modified: String,
}

/// An adversary tactic as stored on a `Tactic` node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tactic {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Join key against technique kill-chain phase names.
    pub shortname: String,
    pub external_id: String,
    pub url: String,
    pub created: String,
    pub modified: String,
}

impl Technique {
    pub fn into_properties(self) -> PropertyMap {
        to_property_map(&self)
    }
}

impl Tactic {
    pub fn into_properties(self) -> PropertyMap {
        to_property_map(&self)
    }
}

fn to_property_map<T: Serialize>(value: &T) -> PropertyMap {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => PropertyMap::new(),
    }
}

// ── Identity ──────────────────────────────────────────────────────

/// Resolve the string identity of a node.
///
/// The business `id` property wins when present and non-empty; otherwise the
/// store's internal identifier is used.
pub fn node_key(properties: &PropertyMap, internal_id: i64) -> String {
    match properties.get(ID_PROPERTY) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => internal_id.to_string(),
    }
}

/// Check that a label or relationship type is safe to splice into Cypher.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edge_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EdgeType::BelongsTo).unwrap();
        assert_eq!(json, "\"BELONGS_TO\"");
        assert_eq!(EdgeType::DependsOn.as_cypher(), "DEPENDS_ON");
    }

    #[test]
    fn technique_flattens_to_properties() {
        let tech = Technique {
            id: "attack-pattern--1".to_string(),
            name: "Command and Scripting Interpreter".to_string(),
            external_id: "T1059".to_string(),
            ..Default::default()
        };

        let props = tech.into_properties();
        assert_eq!(props.len(), 7);
        assert_eq!(props["external_id"], json!("T1059"));
        assert_eq!(props["url"], json!(""));
    }

    #[test]
    fn node_key_prefers_business_id() {
        let props = json!({"id": "x-mitre-tactic--1"});
        assert_eq!(node_key(props.as_object().unwrap(), 7), "x-mitre-tactic--1");
    }

    #[test]
    fn node_key_falls_back_to_internal_id() {
        let empty = json!({"id": ""});
        assert_eq!(node_key(empty.as_object().unwrap(), 42), "42");
        assert_eq!(node_key(&PropertyMap::new(), 3), "3");

        let numeric = json!({"id": 17});
        assert_eq!(node_key(numeric.as_object().unwrap(), 3), "17");
    }

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("Technique"));
        assert!(is_valid_identifier("_Sub_2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2Fast"));
        assert!(!is_valid_identifier("Bad`) DETACH DELETE n //"));
    }
}
