//! Request, response and configuration types for path generation.

use serde::{Deserialize, Serialize};

/// Request to generate a learning path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRequest {
    /// Business ids of the nodes the learner wants to reach.
    #[serde(alias = "targetKnowledge")]
    pub target_ids: Vec<String>,
    /// Cap on returned nodes (default from `[path] default_max_nodes`).
    #[serde(default)]
    pub max_nodes: Option<usize>,
    /// Accepted and echoed back; does not affect ordering.
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// One step of a learning path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathNode {
    pub id: String,
    pub name: String,
    pub description: String,
    /// 1-based position.
    pub order: usize,
    /// Minutes.
    pub estimated_time: u32,
    pub node_type: String,
}

/// A generated learning path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    pub nodes: Vec<PathNode>,
    pub total_nodes: usize,
    /// Minutes.
    pub estimated_duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

/// Path generation settings (`[path]`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PathConfig {
    #[serde(default = "default_max_nodes")]
    pub default_max_nodes: usize,

    #[serde(default = "default_minutes_per_node")]
    pub estimated_minutes_per_node: u32,
}

fn default_max_nodes() -> usize {
    10
}

fn default_minutes_per_node() -> u32 {
    60
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            default_max_nodes: default_max_nodes(),
            estimated_minutes_per_node: default_minutes_per_node(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_camel_case() {
        let req: PathRequest =
            serde_json::from_str(r#"{"targetIds": ["C"], "maxNodes": 3, "difficulty": "beginner"}"#)
                .unwrap();
        assert_eq!(req.target_ids, vec!["C"]);
        assert_eq!(req.max_nodes, Some(3));

        let legacy: PathRequest = serde_json::from_str(r#"{"targetKnowledge": ["7"]}"#).unwrap();
        assert_eq!(legacy.target_ids, vec!["7"]);
        assert_eq!(legacy.max_nodes, None);
    }

    #[test]
    fn test_result_field_names() {
        let result = PathResult {
            nodes: vec![PathNode {
                id: "A".into(),
                name: "Alpha".into(),
                description: String::new(),
                order: 1,
                estimated_time: 60,
                node_type: "Course".into(),
            }],
            total_nodes: 1,
            estimated_duration: 60,
            difficulty: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalNodes"], 1);
        assert_eq!(json["estimatedDuration"], 60);
        assert_eq!(json["nodes"][0]["estimatedTime"], 60);
        assert_eq!(json["nodes"][0]["nodeType"], "Course");
        assert!(json.get("difficulty").is_none());
    }

    #[test]
    fn test_default_config() {
        let config = PathConfig::default();
        assert_eq!(config.default_max_nodes, 10);
        assert_eq!(config.estimated_minutes_per_node, 60);
    }
}
