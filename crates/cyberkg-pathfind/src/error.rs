//! Error types for the cyberkg-pathfind crate.

use thiserror::Error;

use cyberkg_core::Reportable;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Graph error: {0}")]
    Graph(#[from] cyberkg_graph::GraphError),

    #[error("Prerequisite cycle among {} nodes: {}", unresolved.len(), unresolved.join(", "))]
    CycleDetected { unresolved: Vec<String> },
}

pub type Result<T> = std::result::Result<T, PathError>;

impl Reportable for PathError {
    fn kind(&self) -> &'static str {
        match self {
            PathError::Graph(e) => e.kind(),
            PathError::CycleDetected { .. } => "cycle_detected",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            PathError::Graph(e) => e.details(),
            PathError::CycleDetected { unresolved } => {
                serde_json::json!({ "unresolved": unresolved })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report() {
        let err = PathError::CycleDetected {
            unresolved: vec!["A".into(), "B".into()],
        };
        let report = err.report();
        assert_eq!(report.kind, "cycle_detected");
        assert_eq!(report.details["unresolved"][1], "B");
        assert!(report.message.contains("A, B"));
    }
}
