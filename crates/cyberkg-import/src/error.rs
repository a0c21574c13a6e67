//! Error types for the cyberkg-import crate.

use thiserror::Error;

use cyberkg_core::Reportable;
use cyberkg_graph::GraphError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse bundle: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Store already holds {nodes} nodes; clear it first or use --clear")]
    StoreNotEmpty { nodes: i64 },

    #[error("{label} batch {batch} failed: {source}")]
    BatchFailed {
        label: String,
        batch: usize,
        #[source]
        source: GraphError,
    },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Batch task failed: {0}")]
    Task(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;

impl Reportable for ImportError {
    fn kind(&self) -> &'static str {
        match self {
            ImportError::Io(_) => "io_error",
            ImportError::Parse(_) => "parse_error",
            ImportError::StoreNotEmpty { .. } => "store_not_empty",
            ImportError::BatchFailed { .. } => "batch_failed",
            ImportError::Graph(e) => e.kind(),
            ImportError::Task(_) => "task_failed",
            ImportError::Config(_) => "config_error",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            ImportError::StoreNotEmpty { nodes } => serde_json::json!({ "nodes": nodes }),
            ImportError::BatchFailed { label, batch, .. } => {
                serde_json::json!({ "label": label, "batch": batch })
            }
            ImportError::Graph(e) => e.details(),
            _ => serde_json::Value::Null,
        }
    }
}

impl From<cyberkg_core::CoreError> for ImportError {
    fn from(e: cyberkg_core::CoreError) -> Self {
        ImportError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ImportError::StoreNotEmpty { nodes: 3 }.kind(), "store_not_empty");
        let nf = ImportError::Graph(GraphError::NotFound { id: "x".into() });
        assert_eq!(nf.kind(), "not_found");

        let batch = ImportError::BatchFailed {
            label: "Technique".into(),
            batch: 2,
            source: GraphError::Connection("down".into()),
        };
        let report = batch.report();
        assert_eq!(report.kind, "batch_failed");
        assert_eq!(report.details["batch"], 2);
    }
}
