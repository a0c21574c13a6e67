//! Neo4j connection management and shared graph client.

use neo4rs::{ConfigBuilder, Graph, Query};

use cyberkg_core::config::Neo4jSettings;
use cyberkg_core::Reportable;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Node not found: {id}")]
    NotFound { id: String },

    #[error("Invalid label or relationship type: {0:?}")]
    InvalidLabel(String),

    #[error("Label swap on node {id} removed the old labels but failed to add {label}: {reason}")]
    LabelSwapIncomplete {
        id: String,
        label: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl Reportable for GraphError {
    fn kind(&self) -> &'static str {
        match self {
            GraphError::Connection(_) | GraphError::Query(_) => "query_error",
            GraphError::NotFound { .. } => "not_found",
            GraphError::InvalidLabel(_) => "invalid_request",
            GraphError::LabelSwapIncomplete { .. } => "label_swap_incomplete",
            GraphError::Serialization(_) => "serialization_error",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            GraphError::NotFound { id } => serde_json::json!({ "id": id }),
            GraphError::LabelSwapIncomplete { id, label, .. } => {
                serde_json::json!({ "id": id, "label": label })
            }
            _ => serde_json::Value::Null,
        }
    }
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Neo4jSettings::default().into()
    }
}

impl From<Neo4jSettings> for GraphConfig {
    fn from(s: Neo4jSettings) -> Self {
        Self {
            uri: s.uri,
            user: s.user,
            password: s.password,
            max_connections: s.max_connections,
            fetch_size: s.fetch_size,
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Constructed once at startup and handed to each component. Every call
/// borrows one pooled connection for its duration and returns it on all exit
/// paths; rows are decoded into owned records before the call returns.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Release the connection pool. Outstanding clones keep it alive until dropped.
    pub fn close(self) {
        drop(self.graph);
        tracing::info!("Neo4j client closed");
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, query: Query) -> Result<()> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    /// Execute a query returning a single `cnt` column.
    pub(crate) async fn query_count(&self, query: Query) -> Result<i64> {
        match self.query_one(query).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settings() {
        let settings = Neo4jSettings {
            uri: "bolt://graph:7687".to_string(),
            max_connections: 4,
            ..Default::default()
        };
        let config = GraphConfig::from(settings);
        assert_eq!(config.uri, "bolt://graph:7687");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.user, "neo4j");
    }

    #[test]
    fn error_kinds() {
        let nf = GraphError::NotFound {
            id: "T1".to_string(),
        };
        assert_eq!(nf.kind(), "not_found");
        assert_eq!(nf.report().details["id"], "T1");

        let conn = GraphError::Connection("refused".to_string());
        assert_eq!(conn.kind(), "query_error");
    }
}
