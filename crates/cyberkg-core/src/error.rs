use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors shared by every cyberkg crate.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for CoreError {
    fn from(e: config::ConfigError) -> Self {
        CoreError::Config(e.to_string())
    }
}

/// Errors that can be reported to a caller as a structured failure.
pub trait Reportable: std::fmt::Display {
    /// Machine-readable error kind, e.g. `cycle_detected`.
    fn kind(&self) -> &'static str;

    /// Extra structured data for diagnosis.
    fn details(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// Structured failure payload emitted by the CLIs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl ErrorReport {
    /// Write the report as one JSON line on stdout.
    pub fn emit(&self) -> Result<(), CoreError> {
        println!("{}", serde_json::to_string(self)?);
        Ok(())
    }
}

/// A failure already converted to its report. Binaries collect every
/// `Reportable` error into this so they can emit one payload shape.
#[derive(Debug)]
pub struct Failure(pub ErrorReport);

impl<E: Reportable> From<E> for Failure {
    fn from(err: E) -> Self {
        Failure(err.report())
    }
}

impl Reportable for CoreError {
    fn kind(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "config_error",
            CoreError::Serialization(_) => "serialization_error",
            CoreError::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omits_null_details() {
        let report = CoreError::Config("missing neo4j.uri".to_string()).report();
        assert_eq!(report.kind, "config_error");

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains("missing neo4j.uri"));
    }

    #[test]
    fn failure_carries_kind() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let Failure(report) = Failure::from(CoreError::from(err));
        assert_eq!(report.kind, "serialization_error");
    }
}
