//! cyberkg-core: Shared types, configuration, and error handling for cyberkg.
//!
//! This crate provides the foundational pieces used across all cyberkg crates:
//! - Node labels and edge types for the ATT&CK knowledge graph
//! - Flattened `Technique` / `Tactic` node shapes
//! - Node identity resolution (business id with internal-id fallback)
//! - Layered configuration loading
//! - The structured error payload every CLI emits

pub mod config;
pub mod error;
pub mod types;

pub use error::{CoreError, ErrorReport, Failure, Reportable};
pub use types::{EdgeType, NodeLabel, PropertyMap, Tactic, Technique};
