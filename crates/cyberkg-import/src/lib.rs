//! cyberkg-import: loads ATT&CK bundles into the knowledge graph.
//!
//! Parses a bundle, writes technique and tactic nodes in concurrent
//! batches, then links techniques to tactics through kill-chain phases.

pub mod bundle;
pub mod config;
pub mod error;
pub mod importer;

pub use config::ImportConfig;
pub use error::{ImportError, Result};
pub use importer::{BundleImporter, ImportReport};
