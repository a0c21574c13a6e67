//! cyberkg-graph: storage access for the ATT&CK knowledge graph.
//!
//! Everything that touches the graph goes through the [`GraphStore`]
//! trait. [`GraphClient`] implements it over Neo4j, [`MemoryGraphStore`]
//! in process. The [`QueryGateway`] layers bounded reads, node edits and
//! prerequisite resolution on top and hands back JSON-ready DTOs.

pub mod client;
pub mod gateway;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use gateway::{
    EdgeDto, GraphStats, NodeDto, NodeTypes, NodeUpdate, QueryGateway, SubgraphDto, TypeSource,
    WorkingSet,
};
pub use memory::MemoryGraphStore;
pub use store::{
    EdgeBatchOutcome, GraphStore, NodeRecord, Pattern, PatternRow, RelationRecord, TypeCatalog,
};
