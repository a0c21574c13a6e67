//! Bundle import pipeline: parse → node batches → barrier → tactic edges.
//!
//! Node batches are independent write calls dispatched as tokio tasks and
//! bounded by a semaphore. A failed batch aborts the run but does not roll
//! back batches already acknowledged. Every node task is joined before any
//! edge is written.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use cyberkg_core::{EdgeType, NodeLabel, PropertyMap};
use cyberkg_graph::store::EdgeBatch;
use cyberkg_graph::{GraphStats, GraphStore, QueryGateway};

use crate::bundle::{AttackPattern, Bundle, MitreTactic};
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};

/// Summary of one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub bundle: String,
    pub techniques: usize,
    pub tactics: usize,
    pub ignored_objects: usize,
    pub technique_batches: usize,
    pub tactic_batches: usize,
    /// Distinct technique→tactic pairs sent to the store.
    pub edges_requested: usize,
    /// Relationships written. Exceeds `edges_requested` when a business id
    /// is shared by several nodes.
    pub edges_created: usize,
    /// Requested pairs with an endpoint that did not resolve.
    pub edges_skipped: usize,
    pub unmatched_phases: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Technique→tactic pairs derived from kill-chain phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TacticLinks {
    /// Distinct `(technique_id, tactic_id)` pairs in bundle order.
    pub pairs: Vec<(String, String)>,
    /// Phases under the configured kill chain with no matching tactic.
    pub unmatched_phases: usize,
}

/// Join technique kill-chain phases to tactic shortnames.
pub fn link_tactics(
    techniques: &[AttackPattern],
    tactics: &[MitreTactic],
    kill_chain_name: &str,
) -> TacticLinks {
    let by_shortname: HashMap<&str, &str> = tactics
        .iter()
        .filter(|t| !t.shortname().is_empty())
        .map(|t| (t.shortname(), t.id.as_str()))
        .collect();

    let mut links = TacticLinks::default();
    let mut seen = HashSet::new();
    for technique in techniques {
        for phase in technique.phases(kill_chain_name) {
            match by_shortname.get(phase) {
                Some(tactic_id) => {
                    let pair = (technique.id.clone(), (*tactic_id).to_string());
                    if seen.insert(pair.clone()) {
                        links.pairs.push(pair);
                    }
                }
                None => links.unmatched_phases += 1,
            }
        }
    }
    links
}

/// Loads bundles into a graph store.
pub struct BundleImporter<S: GraphStore + ?Sized + 'static> {
    store: Arc<S>,
    config: ImportConfig,
    run_lock: Mutex<()>,
}

impl<S: GraphStore + ?Sized + 'static> BundleImporter<S> {
    pub fn new(store: Arc<S>, config: ImportConfig) -> Self {
        Self {
            store,
            config: config.normalized(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Remove every node and edge. Returns the number of nodes removed.
    pub async fn clear(&self) -> Result<u64> {
        let _run = self.run_lock.lock().await;
        self.clear_store().await
    }

    /// Import techniques, tactics and BELONGS_TO edges from a bundle file.
    pub async fn import_core(&self, bundle_path: &Path) -> Result<ImportReport> {
        let _run = self.run_lock.lock().await;
        self.import_bundle(bundle_path).await
    }

    /// Clear the store and import, holding the run lock throughout.
    pub async fn clear_and_import(&self, bundle_path: &Path) -> Result<ImportReport> {
        let _run = self.run_lock.lock().await;
        self.clear_store().await?;
        self.import_bundle(bundle_path).await
    }

    /// Count what is currently in the store.
    pub async fn verify(&self) -> Result<GraphStats> {
        let stats = QueryGateway::new(Arc::clone(&self.store)).stats().await?;
        tracing::info!(
            techniques = stats.techniques,
            tactics = stats.tactics,
            belongs_to = stats.belongs_to,
            relations = stats.relations,
            "Graph verified"
        );
        Ok(stats)
    }

    async fn clear_store(&self) -> Result<u64> {
        let removed = self.store.clear().await?;
        tracing::info!(removed, "Store cleared");
        Ok(removed)
    }

    async fn import_bundle(&self, bundle_path: &Path) -> Result<ImportReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, bundle = %bundle_path.display(), "Import started");

        let bundle = Bundle::from_path(bundle_path)?;

        if self.config.require_empty_store {
            let nodes = self.store.count_nodes(None).await?;
            if nodes > 0 {
                return Err(ImportError::StoreNotEmpty { nodes });
            }
        }

        let (techniques, tactics, ignored_objects) = bundle.partition();
        tracing::info!(
            techniques = techniques.len(),
            tactics = tactics.len(),
            ignored = ignored_objects,
            "Bundle parsed"
        );

        let max_len = self.config.max_text_len;
        let technique_rows: Vec<PropertyMap> = techniques
            .iter()
            .map(|t| t.to_technique(max_len).into_properties())
            .collect();
        let tactic_rows: Vec<PropertyMap> = tactics
            .iter()
            .map(|t| t.to_tactic(max_len).into_properties())
            .collect();

        let technique_batches = self.write_nodes(NodeLabel::Technique, technique_rows).await?;
        let tactic_batches = self.write_nodes(NodeLabel::Tactic, tactic_rows).await?;

        let links = link_tactics(&techniques, &tactics, &self.config.kill_chain_name);
        let edges_requested = links.pairs.len();
        let outcome = self
            .store
            .create_edges_batch(&EdgeBatch {
                rel_type: EdgeType::BelongsTo,
                source_label: NodeLabel::Technique,
                target_label: NodeLabel::Tactic,
                pairs: links.pairs,
            })
            .await?;
        let edges_created = outcome.created;
        let edges_skipped = edges_requested.saturating_sub(outcome.matched_pairs);
        if edges_skipped > 0 || links.unmatched_phases > 0 {
            tracing::warn!(
                edges_skipped,
                unmatched_phases = links.unmatched_phases,
                "Some technique-tactic links could not be resolved"
            );
        }

        let completed_at = Utc::now();
        let report = ImportReport {
            run_id,
            bundle: bundle_path.display().to_string(),
            techniques: techniques.len(),
            tactics: tactics.len(),
            ignored_objects,
            technique_batches,
            tactic_batches,
            edges_requested,
            edges_created,
            edges_skipped,
            unmatched_phases: links.unmatched_phases,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        };

        tracing::info!(
            %run_id,
            techniques = report.techniques,
            tactics = report.tactics,
            edges_created,
            duration_ms = report.duration_ms,
            "Import complete"
        );
        Ok(report)
    }

    /// Write `rows` in fixed-size batches. Returns the number of batches.
    ///
    /// Returns only once every spawned batch task has finished, successful
    /// or not. The first failure (in batch order) is reported.
    async fn write_nodes(&self, label: NodeLabel, rows: Vec<PropertyMap>) -> Result<usize> {
        let total = rows.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches));
        let mut handles = Vec::new();

        for (batch, chunk) in rows.chunks(self.config.batch_size).enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| ImportError::Task(e.to_string()))?;
            let store = Arc::clone(&self.store);
            let chunk = chunk.to_vec();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = store.create_nodes_batch(label.as_str(), &chunk).await;
                (batch, chunk.len(), result)
            }));
        }

        let batches = handles.len();
        let mut written = 0;
        let mut failure: Option<ImportError> = None;
        for handle in handles {
            match handle.await {
                Ok((batch, size, Ok(created))) => {
                    written += created;
                    tracing::info!(%label, batch, size, written, total, "Node batch committed");
                }
                Ok((batch, _, Err(source))) => {
                    tracing::error!(%label, batch, error = %source, "Node batch failed");
                    failure.get_or_insert(ImportError::BatchFailed {
                        label: label.to_string(),
                        batch,
                        source,
                    });
                }
                Err(e) => {
                    tracing::error!(%label, error = %e, "Node batch task panicked");
                    failure.get_or_insert(ImportError::Task(e.to_string()));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(batches),
        }
    }
}
