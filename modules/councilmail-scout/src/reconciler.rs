//! Merges external dataset rows into the known set.
//!
//! A row is new when its identity key is neither already stored nor already
//! admitted earlier in the same pass. New rows are normalized through the
//! field-precedence table and keep their source order, batches in listed order.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use councilmail_common::{identity_key, ExternalRecord, PersonRecord};

use crate::traits::DatasetSource;

/// Identity keys seen so far in a reconciliation pass.
#[derive(Debug, Default)]
pub struct KnownKeys(HashSet<String>);

impl KnownKeys {
    pub fn from_records(records: &[PersonRecord]) -> Self {
        Self(records.iter().map(identity_key).collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Admit the unseen rows of one batch, recording their keys.
    pub fn admit(&mut self, batch: &[ExternalRecord]) -> Vec<PersonRecord> {
        batch
            .iter()
            .filter(|record| self.0.insert(identity_key(*record)))
            .map(PersonRecord::from_external)
            .collect()
    }
}

/// Rows from `batches` whose identity is not in `known`, each at most once.
pub fn reconcile(known: &[PersonRecord], batches: &[Vec<ExternalRecord>]) -> Vec<PersonRecord> {
    let mut keys = KnownKeys::from_records(known);
    batches.iter().flat_map(|batch| keys.admit(batch)).collect()
}

/// What one dataset contributed to a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPull {
    pub dataset: String,
    pub fetched: usize,
    pub added: usize,
    pub failed: bool,
}

/// Stats from a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub datasets: Vec<DatasetPull>,
    pub inserted: usize,
}

impl fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Reconciliation Complete ===")?;
        for pull in &self.datasets {
            if pull.failed {
                writeln!(f, "  {}: failed", pull.dataset)?;
            } else {
                writeln!(f, "  {}: {} rows, {} new", pull.dataset, pull.fetched, pull.added)?;
            }
        }
        writeln!(f, "New rows merged: {}", self.inserted)
    }
}

/// Pull every dataset in order and merge the unseen rows.
///
/// A dataset that cannot be fetched contributes nothing; the others still merge.
pub async fn pull_and_reconcile(
    known: &[PersonRecord],
    source: &dyn DatasetSource,
    datasets: &[String],
) -> (Vec<PersonRecord>, ReconcileStats) {
    let mut keys = KnownKeys::from_records(known);
    let mut inserts = Vec::new();
    let mut stats = ReconcileStats::default();

    for dataset in datasets {
        let pull = match source.rows(dataset).await {
            Ok(rows) => {
                let added = keys.admit(&rows);
                info!(dataset = dataset.as_str(), fetched = rows.len(), added = added.len(), "Dataset reconciled");
                let pull = DatasetPull {
                    dataset: dataset.clone(),
                    fetched: rows.len(),
                    added: added.len(),
                    failed: false,
                };
                inserts.extend(added);
                pull
            }
            Err(e) => {
                warn!(dataset = dataset.as_str(), error = %e, "Dataset fetch failed, skipping");
                DatasetPull {
                    dataset: dataset.clone(),
                    fetched: 0,
                    added: 0,
                    failed: true,
                }
            }
        };
        stats.datasets.push(pull);
    }

    stats.inserted = inserts.len();
    (inserts, stats)
}
