// Run scheduler.
//
// One run: read the known set, pre-check every row, resolve eligible rows up
// to the search budget, or reconcile external datasets when nothing is
// eligible. All writes go out as a single batch at the end; a run that dies
// midway leaves the store as it found it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use councilmail_common::{identity_key, Config, DispatchPolicy, Outcome, PersonRecord};
use councilmail_store::{Resolution, WriteBatch};

use crate::reconciler::{pull_and_reconcile, ReconcileStats};
use crate::resolver::{precheck, Resolver};
use crate::traits::{ContentFetcher, DatasetSource, RecordStore};

/// Stats from a run that resolved rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub rows: usize,
    pub eligible: usize,
    pub searched: usize,
    /// A search came back structurally empty and no further searches were issued.
    pub halted: bool,
    /// Eligible rows were left over when the budget ran out.
    pub budget_exhausted: bool,
    pub by_outcome: BTreeMap<&'static str, usize>,
}

impl ResolveStats {
    fn record(&mut self, outcome: &Outcome) {
        *self.by_outcome.entry(outcome.label()).or_default() += 1;
        if outcome.searched() {
            self.searched += 1;
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.by_outcome.get(label).copied().unwrap_or(0)
    }
}

impl fmt::Display for ResolveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Resolution Complete ===")?;
        writeln!(f, "Rows:      {}", self.rows)?;
        writeln!(f, "Eligible:  {}", self.eligible)?;
        writeln!(f, "Searched:  {}", self.searched)?;
        if self.halted {
            writeln!(f, "Halted early: search returned no results")?;
        } else if self.budget_exhausted {
            writeln!(f, "Search budget exhausted")?;
        }
        writeln!(f, "\nBy outcome:")?;
        for (label, count) in &self.by_outcome {
            writeln!(f, "  {label}: {count}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSummary {
    Resolved(ResolveStats),
    Reconciled(ReconcileStats),
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// False on a dry run.
    pub committed: bool,
    pub summary: RunSummary,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.summary {
            RunSummary::Resolved(stats) => write!(f, "{stats}")?,
            RunSummary::Reconciled(stats) => write!(f, "{stats}")?,
        }
        writeln!(f, "Run id: {}", self.run_id)?;
        if !self.committed {
            writeln!(f, "Dry run: nothing written")?;
        }
        Ok(())
    }
}

pub struct Scheduler {
    store: Arc<dyn RecordStore>,
    datasets: Arc<dyn DatasetSource>,
    resolver: Resolver,
    dataset_ids: Vec<String>,
    search_budget: usize,
    dispatch: DispatchPolicy,
    dry_run: bool,
}

impl Scheduler {
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn ContentFetcher>,
        datasets: Arc<dyn DatasetSource>,
    ) -> Self {
        Self {
            store,
            datasets,
            resolver: Resolver::new(fetcher, config.page_fetch_limit, config.no_match_policy),
            dataset_ids: config.datasets.clone(),
            search_budget: config.search_budget,
            dispatch: config.dispatch,
            dry_run: false,
        }
    }

    /// Do everything except the final write.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunReport> {
        let records = self
            .store
            .read_all()
            .await
            .context("Failed to read stored records")?;
        info!(rows = records.len(), "Loaded known set");

        let mut batch = WriteBatch::new(run_id);
        let mut stats = ResolveStats {
            rows: records.len(),
            ..Default::default()
        };

        let mut eligible = Vec::new();
        for (position, record) in records.iter().enumerate() {
            match precheck(record) {
                Some(outcome) => {
                    report_row(position, record, &outcome);
                    stats.record(&outcome);
                    if outcome != Outcome::ExistingEmail {
                        batch.resolutions.push(resolution(position, record, outcome));
                    }
                }
                None => eligible.push(position),
            }
        }
        stats.eligible = eligible.len();

        let summary = if eligible.is_empty() {
            info!(datasets = self.dataset_ids.len(), "No rows eligible for search, reconciling datasets");
            let (inserts, reconciled) =
                pull_and_reconcile(&records, self.datasets.as_ref(), &self.dataset_ids).await;
            batch.inserts = inserts;
            RunSummary::Reconciled(reconciled)
        } else {
            let outcomes = match self.dispatch {
                DispatchPolicy::Sequential => self.resolve_sequential(&records, &eligible).await,
                DispatchPolicy::FanOut { limit } => {
                    self.resolve_fan_out(&records, &eligible, limit).await
                }
            };

            for (position, outcome) in outcomes {
                let record = &records[position];
                report_row(position, record, &outcome);
                stats.record(&outcome);
                if outcome == Outcome::NoSearchResults {
                    stats.halted = true;
                }
                batch.resolutions.push(resolution(position, record, outcome));
            }
            stats.budget_exhausted = !stats.halted && stats.searched < eligible.len();
            if stats.halted {
                warn!("Search returned no results; stopped issuing searches for this run");
            }
            RunSummary::Resolved(stats)
        };

        if self.dry_run {
            info!(
                resolutions = batch.resolutions.len(),
                inserts = batch.inserts.len(),
                "Dry run, skipping commit"
            );
        } else {
            self.store
                .commit(&batch)
                .await
                .context("Failed to commit run")?;
        }

        Ok(RunReport {
            run_id,
            committed: !self.dry_run,
            summary,
        })
    }

    /// One row at a time, stopping at the budget or the first empty search.
    async fn resolve_sequential(
        &self,
        records: &[PersonRecord],
        eligible: &[usize],
    ) -> Vec<(usize, Outcome)> {
        let mut outcomes = Vec::new();
        for &position in eligible.iter().take(self.search_budget) {
            let outcome = self.resolver.resolve(&records[position]).await;
            let stop = outcome == Outcome::NoSearchResults;
            outcomes.push((position, outcome));
            if stop {
                break;
            }
        }
        outcomes
    }

    /// Up to `limit` rows in flight. An empty search stops rows that have not
    /// started yet; rows already in flight finish. Results come back in
    /// position order.
    async fn resolve_fan_out(
        &self,
        records: &[PersonRecord],
        eligible: &[usize],
        limit: usize,
    ) -> Vec<(usize, Outcome)> {
        let halt = AtomicBool::new(false);
        let halt = &halt;
        let resolver = &self.resolver;

        let mut outcomes: Vec<(usize, Outcome)> = stream::iter(eligible.iter().take(self.search_budget))
            .map(move |&position| async move {
                if halt.load(Ordering::Acquire) {
                    return None;
                }
                let outcome = resolver.resolve(&records[position]).await;
                if outcome == Outcome::NoSearchResults {
                    halt.store(true, Ordering::Release);
                }
                Some((position, outcome))
            })
            .buffer_unordered(limit.max(1))
            .filter_map(futures::future::ready)
            .collect()
            .await;

        outcomes.sort_by_key(|(position, _)| *position);
        outcomes
    }
}

fn resolution(position: usize, record: &PersonRecord, outcome: Outcome) -> Resolution {
    Resolution {
        position,
        identity_key: identity_key(record),
        outcome,
    }
}

fn report_row(position: usize, record: &PersonRecord, outcome: &Outcome) {
    info!(
        position,
        councillor = record.councillor.as_str(),
        council = record.council_name.as_str(),
        outcome = %outcome,
        "Row resolved"
    );
}
