// Collaborator boundaries for a run.
//
// ContentFetcher: web search plus raw page fetches.
// DatasetSource: external person datasets.
// RecordStore: the councillor table.
//
// Mocks for the first two live in `testing`; store tests use in-memory SQLite.

use anyhow::{Context, Result};
use async_trait::async_trait;

use councilmail_common::{ExternalRecord, PersonRecord, SearchResponse};
use councilmail_store::{SqliteStore, WriteBatch};
use morph_client::MorphClient;

// ---------------------------------------------------------------------------
// ContentFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Run a free-text search. `Err` means the request itself failed.
    async fn search(&self, query: &str) -> Result<SearchResponse>;

    /// Raw page body. Empty on any failure; never errors.
    async fn page(&self, url: &str) -> String;
}

// ---------------------------------------------------------------------------
// DatasetSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Every row of one external dataset.
    async fn rows(&self, dataset: &str) -> Result<Vec<ExternalRecord>>;
}

#[async_trait]
impl DatasetSource for MorphClient {
    async fn rows(&self, dataset: &str) -> Result<Vec<ExternalRecord>> {
        let rows = MorphClient::rows(self, dataset)
            .await
            .with_context(|| format!("Failed to fetch dataset {dataset}"))?;
        Ok(rows.into_iter().map(ExternalRecord::from).collect())
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All rows, in position order.
    async fn read_all(&self) -> Result<Vec<PersonRecord>>;

    /// Apply a run's writes as one unit.
    async fn commit(&self, batch: &WriteBatch) -> Result<()>;
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn read_all(&self) -> Result<Vec<PersonRecord>> {
        Ok(SqliteStore::read_all(self).await?)
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        Ok(SqliteStore::commit(self, batch).await?)
    }
}
