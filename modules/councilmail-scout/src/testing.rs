// Test mocks for the run engine.
//
// Two mocks matching the network-facing trait boundaries:
// - MockFetcher (ContentFetcher): HashMap-based query→response and URL→body
// - MockDatasets (DatasetSource): HashMap-based dataset→rows, or failure
//
// Storage is exercised against in-memory SQLite rather than a mock.
// Plus helpers for constructing hits, records and raw dataset rows.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use councilmail_common::{ExternalRecord, PersonRecord, SearchHit, SearchResponse};

use crate::traits::{ContentFetcher, DatasetSource};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Search fails for unregistered queries; pages are empty for unregistered URLs.
/// Builder pattern: `.on_search()`, `.on_no_results()`, `.on_page()`.
#[derive(Default)]
pub struct MockFetcher {
    searches: HashMap<String, SearchResponse>,
    pages: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.searches
            .insert(query.to_string(), SearchResponse::Hits(hits));
        self
    }

    pub fn on_no_results(mut self, query: &str) -> Self {
        self.searches
            .insert(query.to_string(), SearchResponse::NoResults);
        self
    }

    pub fn on_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    /// Every query issued so far, in issue order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Every URL fetched so far, in fetch order.
    pub fn pages_fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        self.queries.lock().unwrap().push(query.to_string());
        match self.searches.get(query) {
            Some(response) => Ok(response.clone()),
            None => bail!("MockFetcher: no search registered for {query}"),
        }
    }

    async fn page(&self, url: &str) -> String {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// MockDatasets
// ---------------------------------------------------------------------------

/// Unregistered datasets return no rows; `.failing()` ones return `Err`.
#[derive(Default)]
pub struct MockDatasets {
    rows: HashMap<String, Vec<Value>>,
    failing: HashSet<String>,
    requested: Mutex<Vec<String>>,
}

impl MockDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_rows(mut self, dataset: &str, rows: Vec<Value>) -> Self {
        self.rows.insert(dataset.to_string(), rows);
        self
    }

    pub fn failing(mut self, dataset: &str) -> Self {
        self.failing.insert(dataset.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatasetSource for MockDatasets {
    async fn rows(&self, dataset: &str) -> Result<Vec<ExternalRecord>> {
        self.requested.lock().unwrap().push(dataset.to_string());
        if self.failing.contains(dataset) {
            bail!("MockDatasets: {dataset} is unreachable");
        }
        Ok(self
            .rows
            .get(dataset)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(ExternalRecord::from)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A web-page hit with the given snippet.
pub fn hit(url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        snippet: snippet.to_string(),
        file_format: None,
    }
}

/// A searchable record with no email yet.
pub fn person(name: &str, council: &str, website: &str) -> PersonRecord {
    PersonRecord {
        councillor: name.to_string(),
        position: "Councillor".to_string(),
        council_name: council.to_string(),
        ward: String::new(),
        council_website: website.to_string(),
        email: String::new(),
    }
}

/// A dataset row as a morph-style scraper would publish it.
pub fn dataset_row(name: &str, council: &str, website: &str) -> Value {
    serde_json::json!({
        "councillor": name,
        "council_name": council,
        "council_website": website,
        "position": "Councillor",
    })
}
