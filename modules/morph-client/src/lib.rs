pub mod error;

pub use error::{MorphError, Result};

use std::time::Duration;

use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.morph.io";

/// SQL sent when the caller wants every row a scraper has stored.
pub const SELECT_ALL: &str = "select * from data";

pub struct MorphClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MorphClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Endpoint for a scraper's data, e.g. `https://api.morph.io/owner/name/data.json`.
    pub fn data_url(&self, scraper: &str) -> String {
        format!("{}/{}/data.json", self.base_url, scraper.trim_matches('/'))
    }

    /// Run a SQL query against a scraper's database and decode the rows.
    pub async fn query<T: DeserializeOwned>(&self, scraper: &str, sql: &str) -> Result<Vec<T>> {
        let url = self.data_url(scraper);
        tracing::debug!(scraper, sql, "morph.io query");

        let resp = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("query", sql)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MorphError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        let rows: Vec<T> = serde_json::from_str(&body)?;
        tracing::debug!(scraper, rows = rows.len(), "morph.io query complete");
        Ok(rows)
    }

    /// Every row a scraper has stored, loosely typed.
    pub async fn rows(&self, scraper: &str) -> Result<Vec<serde_json::Value>> {
        self.query(scraper, SELECT_ALL).await
    }
}
