use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use councilmail_common::{Config, SearchHit, SearchResponse};
use custom_search_client::{CustomSearchClient, SearchItem};

use crate::extractor::render_snippet;
use crate::traits::ContentFetcher;

/// Cap on bytes read from one page. Contact details sit near the top of
/// anything worth reading.
const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

const USER_AGENT: &str = "councilmail/0.1 (councillor contact directory)";

/// Production fetcher: Google Custom Search for queries, plain HTTP GET for pages.
pub struct WebFetcher {
    search: CustomSearchClient,
    client: reqwest::Client,
}

impl WebFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            search: CustomSearchClient::new(&config.google_api_key, &config.google_cse_id),
            client,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs are fetched, got: {}", parsed.scheme());
        }

        let mut resp = self
            .client
            .get(parsed)
            .send()
            .await
            .context("Request failed")?
            .error_for_status()?;

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await.context("Failed reading body")? {
            let room = MAX_PAGE_BYTES - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= MAX_PAGE_BYTES {
                debug!(url, "Page truncated at size cap");
                break;
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Convert one search item, scanning both the rendered HTML snippet and the
/// plain one.
pub fn hit_from_item(item: SearchItem) -> SearchHit {
    let snippet = match item.html_snippet.as_deref() {
        Some(html) if !html.is_empty() => format!("{}\n{}", render_snippet(html), item.snippet),
        _ => item.snippet,
    };

    SearchHit {
        url: item.link,
        snippet,
        file_format: item.file_format.filter(|f| !f.is_empty()),
    }
}

#[async_trait]
impl ContentFetcher for WebFetcher {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let page = self
            .search
            .search(query)
            .await
            .context("Custom search request failed")?;

        Ok(match page.items {
            Some(items) if !items.is_empty() => {
                SearchResponse::Hits(items.into_iter().map(hit_from_item).collect())
            }
            _ => SearchResponse::NoResults,
        })
    }

    async fn page(&self, url: &str) -> String {
        match self.fetch_page(url).await {
            Ok(body) => {
                debug!(url, bytes = body.len(), "Fetched page");
                body
            }
            Err(e) => {
                warn!(url, error = %e, "Page fetch failed");
                String::new()
            }
        }
    }
}
