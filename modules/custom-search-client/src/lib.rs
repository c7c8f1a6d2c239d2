pub mod error;
pub mod types;

pub use error::{Result, SearchError};
pub use types::{SearchInformation, SearchItem, SearchPage};

use std::time::Duration;

const BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

pub struct CustomSearchClient {
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
}

impl CustomSearchClient {
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        }
    }

    /// Run one query and return the first page of results.
    pub async fn search(&self, query: &str) -> Result<SearchPage> {
        tracing::info!(query, "Custom search");

        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        let page: SearchPage = serde_json::from_str(&body)?;

        tracing::info!(
            query,
            count = page.items.as_ref().map_or(0, Vec::len),
            "Custom search complete"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_items_decodes_as_none() {
        let page: SearchPage =
            serde_json::from_str(r#"{"searchInformation": {"totalResults": "0"}}"#).unwrap();
        assert!(page.items.is_none());
        assert_eq!(
            page.search_information.and_then(|s| s.total_results).as_deref(),
            Some("0")
        );
    }

    #[test]
    fn items_decode_with_optional_fields() {
        let page: SearchPage = serde_json::from_str(
            r#"{
                "items": [
                    {
                        "link": "https://council.gov.au/councillors",
                        "snippet": "Contact Cr Jane Smith",
                        "htmlSnippet": "Contact Cr <b>Jane Smith</b>"
                    },
                    {
                        "link": "https://council.gov.au/minutes.pdf",
                        "snippet": "Minutes",
                        "fileFormat": "PDF/Adobe Acrobat"
                    }
                ]
            }"#,
        )
        .unwrap();

        let items = page.items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].html_snippet.as_deref(), Some("Contact Cr <b>Jane Smith</b>"));
        assert!(items[0].file_format.is_none());
        assert_eq!(items[1].file_format.as_deref(), Some("PDF/Adobe Acrobat"));
        assert_eq!(items[1].title, "");
    }
}
