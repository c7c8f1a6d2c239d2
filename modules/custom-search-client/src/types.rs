use serde::Deserialize;

/// Top-level response from `GET /customsearch/v1`.
///
/// `items` is absent (not empty) when the engine has nothing for the query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Option<Vec<SearchItem>>,
    #[serde(rename = "searchInformation", default)]
    pub search_information: Option<SearchInformation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(rename = "htmlSnippet", default)]
    pub html_snippet: Option<String>,
    /// Present for documents such as "PDF/Adobe Acrobat" or "Microsoft Word".
    #[serde(rename = "fileFormat", default)]
    pub file_format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchInformation {
    #[serde(rename = "totalResults", default)]
    pub total_results: Option<String>,
}
