use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use councilmail_common::{NoMatchPolicy, Outcome, PersonRecord, SearchResponse};

use crate::extractor::collect_emails;
use crate::matcher::best_match;
use crate::traits::ContentFetcher;

/// Outcome for a row that must not be searched, or `None` if it is eligible.
pub fn precheck(record: &PersonRecord) -> Option<Outcome> {
    if record.has_email() {
        Some(Outcome::ExistingEmail)
    } else if record.councillor.trim().is_empty() {
        Some(Outcome::NoCouncillorName)
    } else if record.council_website.trim().is_empty() {
        Some(Outcome::NoCouncilWebsite)
    } else {
        None
    }
}

/// Website reduced to what a `site:` qualifier accepts: no scheme, no trailing slash.
pub fn site_domain(website: &str) -> &str {
    let website = website.trim();
    website
        .strip_prefix("https://")
        .or_else(|| website.strip_prefix("http://"))
        .unwrap_or(website)
        .trim_end_matches('/')
}

pub fn search_query(record: &PersonRecord) -> String {
    format!(
        "site:{} {}",
        site_domain(&record.council_website),
        record.councillor.trim()
    )
}

/// Resolves one row: search, scan snippets and pages, score.
pub struct Resolver {
    fetcher: Arc<dyn ContentFetcher>,
    page_fetch_limit: usize,
    policy: NoMatchPolicy,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, page_fetch_limit: usize, policy: NoMatchPolicy) -> Self {
        Self {
            fetcher,
            page_fetch_limit,
            policy,
        }
    }

    pub async fn resolve(&self, record: &PersonRecord) -> Outcome {
        if let Some(outcome) = precheck(record) {
            return outcome;
        }

        let query = search_query(record);
        let hits = match self.fetcher.search(&query).await {
            Ok(SearchResponse::Hits(hits)) if !hits.is_empty() => hits,
            Ok(SearchResponse::Hits(_) | SearchResponse::NoResults) => {
                warn!(query = query.as_str(), "Search returned no results");
                return Outcome::NoSearchResults;
            }
            Err(e) => {
                warn!(query = query.as_str(), error = %e, "Search failed");
                return Outcome::ErrorDuringSearch;
            }
        };

        let mut candidates = BTreeSet::new();
        for (rank, hit) in hits.iter().enumerate() {
            collect_emails(&hit.snippet, &mut candidates);

            if let Some(format) = &hit.file_format {
                debug!(url = hit.url.as_str(), format = format.as_str(), "Skipping document result");
                continue;
            }
            if rank >= self.page_fetch_limit {
                continue;
            }

            let body = self.fetcher.page(&hit.url).await;
            collect_emails(&body, &mut candidates);
        }

        debug!(query = query.as_str(), candidates = candidates.len(), "Scoring candidates");
        best_match(&record.councillor, &candidates, self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hit, MockFetcher};

    fn jane() -> PersonRecord {
        PersonRecord {
            councillor: "Jane Smith".into(),
            position: "Councillor".into(),
            council_name: "Springfield City Council".into(),
            ward: "North".into(),
            council_website: "https://www.springfield.gov.au/".into(),
            email: String::new(),
        }
    }

    const JANE_QUERY: &str = "site:www.springfield.gov.au Jane Smith";

    fn resolver(fetcher: MockFetcher) -> (Resolver, Arc<MockFetcher>) {
        let fetcher = Arc::new(fetcher);
        (
            Resolver::new(fetcher.clone(), 2, NoMatchPolicy::Surface),
            fetcher,
        )
    }

    #[test]
    fn site_domain_strips_scheme_and_slash() {
        assert_eq!(site_domain("https://www.springfield.gov.au/"), "www.springfield.gov.au");
        assert_eq!(site_domain("http://springfield.gov.au"), "springfield.gov.au");
        assert_eq!(site_domain("springfield.gov.au/council/"), "springfield.gov.au/council");
    }

    #[test]
    fn query_scopes_search_to_website() {
        assert_eq!(search_query(&jane()), JANE_QUERY);
    }

    #[test]
    fn precheck_order() {
        let mut record = jane();
        assert_eq!(precheck(&record), None);

        record.council_website.clear();
        assert_eq!(precheck(&record), Some(Outcome::NoCouncilWebsite));

        record.councillor = "  ".into();
        assert_eq!(precheck(&record), Some(Outcome::NoCouncillorName));

        record.email = "none".into();
        assert_eq!(precheck(&record), Some(Outcome::ExistingEmail));
    }

    #[tokio::test]
    async fn whitespace_email_is_searched() {
        let (resolver, fetcher) = resolver(MockFetcher::new().on_no_results(JANE_QUERY));
        let mut record = jane();
        record.email = "  ".into();

        assert_eq!(precheck(&record), None);
        assert_eq!(resolver.resolve(&record).await, Outcome::NoSearchResults);
        assert_eq!(fetcher.queries(), vec![JANE_QUERY]);
    }

    #[tokio::test]
    async fn existing_email_is_not_searched() {
        let (resolver, fetcher) = resolver(MockFetcher::new());
        let mut record = jane();
        record.email = "jane@springfield.gov.au".into();

        assert_eq!(resolver.resolve(&record).await, Outcome::ExistingEmail);
        assert!(fetcher.queries().is_empty());
    }

    #[tokio::test]
    async fn email_in_snippet_resolves() {
        let (resolver, _) = resolver(MockFetcher::new().on_search(
            JANE_QUERY,
            vec![hit("https://www.springfield.gov.au/cr-smith", "Email jane.smith@springfield.gov.au")],
        ));

        assert_eq!(
            resolver.resolve(&jane()).await,
            Outcome::Email("jane.smith@springfield.gov.au".into())
        );
    }

    #[tokio::test]
    async fn email_in_page_body_resolves() {
        let (resolver, fetcher) = resolver(
            MockFetcher::new()
                .on_search(JANE_QUERY, vec![hit("https://www.springfield.gov.au/cr-smith", "Cr Jane Smith")])
                .on_page(
                    "https://www.springfield.gov.au/cr-smith",
                    r#"<a href="mailto:jsmith@springfield.gov.au">Email</a> info@springfield.gov.au"#,
                ),
        );

        assert_eq!(
            resolver.resolve(&jane()).await,
            Outcome::Email("jsmith@springfield.gov.au".into())
        );
        assert_eq!(fetcher.pages_fetched(), vec!["https://www.springfield.gov.au/cr-smith"]);
    }

    #[tokio::test]
    async fn document_results_are_not_fetched() {
        let mut doc = hit("https://www.springfield.gov.au/minutes.pdf", "Minutes");
        doc.file_format = Some("PDF/Adobe Acrobat".into());

        let (resolver, fetcher) = resolver(
            MockFetcher::new()
                .on_search(JANE_QUERY, vec![doc])
                .on_page("https://www.springfield.gov.au/minutes.pdf", "jane.smith@springfield.gov.au"),
        );

        assert_eq!(resolver.resolve(&jane()).await, Outcome::NoEmailFound);
        assert!(fetcher.pages_fetched().is_empty());
    }

    #[tokio::test]
    async fn only_first_results_are_fetched() {
        let (resolver, fetcher) = resolver(
            MockFetcher::new()
                .on_search(
                    JANE_QUERY,
                    vec![
                        hit("https://www.springfield.gov.au/a", ""),
                        hit("https://www.springfield.gov.au/b", ""),
                        hit("https://www.springfield.gov.au/c", "c@springfield.gov.au"),
                    ],
                )
                .on_page("https://www.springfield.gov.au/c", "jane.smith@springfield.gov.au"),
        );

        // Page c is past the fetch limit, but its snippet still counts.
        assert_eq!(
            resolver.resolve(&jane()).await,
            Outcome::NoMatchingEmail("c@springfield.gov.au".into())
        );
        assert_eq!(
            fetcher.pages_fetched(),
            vec!["https://www.springfield.gov.au/a", "https://www.springfield.gov.au/b"]
        );
    }

    #[tokio::test]
    async fn nothing_found_is_no_email_found() {
        let (resolver, _) = resolver(
            MockFetcher::new().on_search(JANE_QUERY, vec![hit("https://www.springfield.gov.au/", "Welcome")]),
        );
        assert_eq!(resolver.resolve(&jane()).await, Outcome::NoEmailFound);
    }

    #[tokio::test]
    async fn empty_search_response_is_no_search_results() {
        let (resolver, _) = resolver(MockFetcher::new().on_no_results(JANE_QUERY));
        assert_eq!(resolver.resolve(&jane()).await, Outcome::NoSearchResults);
    }

    #[tokio::test]
    async fn empty_hit_list_is_no_search_results() {
        let (resolver, fetcher) = resolver(MockFetcher::new().on_search(JANE_QUERY, vec![]));

        let outcome = resolver.resolve(&jane()).await;

        assert_eq!(outcome, Outcome::NoSearchResults);
        assert_eq!(outcome.persisted_email(), None);
        assert!(fetcher.pages_fetched().is_empty());
    }

    #[tokio::test]
    async fn search_failure_is_error_during_search() {
        let (resolver, fetcher) = resolver(MockFetcher::new());
        assert_eq!(resolver.resolve(&jane()).await, Outcome::ErrorDuringSearch);
        assert_eq!(fetcher.queries(), vec![JANE_QUERY]);
    }
}
