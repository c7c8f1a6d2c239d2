use std::env;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

static DATASET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_/-]+$").unwrap());

const DEFAULT_DATABASE_URL: &str = "sqlite:data.sqlite";
const DEFAULT_MORPH_BASE_URL: &str = "https://api.morph.io";
const DEFAULT_SEARCH_BUDGET: usize = 90;
const DEFAULT_PAGE_FETCH_LIMIT: usize = 5;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// What to do when no candidate's local-part contains the person's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoMatchPolicy {
    /// Report `no-email-found` and drop the candidates.
    Discard,
    /// Keep the closest candidate as a `no-matching-email` outcome.
    #[default]
    Surface,
}

impl FromStr for NoMatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(NoMatchPolicy::Discard),
            "surface" => Ok(NoMatchPolicy::Surface),
            other => Err(format!("expected `discard` or `surface`, got `{other}`")),
        }
    }
}

/// How eligible rows are dispatched to the search collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// One row fully resolved before the next starts.
    #[default]
    Sequential,
    /// Up to `limit` rows in flight at once.
    FanOut { limit: usize },
}

impl FromStr for DispatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "sequential" {
            return Ok(DispatchPolicy::Sequential);
        }
        let Some(limit) = s.strip_prefix("fan-out:") else {
            return Err(format!("expected `sequential` or `fan-out:<n>`, got `{s}`"));
        };
        match limit.parse::<usize>() {
            Ok(limit) if limit > 0 => Ok(DispatchPolicy::FanOut { limit }),
            _ => Err(format!("fan-out limit must be a positive integer, got `{limit}`")),
        }
    }
}

/// Run configuration, built once at process entry and handed to the scheduler.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,

    // External datasets
    pub morph_api_key: String,
    pub morph_base_url: String,
    pub datasets: Vec<String>,

    // Search
    pub google_api_key: String,
    pub google_cse_id: String,

    // Run limits
    pub search_budget: usize,
    pub page_fetch_limit: usize,
    pub fetch_timeout_secs: u64,

    // Policies
    pub no_match_policy: NoMatchPolicy,
    pub dispatch: DispatchPolicy,
}

impl Config {
    /// Load configuration from the environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            morph_api_key: required("MORPH_API_KEY")?,
            morph_base_url: get("MORPH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MORPH_BASE_URL.to_string()),
            datasets: parse_dataset_list(&get("MORPH_SCRAPERS").unwrap_or_default()),
            google_api_key: required("GOOGLE_API_KEY")?,
            google_cse_id: required("GOOGLE_CSE_ID")?,
            search_budget: parse_or("SEARCH_BUDGET", get("SEARCH_BUDGET"), DEFAULT_SEARCH_BUDGET)?,
            page_fetch_limit: parse_or(
                "PAGE_FETCH_LIMIT",
                get("PAGE_FETCH_LIMIT"),
                DEFAULT_PAGE_FETCH_LIMIT,
            )?,
            fetch_timeout_secs: parse_or(
                "FETCH_TIMEOUT_SECS",
                get("FETCH_TIMEOUT_SECS"),
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?,
            no_match_policy: parse_or("NO_MATCH_POLICY", get("NO_MATCH_POLICY"), NoMatchPolicy::default())?,
            dispatch: parse_or("DISPATCH", get("DISPATCH"), DispatchPolicy::default())?,
        })
    }

    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(4).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", self.database_url);
        tracing::info!("  MORPH_API_KEY: {}", preview(&self.morph_api_key));
        tracing::info!("  MORPH_SCRAPERS: {} dataset(s)", self.datasets.len());
        tracing::info!("  GOOGLE_API_KEY: {}", preview(&self.google_api_key));
        tracing::info!("  GOOGLE_CSE_ID: {}", preview(&self.google_cse_id));
        tracing::info!(
            search_budget = self.search_budget,
            page_fetch_limit = self.page_fetch_limit,
            no_match_policy = ?self.no_match_policy,
            dispatch = ?self.dispatch,
            "  Run limits"
        );
    }
}

/// Split a dataset list on commas and whitespace. Identifiers outside
/// `[A-Za-z0-9_/-]` are dropped without error.
pub fn parse_dataset_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let ok = DATASET_ID_RE.is_match(s);
            if !ok {
                tracing::debug!(dataset = s, "Dropping dataset identifier with invalid characters");
            }
            ok
        })
        .map(String::from)
        .collect()
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("MORPH_API_KEY", "morph-secret"),
        ("GOOGLE_API_KEY", "google-secret"),
        ("GOOGLE_CSE_ID", "cse-123"),
    ];

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.database_url, "sqlite:data.sqlite");
        assert_eq!(config.morph_base_url, "https://api.morph.io");
        assert!(config.datasets.is_empty());
        assert_eq!(config.search_budget, 90);
        assert_eq!(config.page_fetch_limit, 5);
        assert_eq!(config.no_match_policy, NoMatchPolicy::Surface);
        assert_eq!(config.dispatch, DispatchPolicy::Sequential);
    }

    #[test]
    fn missing_credential_is_an_error() {
        let err = Config::from_lookup(lookup(&[("MORPH_API_KEY", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GOOGLE_API_KEY")));
    }

    #[test]
    fn invalid_number_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SEARCH_BUDGET", "lots"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SEARCH_BUDGET", .. }));
    }

    #[test]
    fn policies_parse_from_env() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NO_MATCH_POLICY", "discard"));
        pairs.push(("DISPATCH", "fan-out:4"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.no_match_policy, NoMatchPolicy::Discard);
        assert_eq!(config.dispatch, DispatchPolicy::FanOut { limit: 4 });
    }

    #[test]
    fn zero_fan_out_is_rejected() {
        assert!("fan-out:0".parse::<DispatchPolicy>().is_err());
        assert!("parallel".parse::<DispatchPolicy>().is_err());
    }

    #[test]
    fn dataset_list_drops_invalid_identifiers() {
        let datasets = parse_dataset_list("owner/nsw_councillors, owner/vic-councillors\nbad;id  ../etc?x");
        assert_eq!(datasets, vec!["owner/nsw_councillors", "owner/vic-councillors"]);
    }

    #[test]
    fn empty_dataset_list_is_empty() {
        assert!(parse_dataset_list("  , ,").is_empty());
    }
}
