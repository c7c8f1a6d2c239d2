use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use councilmail_common::Config;
use councilmail_scout::fetcher::WebFetcher;
use councilmail_scout::scheduler::Scheduler;
use councilmail_store::SqliteStore;
use morph_client::MorphClient;

/// Log filter used when `RUST_LOG` is unset: this workspace's crates at info.
const DEFAULT_LOG_FILTER: &str = "councilmail=info,morph_client=info,custom_search_client=info";

#[derive(Parser)]
#[command(name = "councilmail", about = "Find contact emails for local councillors")]
struct Cli {
    /// SQLite database URL. Overrides DATABASE_URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Resolve and reconcile as usual but write nothing.
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("councilmail starting...");

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    config.log_redacted();

    // Nothing between opening and closing the store may return early.
    let fetcher = Arc::new(WebFetcher::new(&config)?);
    let datasets = Arc::new(MorphClient::with_base_url(
        &config.morph_api_key,
        &config.morph_base_url,
    ));
    let store = Arc::new(
        SqliteStore::connect(&config.database_url)
            .await
            .context("Failed to open store")?,
    );

    let scheduler =
        Scheduler::new(&config, store.clone(), fetcher, datasets).dry_run(cli.dry_run);
    let result = scheduler.run().await;

    // Close the store whether or not the run succeeded.
    store.close().await;

    let report = result?;
    info!("Run complete. {report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn default_log_filter_covers_every_workspace_crate() {
        for target in ["councilmail", "morph_client", "custom_search_client"] {
            assert!(DEFAULT_LOG_FILTER.contains(&format!("{target}=info")));
        }
    }

    #[test]
    fn cli_flags_parse() {
        let cli = Cli::try_parse_from(["councilmail", "--dry-run", "--database-url", "sqlite::memory:"])
            .unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
    }
}
