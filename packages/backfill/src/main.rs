#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the geocoding backfill.
//!
//! Reads candidates from Postgres (`DATABASE_URL`) or, with `--duckdb`, from
//! a local `DuckDB` file, and reverse geocodes them one per rate-limit
//! interval. Exits non-zero only when the run itself cannot start or the
//! candidate query fails.

use std::path::PathBuf;

use clap::Parser;
use road_watch_backfill::models::BackfillOptions;
use road_watch_backfill::run_backfill;
use road_watch_cli_utils::IndicatifProgress;
use road_watch_database::PotholeStore;
use road_watch_database::duck::DuckDbStore;
use road_watch_geocoder::nominatim::NominatimClient;
use road_watch_geocoder::rate_limit::RateLimiter;
use road_watch_geocoder::service_registry::NominatimConfig;

#[derive(Parser)]
#[command(name = "road_watch_backfill")]
#[command(about = "Reverse geocode pothole reports missing address fields")]
struct Cli {
    /// Geocode and log outcomes without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Process at most N candidates (0 means all)
    #[arg(long)]
    limit: Option<u64>,

    /// Also retry reports already marked failed with no municipality
    #[arg(long)]
    retry_failed: bool,

    /// Use a local `DuckDB` file instead of Postgres (defaults to
    /// `data/road_watch.duckdb` when no path is given)
    #[arg(long)]
    #[allow(clippy::option_option)]
    duckdb: Option<Option<PathBuf>>,

    /// Override the Nominatim base URL
    #[arg(long)]
    nominatim_url: Option<String>,

    /// Override the delay between provider requests, in milliseconds
    #[arg(long)]
    rate_limit_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = road_watch_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = NominatimConfig::from_registry()?;
    if let Some(url) = &cli.nominatim_url {
        config = config.with_base_url(url);
    }
    if let Some(ms) = cli.rate_limit_ms {
        config = config.with_rate_limit_ms(ms);
    }
    log::info!(
        "Geocoding via {} ({} ms between requests)",
        config.base_url,
        config.rate_limit_ms
    );

    let limiter = RateLimiter::from_millis(config.rate_limit_ms);
    let client = NominatimClient::new(config)?;

    let store: Box<dyn PotholeStore> = match &cli.duckdb {
        Some(Some(path)) => Box::new(DuckDbStore::open(path)?),
        Some(None) => Box::new(DuckDbStore::open_default()?),
        None => Box::new(road_watch_database::db::connect_from_env().await?),
    };

    let options = BackfillOptions {
        dry_run: cli.dry_run,
        limit: cli.limit,
        retry_failed: cli.retry_failed,
    };

    let progress = IndicatifProgress::records_bar(&multi, "Geocoding potholes");
    let summary = run_backfill(store.as_ref(), &client, &limiter, &options, &progress).await?;

    if options.dry_run {
        log::info!("Dry run: no records were modified");
    }
    println!("{summary}");

    Ok(())
}
