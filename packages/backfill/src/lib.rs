#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch reverse geocoding for stored pothole reports.
//!
//! Selects reports whose address fields are missing or unresolved and walks
//! each one through:
//!
//! ```text
//! pending/failed -> territory check -> out of territory: failed
//!                                   -> in territory -> geocode -> no municipality: failed
//!                                                              -> municipality: resolved
//! ```
//!
//! Records are processed one at a time, oldest first. Every provider call
//! waits on a shared [`RateLimiter`]. A per-record error is logged with the
//! record id and counted, and the batch moves on. Re-running is safe: the
//! candidate query re-evaluates status every time.

use std::sync::Arc;

use road_watch_backfill_models::progress::ProgressCallback;
use road_watch_backfill_models::{BackfillOptions, BackfillSummary, Outcome};
use road_watch_database::{DbError, PotholeStore};
use road_watch_database_models::{BackfillCandidate, CandidateQuery};
use road_watch_geocoder::GeocodeError;
use road_watch_geocoder::nominatim::NominatimClient;
use road_watch_geocoder::rate_limit::RateLimiter;
use road_watch_geography::{Coordinate, CoordinateError};

pub use road_watch_backfill_models as models;

/// Errors that abort a backfill run or fail a single record.
#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    /// Database error.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Geocoding error.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

/// Runs one backfill pass over all current candidates.
///
/// # Errors
///
/// Returns [`BackfillError`] only if the candidate query fails. Per-record
/// failures are counted in the returned summary.
pub async fn run_backfill(
    store: &dyn PotholeStore,
    client: &NominatimClient,
    limiter: &RateLimiter,
    options: &BackfillOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<BackfillSummary, BackfillError> {
    let query = CandidateQuery {
        limit: options.limit,
        retry_failed: options.retry_failed,
    };

    let candidates = store.backfill_candidates(&query).await?;

    let mut summary = BackfillSummary {
        candidates: candidates.len() as u64,
        ..Default::default()
    };

    log::info!(
        "Found {} pothole(s) to geocode{}",
        candidates.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    progress.set_total(summary.candidates);

    for candidate in &candidates {
        progress.set_message(format!("pothole {}", candidate.id));
        let outcome = process_candidate(store, client, limiter, candidate, options.dry_run).await;
        summary.record(outcome);
        progress.inc(1);
    }

    progress.finish(summary.to_string());
    log::info!("Backfill finished: {summary}");

    Ok(summary)
}

/// Runs a single candidate through the territory check and reverse
/// geocoding, writing the result unless `dry_run` is set.
///
/// Never fails: errors are logged with the record id and reported as
/// [`Outcome::Error`].
pub async fn process_candidate(
    store: &dyn PotholeStore,
    client: &NominatimClient,
    limiter: &RateLimiter,
    candidate: &BackfillCandidate,
    dry_run: bool,
) -> Outcome {
    match try_process(store, client, limiter, candidate, dry_run).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Failed to geocode pothole {}: {e}", candidate.id);
            Outcome::Error
        }
    }
}

async fn try_process(
    store: &dyn PotholeStore,
    client: &NominatimClient,
    limiter: &RateLimiter,
    candidate: &BackfillCandidate,
    dry_run: bool,
) -> Result<Outcome, BackfillError> {
    let coordinate = match Coordinate::new(candidate.lat, candidate.lng) {
        Ok(c) => Some(c),
        Err(CoordinateError::NonFinite { .. }) => {
            log::warn!(
                "Skipping pothole {}: coordinates are not finite ({}, {})",
                candidate.id,
                candidate.lat,
                candidate.lng
            );
            return Ok(Outcome::InvalidCoordinates);
        }
        Err(CoordinateError::OutOfRange { .. }) => None,
    };

    let Some(coordinate) = coordinate.filter(Coordinate::is_within_territory) else {
        log::info!(
            "Pothole {} at ({}, {}) is outside Portugal",
            candidate.id,
            candidate.lat,
            candidate.lng
        );
        if !dry_run {
            store.mark_geocode_failed(&candidate.id).await?;
        }
        return Ok(Outcome::OutOfTerritory);
    };

    limiter.wait().await;

    let result = client
        .reverse_geocode(coordinate.latitude, coordinate.longitude)
        .await?;

    match result.filter(|r| r.is_resolved()) {
        Some(result) => {
            log::debug!(
                "Pothole {} resolved to {}",
                candidate.id,
                result.normalized_address
            );
            if !dry_run {
                store.apply_geocode(&candidate.id, &result).await?;
            }
            Ok(Outcome::Resolved)
        }
        None => {
            log::info!(
                "Pothole {} at ({}, {}) could not be resolved to a municipality",
                candidate.id,
                candidate.lat,
                candidate.lng
            );
            if !dry_run {
                store.mark_geocode_failed(&candidate.id).await?;
            }
            Ok(Outcome::Unresolved)
        }
    }
}
