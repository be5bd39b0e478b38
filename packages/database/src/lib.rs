#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Pothole report persistence for road watch.
//!
//! The [`PotholeStore`] trait is the only seam the server and the backfill
//! talk to. Two backends implement it:
//!
//! - [`postgres::PostgresStore`] (production) uses `switchy_database` over
//!   raw Postgres, connected from `DATABASE_URL` via [`db::connect_from_env`].
//! - [`duck::DuckDbStore`] keeps the same schema in a local `DuckDB` file
//!   (or in memory), for offline runs and tests.
//!
//! Both backends share the candidate-selection predicate built by
//! [`candidate_filter`].

pub mod db;
pub mod duck;
pub mod paths;
pub mod postgres;

use async_trait::async_trait;
use road_watch_database_models::{BackfillCandidate, CandidateQuery, NewPothole, PotholeRow};
use road_watch_geocoder_models::{GeocodeResult, GeocodeStatus};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Postgres query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing a local store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// The local connection lock was poisoned by a panicking holder.
    #[error("Connection lock poisoned")]
    Poisoned,

    /// A write targeted a report that does not exist.
    #[error("Pothole not found: {id}")]
    NotFound {
        /// Report ID.
        id: String,
    },
}

/// Persistence operations used by the geocoding pipeline.
#[async_trait]
pub trait PotholeStore: Send + Sync {
    /// Creates the `potholes` table and its indexes if missing.
    async fn ensure_schema(&self) -> Result<(), DbError>;

    /// Inserts a report and returns the stored row.
    async fn insert_pothole(&self, new: &NewPothole) -> Result<PotholeRow, DbError>;

    /// Fetches a report by ID.
    async fn get_pothole(&self, id: &str) -> Result<Option<PotholeRow>, DbError>;

    /// Lists reports newest first, archived ones included.
    ///
    /// `None` (or `Some(0)`) returns every row.
    async fn list_potholes(&self, limit: Option<u32>) -> Result<Vec<PotholeRow>, DbError>;

    /// Selects reports that still need reverse geocoding, oldest first.
    async fn backfill_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<BackfillCandidate>, DbError>;

    /// Marks a report `failed` and stamps `geocoded_at`.
    async fn mark_geocode_failed(&self, id: &str) -> Result<(), DbError>;

    /// Stores a resolved geocode and marks the report `resolved`.
    ///
    /// An existing non-empty `address` is kept; otherwise the provider's
    /// display address is stored.
    async fn apply_geocode(&self, id: &str, result: &GeocodeResult) -> Result<(), DbError>;

    /// Operator override: stores the given address fields and marks the
    /// report `manual`, which automation never touches again.
    async fn set_manual_geocode(&self, id: &str, result: &GeocodeResult) -> Result<(), DbError>;
}

/// Builds the `WHERE` predicate selecting backfill candidates.
///
/// A report is a candidate when it has no parish or is not `resolved`.
/// `manual` reports are never candidates. Unless `retry_failed` is set,
/// reports already marked `failed` after an attempt that yielded no
/// municipality are skipped so that unresolvable points are not retried
/// on every run.
#[must_use]
pub fn candidate_filter(query: &CandidateQuery) -> String {
    let automatable = GeocodeStatus::ALL
        .iter()
        .filter(|s| s.is_automatable())
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "geocode_status IN ({automatable})
         AND (parish IS NULL OR trim(parish) = '' OR geocode_status IS DISTINCT FROM 'resolved')"
    );

    if !query.retry_failed {
        sql.push_str(
            "
         AND NOT (geocode_status = 'failed' AND geocoded_at IS NOT NULL AND municipality IS NULL)",
        );
    }

    sql
}

/// Builds the trailing `LIMIT` clause, empty when unbounded or zero.
#[must_use]
pub fn limit_clause(limit: Option<u64>) -> String {
    limit
        .filter(|&n| n > 0)
        .map_or_else(String::new, |n| format!(" LIMIT {n}"))
}

/// Parses a report ID into its canonical UUID text.
///
/// IDs that are not UUIDs cannot name a Postgres row.
pub(crate) fn canonical_id(id: &str) -> Option<String> {
    uuid::Uuid::parse_str(id.trim())
        .ok()
        .map(|u| u.hyphenated().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_skips_failed_without_municipality_by_default() {
        let sql = candidate_filter(&CandidateQuery::default());
        assert!(sql.contains("municipality IS NULL"));
        assert!(sql.contains("geocode_status IN ('pending', 'resolved', 'failed')"));
        assert!(!sql.contains("'manual'"));
    }

    #[test]
    fn retry_failed_drops_the_skip_rule() {
        let sql = candidate_filter(&CandidateQuery {
            limit: None,
            retry_failed: true,
        });
        assert!(!sql.contains("municipality IS NULL"));
    }

    #[test]
    fn limit_clause_only_for_positive_limits() {
        assert_eq!(limit_clause(CandidateQuery::default().effective_limit()), "");
        assert_eq!(limit_clause(Some(0)), "");
        assert_eq!(
            limit_clause(
                CandidateQuery {
                    limit: Some(10),
                    retry_failed: false
                }
                .effective_limit()
            ),
            " LIMIT 10"
        );
    }

    #[test]
    fn canonical_id_accepts_only_uuids() {
        assert_eq!(
            canonical_id(" 6F9619FF-8B86-D011-B42D-00C04FC964FF "),
            Some("6f9619ff-8b86-d011-b42d-00c04fc964ff".to_string())
        );
        assert_eq!(canonical_id("nope"), None);
        assert_eq!(canonical_id(""), None);
    }
}
