#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for geocoding backfill runs.
//!
//! Kept separate from the orchestrator so that progress renderers (see
//! `road_watch_cli_utils`) can implement [`progress::ProgressCallback`]
//! without depending on the database or HTTP stacks.

pub mod progress;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Options controlling a backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillOptions {
    /// Read candidates and call the provider, but write nothing.
    pub dry_run: bool,
    /// Process at most this many candidates. `None` or `Some(0)` means all.
    pub limit: Option<u64>,
    /// Also retry records previously marked `failed` with no municipality.
    pub retry_failed: bool,
}

/// What happened to a single candidate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    /// Stored coordinates are not finite numbers. Nothing was written.
    InvalidCoordinates,
    /// Coordinates fall outside every territory box. Marked `failed`.
    OutOfTerritory,
    /// The provider returned nothing usable. Marked `failed`.
    Unresolved,
    /// Address fields were written and the record marked `resolved`.
    Resolved,
    /// A transport, parse, or write error. The batch continued.
    Error,
}

/// Counters reported at the end of a backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillSummary {
    /// Number of candidates selected.
    pub candidates: u64,
    /// Records resolved (or that would have been, in a dry run).
    pub updated: u64,
    /// Records the provider could not resolve.
    pub unresolved: u64,
    /// Records outside the territory.
    pub out_of_territory: u64,
    /// Records that hit an error, including invalid coordinates.
    pub errors: u64,
}

impl BackfillSummary {
    /// Counts one candidate outcome.
    pub const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Resolved => self.updated += 1,
            Outcome::Unresolved => self.unresolved += 1,
            Outcome::OutOfTerritory => self.out_of_territory += 1,
            Outcome::InvalidCoordinates | Outcome::Error => self.errors += 1,
        }
    }

    /// Number of candidates with a recorded outcome.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.updated + self.unresolved + self.out_of_territory + self.errors
    }
}

impl std::fmt::Display for BackfillSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} candidates: {} updated, {} unresolved, {} out of territory, {} errors",
            self.candidates, self.updated, self.unresolved, self.out_of_territory, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_coordinates_count_as_errors() {
        let mut summary = BackfillSummary {
            candidates: 5,
            ..Default::default()
        };
        summary.record(Outcome::InvalidCoordinates);
        summary.record(Outcome::Error);
        summary.record(Outcome::Resolved);
        summary.record(Outcome::OutOfTerritory);
        summary.record(Outcome::Unresolved);

        assert_eq!(summary.errors, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.processed(), 5);
    }

    #[test]
    fn summary_display() {
        let summary = BackfillSummary {
            candidates: 3,
            updated: 1,
            unresolved: 1,
            out_of_territory: 1,
            errors: 0,
        };
        assert_eq!(
            summary.to_string(),
            "3 candidates: 1 updated, 1 unresolved, 1 out of territory, 0 errors"
        );
    }

    #[test]
    fn outcome_names() {
        assert_eq!(Outcome::OutOfTerritory.as_ref(), "out_of_territory");
        assert_eq!(
            serde_json::to_string(&Outcome::InvalidCoordinates).unwrap(),
            "\"invalid_coordinates\""
        );
    }
}
