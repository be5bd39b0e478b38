#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pothole report row types and backfill candidate definitions.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `potholes` table. They are distinct from the API types in
//! `road_watch_server_models`.

use chrono::{DateTime, Utc};
use road_watch_geocoder_models::{GeocodeResult, GeocodeStatus};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How bad a reported pothole is.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Leve.
    Low,
    /// Moderado.
    #[default]
    Moderate,
    /// Grave.
    High,
}

/// Repair lifecycle of a report.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportStatus {
    /// Newly reported.
    #[default]
    Reported,
    /// Repair in progress.
    Repairing,
    /// Repaired.
    Repaired,
    /// Hidden from the map.
    Archived,
}

/// A pothole report row as retrieved from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotholeRow {
    /// Primary key (UUID, text form).
    pub id: String,
    /// Reporting user, if authenticated.
    pub user_id: Option<String>,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Address typed by the reporter or provider display name.
    pub address: Option<String>,
    /// Composed postal-style address.
    pub normalized_address: Option<String>,
    /// Parish (freguesia).
    pub parish: Option<String>,
    /// Municipality (concelho).
    pub municipality: Option<String>,
    /// District.
    pub district: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Geocoding lifecycle state.
    pub geocode_status: GeocodeStatus,
    /// When geocoding was last attempted.
    pub geocoded_at: Option<DateTime<Utc>>,
    /// Free-text description.
    pub description: Option<String>,
    /// Severity.
    pub severity: Severity,
    /// Repair status.
    pub status: ReportStatus,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
}

/// A new report to insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewPothole {
    /// Reporting user, if authenticated.
    pub user_id: Option<String>,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Typed address, if any.
    pub address: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Severity.
    pub severity: Severity,
    /// Geocoding outcome at submission time. `None` inserts as
    /// [`GeocodeStatus::Pending`] for the backfill to resolve.
    pub geocode: Option<GeocodeResult>,
}

impl NewPothole {
    /// The status this report is stored with.
    #[must_use]
    pub fn geocode_status(&self) -> GeocodeStatus {
        if self.geocode.as_ref().is_some_and(GeocodeResult::is_resolved) {
            GeocodeStatus::Resolved
        } else {
            GeocodeStatus::Pending
        }
    }

    /// The address to persist: typed text wins over the provider display
    /// name.
    #[must_use]
    pub fn effective_address(&self) -> Option<String> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .or_else(|| {
                self.geocode
                    .as_ref()
                    .filter(|g| g.is_resolved())
                    .map(|g| g.display_address.clone())
            })
    }

    /// Geocode fields to persist, only when resolved.
    #[must_use]
    pub fn resolved_geocode(&self) -> Option<&GeocodeResult> {
        self.geocode.as_ref().filter(|g| g.is_resolved())
    }
}

/// A report selected for geocoding backfill.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillCandidate {
    /// Primary key.
    pub id: String,
    /// Latitude as stored. May be non-finite in corrupted rows.
    pub lat: f64,
    /// Longitude as stored.
    pub lng: f64,
    /// Current parish, if any.
    pub parish: Option<String>,
    /// Current geocoding state.
    pub geocode_status: GeocodeStatus,
}

/// Candidate selection parameters for a backfill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CandidateQuery {
    /// Maximum number of candidates. `None` or `Some(0)` means unbounded.
    pub limit: Option<u64>,
    /// Also retry records previously marked `failed` with no municipality.
    pub retry_failed: bool,
}

impl CandidateQuery {
    /// The effective row limit, if any.
    #[must_use]
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit.filter(|&n| n > 0)
    }
}
