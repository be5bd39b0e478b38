#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding result and status types.
//!
//! These are shared by the real-time submission path (the API server) and
//! the offline backfill so that both persist exactly the same shape.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Geocoding lifecycle of a pothole report.
///
/// Reports start as [`GeocodeStatus::Pending`]. Automation moves them to
/// [`GeocodeStatus::Resolved`] or [`GeocodeStatus::Failed`];
/// [`GeocodeStatus::Manual`] is an operator override that automation never
/// writes nor touches.
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
pub enum GeocodeStatus {
    /// Not yet geocoded.
    #[default]
    Pending,
    /// Reverse geocoded with a municipality.
    Resolved,
    /// Out of territory, or the provider could not resolve a municipality.
    Failed,
    /// Address fields set by an operator.
    Manual,
}

impl GeocodeStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: &[Self] = &[Self::Pending, Self::Resolved, Self::Failed, Self::Manual];

    /// Whether automation may overwrite a record in this state.
    #[must_use]
    pub const fn is_automatable(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

/// A normalized reverse geocoding result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResult {
    /// Provider display name, verbatim.
    pub display_address: String,
    /// Postal-style address composed from the address components, or the
    /// display name when no component was usable.
    pub normalized_address: String,
    /// Parish (freguesia). Falls back to the municipality.
    pub parish: Option<String>,
    /// Municipality (concelho).
    pub municipality: Option<String>,
    /// District.
    pub district: Option<String>,
    /// Postal code, e.g. `"1100-048"`.
    pub postal_code: Option<String>,
}

impl GeocodeResult {
    /// A result only counts as resolved when a municipality was extracted.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.municipality.is_some()
    }
}

/// A forward search hit, used to fly the map to a typed location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Provider display name.
    pub display_name: String,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Suggested map zoom level derived from the result's bounding box.
    pub zoom: u8,
}
