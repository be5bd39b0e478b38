#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the road watch server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use road_watch_database_models::{PotholeRow, ReportStatus, Severity};
use road_watch_geocoder_models::GeocodeStatus;
use serde::{Deserialize, Serialize};

/// A pothole report as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPothole {
    /// Report ID.
    pub id: String,
    /// Reporting user, if any.
    pub user_id: Option<String>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Typed address or provider display name.
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
    /// Geocoding state.
    pub geocode_status: GeocodeStatus,
    /// Last geocoding attempt (ISO 8601).
    pub geocoded_at: Option<DateTime<Utc>>,
    /// Free-text description.
    pub description: Option<String>,
    /// Severity.
    pub severity: Severity,
    /// Repair status.
    pub status: ReportStatus,
    /// Submission time (ISO 8601).
    pub created_at: DateTime<Utc>,
}

impl From<PotholeRow> for ApiPothole {
    fn from(row: PotholeRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            lat: row.lat,
            lng: row.lng,
            address: row.address,
            normalized_address: row.normalized_address,
            parish: row.parish,
            municipality: row.municipality,
            district: row.district,
            postal_code: row.postal_code,
            geocode_status: row.geocode_status,
            geocoded_at: row.geocoded_at,
            description: row.description,
            severity: row.severity,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// Body of `POST /api/potholes`.
///
/// Coordinates are optional at the type level so that a missing value is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePotholeRequest {
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lng: Option<f64>,
    /// Severity, defaults to moderate.
    pub severity: Option<Severity>,
    /// Free-text description.
    pub description: Option<String>,
    /// Address typed by the reporter.
    pub address: Option<String>,
    /// Reporting user.
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
}

/// Query parameters for `GET /api/potholes`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPotholesParams {
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// Query parameters for `GET /api/geocode/reverse`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReverseQueryParams {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// Query parameters for `GET /api/geocode/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQueryParams {
    /// Free-form place query.
    pub q: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body for all non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
