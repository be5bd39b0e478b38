#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding and address normalization for pothole reports.
//!
//! Turns report coordinates into normalized Portuguese addresses
//! (street, parish, municipality, district, postal code) using Nominatim /
//! `OpenStreetMap`:
//!
//! - [`address`] holds the field-priority rules and address composition.
//!   It is the only place those rules live; both the API server and the
//!   backfill go through it.
//! - [`nominatim`] is the HTTP client for `/reverse` and `/search`.
//! - [`rate_limit`] spaces out batch requests to respect the public
//!   instance's 1 req/sec policy.
//! - [`service_registry`] loads provider configuration from the TOML files
//!   in `services/`, embedded at compile time.

pub mod address;
pub mod nominatim;
pub mod rate_limit;
pub mod service_registry;

use thiserror::Error;

pub use road_watch_geocoder_models::{GeocodeResult, GeocodeStatus, SearchResult};

/// Errors from geocoding operations.
///
/// An unresolved coordinate is not an error: the client returns
/// `Ok(None)` for it. These variants cover the cases where the provider
/// could not be asked or its answer could not be read.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status where one is required.
    #[error("Provider returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Provider configuration is missing or invalid.
    #[error("Invalid geocoder configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration problem.
        message: String,
    },
}
