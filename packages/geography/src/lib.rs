#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate validation and territory checks for pothole reports.
//!
//! Every report carries a WGS84 coordinate. Before a report is accepted (or
//! sent to the reverse geocoder during a backfill) the coordinate must be
//! finite, in range, and inside one of Portugal's three disjoint bounding
//! boxes: the mainland, Madeira and the Azores. See [`territory`].

pub mod territory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use territory::{
    PORTUGAL_TERRITORY, TerritoryBounds, TerritoryRegion, is_within_territory, territory_region,
};

/// A validated WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
}

/// Errors from coordinate validation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    /// Latitude or longitude is `NaN` or infinite.
    #[error("Coordinate is not finite: ({latitude}, {longitude})")]
    NonFinite {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },

    /// Latitude or longitude is outside the valid WGS84 range.
    #[error("Coordinate out of range: ({latitude}, {longitude})")]
    OutOfRange {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
}

impl Coordinate {
    /// Creates a coordinate, validating that both components are finite
    /// and within the WGS84 range.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::NonFinite`] for `NaN`/infinite input and
    /// [`CoordinateError::OutOfRange`] for values outside
    /// `-90..=90` / `-180..=180`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NonFinite {
                latitude,
                longitude,
            });
        }

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::OutOfRange {
                latitude,
                longitude,
            });
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Whether this coordinate falls inside Portuguese territory.
    #[must_use]
    pub fn is_within_territory(&self) -> bool {
        is_within_territory(self.latitude, self.longitude)
    }
}
