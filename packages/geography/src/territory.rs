//! Portuguese territory bounding boxes.
//!
//! Portugal is split across three disjoint regions, so a single rectangle
//! would either exclude the archipelagos or admit most of the Atlantic.
//! Each region gets its own coarse box; bounds are inclusive on all sides.
//!
//! This is a cheap pre-filter in front of the reverse geocoder, not a
//! border test. Points near Spain or the open ocean inside a box still
//! pass and are rejected later by the geocoder's country check.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Which part of the territory a bounding box covers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TerritoryRegion {
    /// Continental Portugal.
    Mainland,
    /// Madeira archipelago.
    Madeira,
    /// Azores archipelago.
    Azores,
}

/// An axis-aligned bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerritoryBounds {
    /// Region this box covers.
    pub region: TerritoryRegion,
    /// Southern latitude boundary.
    pub min_lat: f64,
    /// Northern latitude boundary.
    pub max_lat: f64,
    /// Western longitude boundary.
    pub min_lng: f64,
    /// Eastern longitude boundary.
    pub max_lng: f64,
}

impl TerritoryBounds {
    /// Whether `(lat, lng)` lies inside this box, boundaries included.
    ///
    /// `NaN` never compares, so non-finite input is always outside.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// The three fixed regions, in lookup order.
pub const PORTUGAL_TERRITORY: [TerritoryBounds; 3] = [
    TerritoryBounds {
        region: TerritoryRegion::Mainland,
        min_lat: 36.8,
        max_lat: 42.2,
        min_lng: -9.7,
        max_lng: -6.0,
    },
    TerritoryBounds {
        region: TerritoryRegion::Madeira,
        min_lat: 32.2,
        max_lat: 33.3,
        min_lng: -17.6,
        max_lng: -16.0,
    },
    TerritoryBounds {
        region: TerritoryRegion::Azores,
        min_lat: 36.5,
        max_lat: 39.9,
        min_lng: -31.9,
        max_lng: -24.0,
    },
];

/// Returns `true` iff the point lies within at least one territory box.
#[must_use]
pub fn is_within_territory(lat: f64, lng: f64) -> bool {
    territory_region(lat, lng).is_some()
}

/// Returns the first region whose box contains the point.
#[must_use]
pub fn territory_region(lat: f64, lng: f64) -> Option<TerritoryRegion> {
    PORTUGAL_TERRITORY
        .iter()
        .find(|b| b.contains(lat, lng))
        .map(|b| b.region)
}
