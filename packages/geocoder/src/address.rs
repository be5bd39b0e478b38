//! Address normalization for Nominatim reverse geocoding responses.
//!
//! Nominatim returns OSM address components under many interchangeable
//! keys: a street can be a `road`, `pedestrian` or `footway`; a
//! municipality can show up as `city`, `town`, `village` and so on
//! depending on how the area is tagged. This module picks the first
//! non-empty value per field in a fixed priority order and composes a
//! Portuguese postal-style address:
//!
//! ```text
//! <road>, <house number>, <parish>, <postal code> <municipality>, <district>
//! ```
//!
//! Empty segments are dropped. This is the single source of truth for the
//! field-priority rules; the server and the backfill both go through
//! [`normalize`].

use road_watch_geocoder_models::GeocodeResult;
use serde::{Deserialize, Serialize};

/// Country code accepted by [`normalize`].
pub const PORTUGAL_COUNTRY_CODE: &str = "pt";

/// The subset of a Nominatim `/reverse?format=jsonv2` response we use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseResponse {
    /// Full human-readable place name.
    pub display_name: Option<String>,
    /// Structured address components (`addressdetails=1`).
    pub address: Option<AddressComponents>,
}

/// OSM address components. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    pub road: Option<String>,
    pub pedestrian: Option<String>,
    pub footway: Option<String>,
    pub path: Option<String>,
    pub cycleway: Option<String>,
    pub house_number: Option<String>,
    pub suburb: Option<String>,
    pub city_district: Option<String>,
    pub neighbourhood: Option<String>,
    pub quarter: Option<String>,
    pub hamlet: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub municipality: Option<String>,
    pub county: Option<String>,
    pub state_district: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country_code: Option<String>,
}

impl ReverseResponse {
    /// Builds a response from raw JSON, keeping only string-valued fields.
    ///
    /// Non-string values (numbers, objects) are treated as absent rather
    /// than failing the whole response.
    #[must_use]
    pub fn from_json(body: &serde_json::Value) -> Self {
        let display_name = body["display_name"].as_str().map(String::from);
        let address = body
            .get("address")
            .filter(|a| a.is_object())
            .map(AddressComponents::from_json);

        Self {
            display_name,
            address,
        }
    }
}

impl AddressComponents {
    fn from_json(a: &serde_json::Value) -> Self {
        let s = |key: &str| a[key].as_str().map(String::from);

        Self {
            road: s("road"),
            pedestrian: s("pedestrian"),
            footway: s("footway"),
            path: s("path"),
            cycleway: s("cycleway"),
            house_number: s("house_number"),
            suburb: s("suburb"),
            city_district: s("city_district"),
            neighbourhood: s("neighbourhood"),
            quarter: s("quarter"),
            hamlet: s("hamlet"),
            city: s("city"),
            town: s("town"),
            village: s("village"),
            municipality: s("municipality"),
            county: s("county"),
            state_district: s("state_district"),
            state: s("state"),
            postcode: s("postcode"),
            country_code: s("country_code"),
        }
    }

    /// Street name.
    #[must_use]
    pub fn road(&self) -> Option<String> {
        pick_first(&[
            self.road.as_deref(),
            self.pedestrian.as_deref(),
            self.footway.as_deref(),
            self.path.as_deref(),
            self.cycleway.as_deref(),
        ])
    }

    /// Municipality (concelho).
    #[must_use]
    pub fn municipality(&self) -> Option<String> {
        pick_first(&[
            self.city.as_deref(),
            self.town.as_deref(),
            self.village.as_deref(),
            self.municipality.as_deref(),
            self.county.as_deref(),
        ])
    }

    /// Parish (freguesia) without the municipality fallback.
    #[must_use]
    pub fn parish(&self) -> Option<String> {
        pick_first(&[
            self.suburb.as_deref(),
            self.city_district.as_deref(),
            self.neighbourhood.as_deref(),
            self.quarter.as_deref(),
            self.hamlet.as_deref(),
        ])
    }

    /// District.
    #[must_use]
    pub fn district(&self) -> Option<String> {
        pick_first(&[
            self.state_district.as_deref(),
            self.state.as_deref(),
            self.county.as_deref(),
        ])
    }

    /// Whether the components carry a country code other than Portugal's.
    fn is_foreign(&self) -> bool {
        self.country_code
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .is_some_and(|c| !c.is_empty() && c != PORTUGAL_COUNTRY_CODE)
    }
}

/// Returns the first value that is non-empty after trimming, trimmed.
#[must_use]
pub fn pick_first(values: &[Option<&str>]) -> Option<String> {
    values
        .iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(String::from)
}

/// Joins the non-empty parts with `sep`.
fn join_present(parts: &[Option<&str>], sep: &str) -> String {
    parts
        .iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(sep)
}

/// Normalizes a reverse geocoding response into a [`GeocodeResult`].
///
/// Returns `None` if the response has no display name, or if it carries a
/// country code that is not Portugal's. A response with a display name but
/// no usable components yields the display name as the normalized address.
#[must_use]
pub fn normalize(response: &ReverseResponse) -> Option<GeocodeResult> {
    let display_address = response
        .display_name
        .clone()
        .filter(|d| !d.trim().is_empty())?;

    let empty = AddressComponents::default();
    let components = response.address.as_ref().unwrap_or(&empty);

    if components.is_foreign() {
        return None;
    }

    let road = components.road();
    let house_number = pick_first(&[components.house_number.as_deref()]);
    let municipality = components.municipality();
    let parish = components.parish().or_else(|| municipality.clone());
    let district = components.district();
    let postal_code = pick_first(&[components.postcode.as_deref()]);

    let street_line = join_present(&[road.as_deref(), house_number.as_deref()], ", ");
    let locality_line = join_present(&[postal_code.as_deref(), municipality.as_deref()], " ");

    let composed = join_present(
        &[
            Some(street_line.as_str()),
            parish.as_deref(),
            Some(locality_line.as_str()),
            district.as_deref(),
        ],
        ", ",
    );

    let normalized_address = if composed.is_empty() {
        display_address.clone()
    } else {
        composed
    };

    Some(GeocodeResult {
        display_address,
        normalized_address,
        parish,
        municipality,
        district,
        postal_code,
    })
}
