//! Nominatim / `OpenStreetMap` geocoder client.
//!
//! Two endpoints are used:
//!
//! - `/reverse` turns a report coordinate into a normalized Portuguese
//!   address (see [`crate::address`]).
//! - `/search` powers the "fly to" location search, restricted to
//!   Portugal.
//!
//! The client itself does not rate limit. Batch callers must pace requests
//! with a [`crate::rate_limit::RateLimiter`] (1.1 s for the public
//! instance; see `rate_limit_ms` in the service TOML).
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>

use road_watch_geocoder_models::{GeocodeResult, SearchResult};

use crate::GeocodeError;
use crate::address::{ReverseResponse, normalize};
use crate::service_registry::NominatimConfig;

/// Maximum number of forward search results requested.
const SEARCH_LIMIT: &str = "5";

/// Default zoom when a search result has no usable bounding box.
const DEFAULT_ZOOM: u8 = 13;

/// HTTP client for a Nominatim instance.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    config: NominatimConfig,
}

impl NominatimClient {
    /// Builds a client that identifies itself with the configured
    /// `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    /// The effective configuration.
    #[must_use]
    pub const fn config(&self) -> &NominatimConfig {
        &self.config
    }

    /// Reverse geocodes a coordinate into a normalized address.
    ///
    /// A non-success HTTP status, a response without an `address` payload,
    /// or an address outside Portugal yield `Ok(None)`: the provider
    /// answered but the point is unresolved.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport failures or malformed JSON.
    pub async fn reverse_geocode(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        let url = format!("{}/reverse", self.config.base_url);
        let lat_param = lat.to_string();
        let lng_param = lng.to_string();

        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .query(&[
                ("format", "jsonv2"),
                ("lat", lat_param.as_str()),
                ("lon", lng_param.as_str()),
                ("addressdetails", "1"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            log::warn!("Nominatim reverse returned status {status} for ({lat}, {lng})");
            return Ok(None);
        }

        let text = resp.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| GeocodeError::Parse {
                message: format!("Invalid Nominatim reverse JSON: {e}"),
            })?;

        parse_reverse(&body)
    }

    /// Searches for places in Portugal matching a free-form query.
    ///
    /// Queries shorter than two characters (after trimming) return an empty
    /// list without contacting the provider.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Status`] on a non-success HTTP status, and
    /// [`GeocodeError`] on transport failures or malformed JSON.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, GeocodeError> {
        let trimmed = query.trim();
        if trimmed.chars().count() < 2 {
            return Ok(Vec::new());
        }

        let url = format!("{}/search", self.config.base_url);

        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .query(&[
                ("q", trimmed),
                ("countrycodes", self.config.country_code.as_str()),
                ("format", "json"),
                ("limit", SEARCH_LIMIT),
                ("addressdetails", "0"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        let text = resp.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| GeocodeError::Parse {
                message: format!("Invalid Nominatim search JSON: {e}"),
            })?;

        parse_search(&body)
    }
}

/// Parses a Nominatim reverse response body.
fn parse_reverse(body: &serde_json::Value) -> Result<Option<GeocodeResult>, GeocodeError> {
    if !body.is_object() {
        return Err(GeocodeError::Parse {
            message: "Nominatim reverse response is not an object".to_string(),
        });
    }

    let response = ReverseResponse::from_json(body);
    if response.address.is_none() {
        if let Some(error) = body["error"].as_str() {
            log::debug!("Nominatim reverse: {error}");
        }
        return Ok(None);
    }

    Ok(normalize(&response))
}

/// Parses a Nominatim search response body.
fn parse_search(body: &serde_json::Value) -> Result<Vec<SearchResult>, GeocodeError> {
    let items = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim search response is not an array".to_string(),
    })?;

    let results = items
        .iter()
        .filter_map(|item| {
            let lat = item["lat"].as_str().and_then(|s| s.parse::<f64>().ok());
            let lng = item["lon"].as_str().and_then(|s| s.parse::<f64>().ok());
            let (Some(lat), Some(lng)) = (lat, lng) else {
                log::debug!("Skipping Nominatim search item without coordinates: {item}");
                return None;
            };

            let bounding_box: Vec<&str> = item["boundingbox"]
                .as_array()
                .map(|bb| bb.iter().filter_map(serde_json::Value::as_str).collect())
                .unwrap_or_default();

            Some(SearchResult {
                display_name: item["display_name"].as_str().unwrap_or_default().to_string(),
                lat,
                lng,
                zoom: zoom_for_bounding_box(&bounding_box),
            })
        })
        .collect();

    Ok(results)
}

/// Picks a map zoom level that fits a Nominatim bounding box
/// (`[south, north, west, east]`).
///
/// Larger spans zoom further out. Unparseable coordinates fall through to
/// the closest zoom.
#[must_use]
pub fn zoom_for_bounding_box(bounding_box: &[&str]) -> u8 {
    if bounding_box.len() < 4 {
        return DEFAULT_ZOOM;
    }

    let parse = |s: &str| s.trim().parse::<f64>().unwrap_or(f64::NAN);
    let lat_span = (parse(bounding_box[1]) - parse(bounding_box[0])).abs();
    let lng_span = (parse(bounding_box[3]) - parse(bounding_box[2])).abs();

    // NaN propagates so that any unparseable edge lands on the last arm.
    let span = if lat_span.is_nan() || lng_span.is_nan() {
        f64::NAN
    } else {
        lat_span.max(lng_span)
    };

    match span {
        s if s > 5.0 => 7,
        s if s > 1.0 => 9,
        s if s > 0.5 => 11,
        s if s > 0.1 => 13,
        s if s > 0.01 => 15,
        _ => 16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::matchers::{all_of, contains, request, url_decoded};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    use crate::service_registry::all_services;

    fn client_for(server: &Server) -> NominatimClient {
        let config = NominatimConfig::from(all_services().remove(0).provider)
            .with_base_url(&server.url("/").to_string());
        NominatimClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn reverse_geocodes_lisbon() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/reverse"),
                request::query(url_decoded(contains(("format", "jsonv2")))),
                request::query(url_decoded(contains(("addressdetails", "1")))),
                request::query(url_decoded(contains(("lat", "38.7105")))),
                request::query(url_decoded(contains(("lon", "-9.1365")))),
            ])
            .respond_with(json_encoded(json!({
                "display_name": "10, Rua Augusta, Baixa, Lisboa, 1100-048, Portugal",
                "address": {
                    "road": "Rua Augusta",
                    "house_number": "10",
                    "city": "Lisboa",
                    "postcode": "1100-048",
                    "country_code": "pt"
                }
            }))),
        );

        let client = client_for(&server);
        let result = client
            .reverse_geocode(38.7105, -9.1365)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            result.normalized_address,
            "Rua Augusta, 10, Lisboa, 1100-048 Lisboa"
        );
        assert!(result.is_resolved());
    }

    #[tokio::test]
    async fn non_success_status_is_unresolved() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/reverse"))
                .respond_with(status_code(503)),
        );

        let client = client_for(&server);
        assert!(client.reverse_geocode(38.7, -9.1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_address_is_unresolved() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/reverse"))
                .respond_with(json_encoded(json!({ "error": "Unable to geocode" }))),
        );

        let client = client_for(&server);
        assert!(client.reverse_geocode(38.0, -12.0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn foreign_address_is_unresolved() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/reverse")).respond_with(
                json_encoded(json!({
                    "display_name": "Badajoz, Extremadura, España",
                    "address": { "city": "Badajoz", "country_code": "es" }
                })),
            ),
        );

        let client = client_for(&server);
        assert!(client.reverse_geocode(38.87, -6.97).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/reverse"))
                .respond_with(status_code(200).body("<html>oops</html>")),
        );

        let client = client_for(&server);
        let err = client.reverse_geocode(38.7, -9.1).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Parse { .. }));
    }

    #[tokio::test]
    async fn search_maps_results_and_zoom() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/search"),
                request::query(url_decoded(contains(("q", "Braga")))),
                request::query(url_decoded(contains(("countrycodes", "pt")))),
                request::query(url_decoded(contains(("limit", "5")))),
            ])
            .respond_with(json_encoded(json!([
                {
                    "display_name": "Braga, Portugal",
                    "lat": "41.5503",
                    "lon": "-8.4200",
                    "boundingbox": ["41.4", "41.7", "-8.6", "-8.2"]
                },
                {
                    "display_name": "Broken",
                    "lat": "not-a-number",
                    "lon": "-8.4"
                }
            ]))),
        );

        let client = client_for(&server);
        let results = client.search("  Braga ").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].display_name, "Braga, Portugal");
        assert!((results[0].lat - 41.5503).abs() < 1e-9);
        assert_eq!(results[0].zoom, 13);
    }

    #[tokio::test]
    async fn short_search_skips_request() {
        let server = Server::run();
        let client = client_for(&server);
        assert!(client.search(" a ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_error_status_is_an_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .respond_with(status_code(429)),
        );

        let client = client_for(&server);
        let err = client.search("Porto").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status { status: 429 }));
    }

    #[test]
    fn zoom_levels_follow_span() {
        assert_eq!(zoom_for_bounding_box(&["36", "42", "-9", "-6"]), 7);
        assert_eq!(zoom_for_bounding_box(&["38", "40", "-9", "-8.5"]), 9);
        assert_eq!(zoom_for_bounding_box(&["38", "38.7", "-9", "-8.9"]), 11);
        assert_eq!(zoom_for_bounding_box(&["38", "38.2", "-9", "-8.9"]), 13);
        assert_eq!(zoom_for_bounding_box(&["38", "38.05", "-9", "-8.99"]), 15);
        assert_eq!(zoom_for_bounding_box(&["38", "38.001", "-9", "-8.999"]), 16);
    }

    #[test]
    fn zoom_defaults_without_bounding_box() {
        assert_eq!(zoom_for_bounding_box(&[]), DEFAULT_ZOOM);
        assert_eq!(zoom_for_bounding_box(&["1", "2", "3"]), DEFAULT_ZOOM);
    }

    #[test]
    fn unparseable_bounding_box_zooms_closest() {
        assert_eq!(zoom_for_bounding_box(&["a", "b", "c", "d"]), 16);
    }

    #[test]
    fn parse_reverse_rejects_non_object() {
        assert!(parse_reverse(&json!([])).is_err());
    }
}
