//! Compile-time registry of geocoding service configurations.
//!
//! Each provider is defined in a TOML file under `services/`. The registry
//! embeds these at compile time and exposes them via [`all_services`] and
//! [`enabled_services`]. [`NominatimConfig::from_registry`] resolves the
//! effective client configuration, applying the `NOMINATIM_BASE_URL`
//! environment override.

use serde::Deserialize;

use crate::GeocodeError;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Execution order — lower values run first.
    pub priority: u32,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Nominatim / `OpenStreetMap` geocoder.
    Nominatim {
        /// API base URL, without the endpoint path
        /// (e.g., `"https://nominatim.openstreetmap.org"`).
        base_url: String,
        /// Minimum delay between batch requests in milliseconds.
        rate_limit_ms: u64,
        /// `User-Agent` identifying this client to the provider.
        user_agent: String,
        /// Value for the `Accept-Language` header.
        accept_language: String,
        /// ISO country code used to restrict forward searches.
        country_code: String,
    },
}

const fn default_true() -> bool {
    true
}

impl GeocodingService {
    /// Returns the provider's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Nominatim { base_url, .. } => base_url,
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[("nominatim", include_str!("../services/nominatim.toml"))];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 1;

/// Returns all geocoding service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services, sorted by priority (ascending).
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}

/// Effective configuration for a [`crate::nominatim::NominatimClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominatimConfig {
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Minimum delay between batch requests in milliseconds.
    pub rate_limit_ms: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// `Accept-Language` header value.
    pub accept_language: String,
    /// Country restriction for forward searches.
    pub country_code: String,
}

impl NominatimConfig {
    /// Resolves the enabled Nominatim service from the registry.
    ///
    /// `NOMINATIM_BASE_URL`, when set and non-empty, replaces the embedded
    /// base URL (e.g., to point at a self-hosted instance).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::InvalidConfig`] if no Nominatim service is
    /// enabled.
    pub fn from_registry() -> Result<Self, GeocodeError> {
        let service = enabled_services()
            .into_iter()
            .find(|s| matches!(s.provider, ProviderConfig::Nominatim { .. }))
            .ok_or_else(|| GeocodeError::InvalidConfig {
                message: "No enabled Nominatim service in registry".to_string(),
            })?;

        let mut config = Self::from(service.provider);

        if let Ok(url) = std::env::var("NOMINATIM_BASE_URL")
            && !url.trim().is_empty()
        {
            log::info!("Using Nominatim base URL from NOMINATIM_BASE_URL: {url}");
            config = config.with_base_url(&url);
        }

        Ok(config)
    }

    /// Returns a copy pointed at another base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim().trim_end_matches('/').to_string();
        self
    }

    /// Returns a copy with another batch rate limit.
    #[must_use]
    pub const fn with_rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.rate_limit_ms = rate_limit_ms;
        self
    }
}

impl From<ProviderConfig> for NominatimConfig {
    fn from(provider: ProviderConfig) -> Self {
        match provider {
            ProviderConfig::Nominatim {
                base_url,
                rate_limit_ms,
                user_agent,
                accept_language,
                country_code,
            } => Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                rate_limit_ms,
                user_agent,
                accept_language,
                country_code,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_services() {
        let services = all_services();
        assert_eq!(services.len(), EXPECTED_SERVICE_COUNT);
    }

    #[test]
    fn service_ids_are_unique() {
        let services = all_services();
        let mut seen = BTreeSet::new();
        for svc in &services {
            assert!(seen.insert(&svc.id), "Duplicate service ID: {}", svc.id);
        }
    }

    #[test]
    fn all_services_have_required_fields() {
        for svc in &all_services() {
            assert!(!svc.id.is_empty(), "Service has empty id");
            assert!(!svc.name.is_empty(), "Service {} has empty name", svc.id);
            assert!(
                !svc.base_url().is_empty(),
                "Service {} has empty base_url",
                svc.id
            );
        }
    }

    #[test]
    fn nominatim_respects_public_rate_limit() {
        let svc = all_services()
            .into_iter()
            .find(|s| s.id == "nominatim")
            .unwrap();
        let config = NominatimConfig::from(svc.provider);
        assert!(config.rate_limit_ms >= 1100);
        assert_eq!(config.accept_language, "pt");
        assert_eq!(config.country_code, "pt");
        assert!(!config.user_agent.is_empty());
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let svc = all_services().remove(0);
        let config = NominatimConfig::from(svc.provider).with_base_url("http://localhost:8088/");
        assert_eq!(config.base_url, "http://localhost:8088");
    }

    #[test]
    fn rate_limit_override_keeps_other_settings() {
        let svc = all_services().remove(0);
        let base = NominatimConfig::from(svc.provider);
        let config = base.clone().with_rate_limit_ms(250);
        assert_eq!(config.rate_limit_ms, 250);
        assert_eq!(config.base_url, base.base_url);
        assert_eq!(config.user_agent, base.user_agent);
    }
}
