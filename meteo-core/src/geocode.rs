//! Place-name lookup used by providers that need coordinates.
//!
//! Geocoding failures live in their own error domain: adapters report them
//! to callers as-is and never feed them through the retry executor.

use async_trait::async_trait;
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};
use thiserror::Error;
use tracing::debug;

use crate::{
    client::{NetworkClient, NetworkRequest},
    endpoint::Endpoint,
    model::Coordinates,
    provider::{DEFAULT_REQUEST_TIMEOUT, json_headers},
    retry::RetryPolicy,
};

pub const OPEN_METEO_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    #[error("No location found for '{0}'")]
    NotFound(String),

    #[error("Geocoding lookup failed: {0}")]
    Lookup(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn resolve(&self, place: &str) -> Result<Coordinates, GeocodeError>;
}

/// Geocoder backed by the free Open-Meteo geocoding API.
///
/// Makes a single attempt per lookup.
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    client: NetworkClient,
    base_url: String,
    timeout: Duration,
}

impl OpenMeteoGeocoder {
    pub fn new(client: NetworkClient) -> Self {
        Self::with_base_url(client, OPEN_METEO_GEOCODING_URL)
    }

    pub fn with_base_url(client: NetworkClient, base_url: impl Into<String>) -> Self {
        Self {
            client: client.with_retry_policy(RetryPolicy::disabled()),
            base_url: base_url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

struct SearchRequest<'a> {
    base_url: &'a str,
    name: &'a str,
    timeout: Duration,
}

impl NetworkRequest for SearchRequest<'_> {
    type Response = GeoSearchResponse;

    fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.base_url, "/search")
            .query("name", self.name)
            .query("count", "1")
            .query("language", "en")
            .query("format", "json")
    }

    fn headers(&self) -> Vec<(String, String)> {
        json_headers()
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct GeoSearchResponse {
    #[serde(default)]
    results: Vec<GeoResult>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    latitude: f64,
    longitude: f64,
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    async fn resolve(&self, place: &str) -> Result<Coordinates, GeocodeError> {
        let request = SearchRequest { base_url: &self.base_url, name: place, timeout: self.timeout };

        let response = self
            .client
            .request(&request)
            .await
            .map_err(|err| GeocodeError::Lookup(err.to_string()))?;

        let hit = response
            .results
            .first()
            .ok_or_else(|| GeocodeError::NotFound(place.to_string()))?;

        let coordinates = Coordinates { latitude: hit.latitude, longitude: hit.longitude };
        debug!(place, %coordinates, "geocoded");

        Ok(coordinates)
    }
}
