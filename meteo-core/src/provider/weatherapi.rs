use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::{
    NetworkError,
    client::{NetworkClient, NetworkRequest},
    endpoint::Endpoint,
    model::{Location, WeatherRecord, kph_to_mps},
    provider::{DEFAULT_REQUEST_TIMEOUT, ProviderId, WeatherProvider, json_headers},
};

pub const WEATHER_API_URL: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com current conditions. Needs an API key, takes free-text places.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    client: NetworkClient,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl WeatherApiProvider {
    pub fn new(client: NetworkClient, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: WEATHER_API_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

struct CurrentRequest<'a> {
    base_url: &'a str,
    api_key: &'a str,
    location: &'a str,
    timeout: Duration,
}

impl NetworkRequest for CurrentRequest<'_> {
    type Response = WaResponse;

    fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.base_url, "/current.json")
            .query("key", self.api_key)
            .query("q", self.location)
            .query("aqi", "no")
    }

    fn headers(&self) -> Vec<(String, String)> {
        json_headers()
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: u8,
    wind_kph: f64,
    condition: WaCondition,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: Option<WaLocation>,
    current: WaCurrent,
}

impl WaResponse {
    fn into_record(self, requested: &Location) -> WeatherRecord {
        let observed_at = self
            .current
            .last_updated_epoch
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        let location_name = self
            .location
            .map(|l| l.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| requested.name().to_string());

        WeatherRecord {
            location_name,
            temperature_c: self.current.temp_c,
            feels_like_c: self.current.feelslike_c,
            humidity_pct: self.current.humidity,
            condition: self.current.condition.text,
            wind_speed_mps: kph_to_mps(self.current.wind_kph),
            provider: ProviderId::WeatherApi.display_name().to_string(),
            observed_at,
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn fetch(&self, location: &Location) -> Result<WeatherRecord, NetworkError> {
        debug!(location = %location, "requesting WeatherAPI.com current conditions");

        let request = CurrentRequest {
            base_url: &self.base_url,
            api_key: &self.api_key,
            location: location.name(),
            timeout: self.timeout,
        };
        let response = self.client.request(&request).await?;

        Ok(response.into_record(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        retry::RetryPolicy,
        transport::{StubResponse, StubTransport},
    };
    use std::sync::Arc;

    const BASE: &str = "https://wa.test/v1";
    const PARIS_URL: &str = "https://wa.test/v1/current.json?key=test-key&q=Paris&aqi=no";

    const BODY: &str = r#"{
        "location": {"name": "Paris", "region": "Ile-de-France", "country": "France", "localtime_epoch": 1727704800},
        "current": {
            "last_updated_epoch": 1727704800,
            "temp_c": 20.0,
            "is_day": 1,
            "condition": {"text": "Sunny", "icon": "//cdn.weatherapi.com/113.png", "code": 1000},
            "wind_kph": 36.0,
            "humidity": 70,
            "feelslike_c": 19.5,
            "short_rad": 12.3
        }
    }"#;

    fn provider(stub: &Arc<StubTransport>, policy: RetryPolicy) -> WeatherApiProvider {
        let client = NetworkClient::new(stub.clone()).with_retry_policy(policy);
        WeatherApiProvider::new(client, "test-key".into()).with_base_url(BASE)
    }

    fn paris() -> Location {
        Location::parse("Paris").unwrap()
    }

    #[tokio::test]
    async fn maps_response_into_record() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(PARIS_URL, StubResponse::json(200, BODY));

        let record = provider(&stub, RetryPolicy::disabled()).fetch(&paris()).await.unwrap();

        assert_eq!(record.location_name, "Paris");
        assert_eq!(record.temperature_c, 20.0);
        assert_eq!(record.feels_like_c, 19.5);
        assert_eq!(record.humidity_pct, 70);
        assert_eq!(record.condition, "Sunny");
        assert_eq!(record.wind_speed_mps, 10.0);
        assert_eq!(record.provider, "WeatherAPI.com");
        assert_eq!(record.observed_at.timestamp(), 1_727_704_800);
        assert_eq!(stub.calls(PARIS_URL), 1);
    }

    #[tokio::test]
    async fn location_block_is_optional() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(
            PARIS_URL,
            StubResponse::json(
                200,
                r#"{"current":{"temp_c":1.0,"feelslike_c":-2.0,"humidity":90,"wind_kph":7.2,"condition":{"text":"Mist"}}}"#,
            ),
        );

        let record = provider(&stub, RetryPolicy::disabled()).fetch(&paris()).await.unwrap();

        assert_eq!(record.location_name, "Paris");
        assert_eq!(record.wind_speed_mps, 2.0);
    }

    #[tokio::test]
    async fn mistyped_field_is_a_decoding_error() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(
            PARIS_URL,
            StubResponse::json(
                200,
                r#"{"current":{"temp_c":"warm","feelslike_c":1.0,"humidity":90,"wind_kph":7.2,"condition":{"text":"Mist"}}}"#,
            ),
        );

        let err = provider(&stub, RetryPolicy::standard()).fetch(&paris()).await.unwrap_err();

        assert!(matches!(err, NetworkError::DecodingError(_)), "{err:?}");
        assert_eq!(stub.calls(PARIS_URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried_with_the_default_policy() {
        let stub = Arc::new(StubTransport::new());
        stub.respond_sequence(
            PARIS_URL,
            vec![StubResponse::status(502), StubResponse::json(200, BODY)],
        );

        let record = provider(&stub, RetryPolicy::standard()).fetch(&paris()).await.unwrap();

        assert_eq!(record.condition, "Sunny");
        assert_eq!(stub.calls(PARIS_URL), 2);
    }

    #[tokio::test]
    async fn unauthorized_is_surfaced_as_http_error() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(PARIS_URL, StubResponse::json(401, r#"{"error":{"code":2006}}"#));

        let err = provider(&stub, RetryPolicy::standard()).fetch(&paris()).await.unwrap_err();

        assert_eq!(err, NetworkError::HttpError(401));
    }
}
