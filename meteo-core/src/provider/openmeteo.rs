use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    NetworkError,
    client::{NetworkClient, NetworkRequest},
    endpoint::Endpoint,
    geocode::Geocoder,
    model::{Coordinates, Location, WeatherRecord, kph_to_mps},
    provider::{DEFAULT_REQUEST_TIMEOUT, ProviderId, WeatherProvider, json_headers},
};

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1";

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m";

/// Open-Meteo forecast API. Free, keyless, coordinate based.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: NetworkClient,
    geocoder: Arc<dyn Geocoder>,
    base_url: String,
    timeout: Duration,
}

impl OpenMeteoProvider {
    pub fn new(client: NetworkClient, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            client,
            geocoder,
            base_url: OPEN_METEO_URL.to_string(),
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

struct ForecastRequest<'a> {
    base_url: &'a str,
    coordinates: Coordinates,
    timeout: Duration,
}

impl NetworkRequest for ForecastRequest<'_> {
    type Response = OmResponse;

    fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.base_url, "/forecast")
            .query("latitude", self.coordinates.latitude.to_string())
            .query("longitude", self.coordinates.longitude.to_string())
            .query("current", CURRENT_FIELDS)
            .query("timezone", "auto")
    }

    fn headers(&self) -> Vec<(String, String)> {
        json_headers()
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: Option<String>,
    temperature_2m: f64,
    relative_humidity_2m: u8,
    apparent_temperature: f64,
    weather_code: u16,
    wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    current: OmCurrent,
}

/// WMO weather interpretation code as text.
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow fall",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

// `current.time` is local wall-clock time without seconds, e.g. "2025-09-30T14:00".
fn local_to_utc(time: &str, utc_offset_seconds: i32) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    let offset = FixedOffset::east_opt(utc_offset_seconds)?;

    offset.from_local_datetime(&naive).single().map(|dt| dt.with_timezone(&Utc))
}

impl OmResponse {
    fn into_record(self, location: &Location) -> WeatherRecord {
        let observed_at = self
            .current
            .time
            .as_deref()
            .and_then(|t| local_to_utc(t, self.utc_offset_seconds))
            .unwrap_or_else(Utc::now);

        WeatherRecord {
            location_name: location.name().to_string(),
            temperature_c: self.current.temperature_2m,
            feels_like_c: self.current.apparent_temperature,
            humidity_pct: self.current.relative_humidity_2m,
            condition: describe_weather_code(self.current.weather_code).to_string(),
            wind_speed_mps: kph_to_mps(self.current.wind_speed_10m),
            provider: ProviderId::OpenMeteo.display_name().to_string(),
            observed_at,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn fetch(&self, location: &Location) -> Result<WeatherRecord, NetworkError> {
        let coordinates = self.geocoder.resolve(location.name()).await.map_err(|err| {
            warn!(location = %location, error = %err, "geocoding failed");
            NetworkError::InvalidResponse
        })?;
        debug!(location = %location, %coordinates, "requesting Open-Meteo forecast");

        let request =
            ForecastRequest { base_url: &self.base_url, coordinates, timeout: self.timeout };
        let response = self.client.request(&request).await?;

        Ok(response.into_record(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geocode::GeocodeError,
        retry::RetryPolicy,
        transport::{StubResponse, StubTransport},
    };
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://om.test/v1";
    const LONDON: Coordinates = Coordinates { latitude: 51.5074, longitude: -0.1278 };

    const BODY: &str = r#"{
        "latitude": 51.5,
        "longitude": -0.12,
        "generationtime_ms": 0.04,
        "utc_offset_seconds": 3600,
        "timezone": "Europe/London",
        "timezone_abbreviation": "BST",
        "elevation": 23.0,
        "current_units": {"temperature_2m": "°C", "wind_speed_10m": "km/h"},
        "current": {
            "time": "2025-09-30T14:00",
            "interval": 900,
            "temperature_2m": 22.5,
            "relative_humidity_2m": 65,
            "apparent_temperature": 21.8,
            "weather_code": 2,
            "wind_speed_10m": 36.0
        }
    }"#;

    #[derive(Debug, Default)]
    struct FixedGeocoder {
        calls: AtomicUsize,
        result: Option<Coordinates>,
    }

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn resolve(&self, place: &str) -> Result<Coordinates, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.ok_or_else(|| GeocodeError::NotFound(place.to_string()))
        }
    }

    fn forecast_url() -> String {
        ForecastRequest { base_url: BASE, coordinates: LONDON, timeout: DEFAULT_REQUEST_TIMEOUT }
            .endpoint()
            .url()
            .expect("url")
            .to_string()
    }

    fn provider(stub: &Arc<StubTransport>, geocoder: Arc<FixedGeocoder>) -> OpenMeteoProvider {
        let client = NetworkClient::new(stub.clone()).with_retry_policy(RetryPolicy::disabled());
        OpenMeteoProvider::new(client, geocoder).with_base_url(BASE)
    }

    fn london() -> Location {
        Location::parse("London").unwrap()
    }

    #[test]
    fn forecast_url_carries_coordinates_and_fields() {
        let url = forecast_url();
        assert!(url.starts_with("https://om.test/v1/forecast?latitude=51.5074&longitude=-0.1278"));
        assert!(url.contains("current=temperature_2m%2Crelative_humidity_2m"));
        assert!(url.ends_with("&timezone=auto"));
    }

    #[tokio::test]
    async fn maps_response_into_record() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(forecast_url(), StubResponse::json(200, BODY));
        let geocoder = Arc::new(FixedGeocoder { result: Some(LONDON), ..Default::default() });

        let record = provider(&stub, geocoder).fetch(&london()).await.unwrap();

        assert_eq!(record.location_name, "London");
        assert_eq!(record.temperature_c, 22.5);
        assert_eq!(record.feels_like_c, 21.8);
        assert_eq!(record.humidity_pct, 65);
        assert_eq!(record.condition, "Partly cloudy");
        assert_eq!(record.wind_speed_mps, 10.0);
        assert_eq!(record.provider, "Open-Meteo");
        assert_eq!(record.observed_at, Utc.with_ymd_and_hms(2025, 9, 30, 13, 0, 0).unwrap());

        let sent = &stub.requests()[0];
        assert_eq!(sent.timeout, Some(DEFAULT_REQUEST_TIMEOUT));
        assert!(sent.headers.iter().any(|(k, v)| k == "Accept" && v == "application/json"));
    }

    #[tokio::test]
    async fn geocoding_failure_is_terminal_and_skips_the_forecast() {
        let stub = Arc::new(StubTransport::new());
        let geocoder = Arc::new(FixedGeocoder::default());

        let err = provider(&stub, geocoder.clone()).fetch(&london()).await.unwrap_err();

        assert_eq!(err, NetworkError::InvalidResponse);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stub.total_calls(), 0);
    }

    #[tokio::test]
    async fn missing_current_block_is_a_decoding_error() {
        let stub = Arc::new(StubTransport::new());
        stub.respond(forecast_url(), StubResponse::json(200, r#"{"latitude":51.5}"#));
        let geocoder = Arc::new(FixedGeocoder { result: Some(LONDON), ..Default::default() });

        let err = provider(&stub, geocoder).fetch(&london()).await.unwrap_err();

        assert!(matches!(err, NetworkError::DecodingError(_)), "{err:?}");
    }

    #[test]
    fn weather_code_table() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(3), "Overcast");
        assert_eq!(describe_weather_code(48), "Fog");
        assert_eq!(describe_weather_code(57), "Freezing drizzle");
        assert_eq!(describe_weather_code(65), "Rain");
        assert_eq!(describe_weather_code(67), "Freezing rain");
        assert_eq!(describe_weather_code(75), "Snow fall");
        assert_eq!(describe_weather_code(77), "Snow grains");
        assert_eq!(describe_weather_code(81), "Rain showers");
        assert_eq!(describe_weather_code(86), "Snow showers");
        assert_eq!(describe_weather_code(95), "Thunderstorm");
        assert_eq!(describe_weather_code(99), "Thunderstorm with hail");
        assert_eq!(describe_weather_code(4), "Unknown");
        assert_eq!(describe_weather_code(100), "Unknown");
    }

    #[test]
    fn local_time_is_shifted_by_offset() {
        let utc = local_to_utc("2025-01-01T00:30", -18_000).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 1, 1, 5, 30, 0).unwrap());
        assert!(local_to_utc("yesterday", 0).is_none());
    }
}
