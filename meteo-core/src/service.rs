use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    Config, NetworkError,
    client::NetworkClient,
    geocode::{Geocoder, OpenMeteoGeocoder},
    model::{Location, WeatherRecord},
    provider::{OpenMeteoProvider, ProviderId, WeatherApiProvider, WeatherProvider},
    transport::Transport,
};

/// Caller-facing entry point: one place name, one provider, one record.
#[derive(Debug, Clone)]
pub struct WeatherService {
    open_meteo: OpenMeteoProvider,
    weather_api: Option<WeatherApiProvider>,
}

impl WeatherService {
    pub fn new(open_meteo: OpenMeteoProvider, weather_api: Option<WeatherApiProvider>) -> Self {
        Self { open_meteo, weather_api }
    }

    /// Wire both providers over `transport` using the settings in `config`.
    ///
    /// WeatherAPI.com is only available when the config holds a key for it.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let client = NetworkClient::new(transport).with_retry_policy(config.retry.policy());
        let mut geocoder = OpenMeteoGeocoder::new(client.clone());
        if let Some(timeout) = config.request_timeout() {
            geocoder = geocoder.with_timeout(timeout);
        }
        let geocoder: Arc<dyn Geocoder> = Arc::new(geocoder);

        let mut open_meteo = OpenMeteoProvider::new(client.clone(), geocoder);
        if let Some(url) = config.provider_base_url(ProviderId::OpenMeteo) {
            open_meteo = open_meteo.with_base_url(url);
        }
        if let Some(timeout) = config.request_timeout() {
            open_meteo = open_meteo.with_timeout(timeout);
        }

        let weather_api = config.provider_api_key(ProviderId::WeatherApi).map(|key| {
            let mut provider = WeatherApiProvider::new(client.clone(), key.to_owned());
            if let Some(url) = config.provider_base_url(ProviderId::WeatherApi) {
                provider = provider.with_base_url(url);
            }
            if let Some(timeout) = config.request_timeout() {
                provider = provider.with_timeout(timeout);
            }
            provider
        });

        Self { open_meteo, weather_api }
    }

    pub fn provider(&self, id: ProviderId) -> Option<&dyn WeatherProvider> {
        match id {
            ProviderId::OpenMeteo => Some(&self.open_meteo as &dyn WeatherProvider),
            ProviderId::WeatherApi => self.weather_api.as_ref().map(|p| p as &dyn WeatherProvider),
        }
    }

    /// Fetch current conditions for `location` from the selected provider.
    ///
    /// A provider that was never configured has no usable request target and
    /// fails with [`NetworkError::InvalidTarget`].
    pub async fn fetch_weather(
        &self,
        location: &Location,
        id: ProviderId,
    ) -> Result<WeatherRecord, NetworkError> {
        let Some(provider) = self.provider(id) else {
            warn!(provider = %id, "provider is not configured");
            return Err(NetworkError::InvalidTarget);
        };

        info!(provider = %id, location = %location, "fetching weather");
        provider.fetch(location).await
    }
}
