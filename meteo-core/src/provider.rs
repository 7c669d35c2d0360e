use crate::{NetworkError, model::Location, model::WeatherRecord};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, time::Duration};

pub mod openmeteo;
pub mod weatherapi;

pub use openmeteo::OpenMeteoProvider;
pub use weatherapi::WeatherApiProvider;

/// Per-request timeout used by the provider adapters unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const USER_AGENT: &str = concat!("meteo/", env!("CARGO_PKG_VERSION"));

pub(crate) fn json_headers() -> Vec<(String, String)> {
    vec![
        ("Accept".to_string(), "application/json".to_string()),
        ("User-Agent".to_string(), USER_AGENT.to_string()),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "openmeteo",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    /// Name shown to users and stored in [`WeatherRecord::provider`].
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "Open-Meteo",
            ProviderId::WeatherApi => "WeatherAPI.com",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::WeatherApi)
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openmeteo" | "open-meteo" => Ok(ProviderId::OpenMeteo),
            "weatherapi" | "weatherapi.com" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openmeteo, weatherapi."
            )),
        }
    }
}

/// One external weather API, mapped onto [`WeatherRecord`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch(&self, location: &Location) -> Result<WeatherRecord, NetworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_accepts_display_spellings() {
        assert_eq!(ProviderId::try_from("Open-Meteo").unwrap(), ProviderId::OpenMeteo);
        assert_eq!(ProviderId::try_from("WeatherAPI.com").unwrap(), ProviderId::WeatherApi);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn only_weatherapi_needs_a_key() {
        assert!(!ProviderId::OpenMeteo.requires_api_key());
        assert!(ProviderId::WeatherApi.requires_api_key());
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert!(USER_AGENT.starts_with("meteo/"));
        assert_eq!(json_headers().len(), 2);
    }
}
