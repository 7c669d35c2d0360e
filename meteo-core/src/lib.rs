//! Core library for the `meteo` CLI.
//!
//! This crate defines:
//! - A retrying HTTP executor with a closed error taxonomy
//! - Retry policies and jittered exponential backoff
//! - A transport abstraction (reqwest in production, a scriptable stub for tests)
//! - Weather provider adapters mapping provider JSON onto one record type
//! - Configuration & credentials handling
//!
//! It is used by `meteo-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod geocode;
pub mod model;
pub mod provider;
pub mod retry;
pub mod service;
pub mod transport;

pub use client::{NetworkClient, NetworkRequest};
pub use config::{Config, ProviderConfig};
pub use endpoint::{Endpoint, HttpMethod, RequestDescriptor};
pub use error::{NetworkError, TransportError, TransportErrorKind};
pub use geocode::{GeocodeError, Geocoder, OpenMeteoGeocoder};
pub use model::{Coordinates, Location, LocationError, WeatherRecord};
pub use provider::{ProviderId, WeatherProvider};
pub use retry::{RetryPolicy, RetryPreset};
pub use service::WeatherService;
pub use transport::{RawResponse, ReqwestTransport, StubTransport, Transport};
