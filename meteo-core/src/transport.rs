use async_trait::async_trait;
use std::fmt::Debug;

use crate::{endpoint::RequestDescriptor, error::TransportError};

pub mod http;
pub mod stub;

pub use http::ReqwestTransport;
pub use stub::{StubResponse, StubTransport};

/// Raw result of one physical HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Byte-level HTTP call. One invocation is one physical attempt; retries are
/// the caller's business.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}
