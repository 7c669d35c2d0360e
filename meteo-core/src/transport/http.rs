use std::{error::Error as StdError, io, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::{
    endpoint::{HttpMethod, RequestDescriptor},
    error::{TransportError, TransportErrorKind},
};

use super::{RawResponse, Transport};

/// Production transport over a shared `reqwest` client.
///
/// Connection pooling stays inside the `reqwest::Client`; nothing about one
/// request leaks into the next beyond reused sockets.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: Client,
    default_timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout applied when a request carries no override of its own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout.or(self.default_timeout) {
            builder = builder.timeout(timeout);
        }

        let res = builder.send().await.map_err(classify)?;

        let status = res.status().as_u16();
        let headers = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = res.bytes().await.map_err(classify)?.to_vec();

        Ok(RawResponse { status, headers, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    let message = error_chain(&err);

    let kind = if err.is_timeout() {
        TransportErrorKind::TimedOut
    } else if err.is_connect() {
        if is_dns_failure(&message) {
            TransportErrorKind::DnsLookupFailed
        } else {
            io_source(&err)
                .map(|io_err| io_kind(io_err.kind()))
                .unwrap_or(TransportErrorKind::CannotConnectToHost)
        }
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::ConnectionLost
    } else if let Some(io_err) = io_source(&err) {
        io_kind(io_err.kind())
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, message)
}

fn io_kind(kind: io::ErrorKind) -> TransportErrorKind {
    match kind {
        io::ErrorKind::TimedOut => TransportErrorKind::TimedOut,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            TransportErrorKind::ConnectionReset
        }
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => {
            TransportErrorKind::ConnectionLost
        }
        io::ErrorKind::NetworkUnreachable | io::ErrorKind::NetworkDown => {
            TransportErrorKind::NotConnected
        }
        io::ErrorKind::ConnectionRefused | io::ErrorKind::HostUnreachable => {
            TransportErrorKind::CannotConnectToHost
        }
        _ => TransportErrorKind::Other,
    }
}

fn io_source(err: &reqwest::Error) -> Option<&io::Error> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return Some(io_err);
        }
        source = inner.source();
    }
    None
}

fn is_dns_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("dns error") || lower.contains("failed to lookup address")
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
