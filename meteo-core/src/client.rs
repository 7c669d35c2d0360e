//! Retrying request executor.
//!
//! [`NetworkClient`] turns one logical request into one or more physical
//! [`Transport`] calls. Each attempt ends in an [`AttemptOutcome`]; the
//! outcome and the [`RetryPolicy`] decide whether to back off and try again or
//! to finish with a decoded value or a [`NetworkError`].
//!
//! Attempts are strictly sequential. The only await points are the transport
//! call and the backoff sleep, so dropping the returned future (for example
//! through `tokio::time::timeout` or `select!`) stops the loop where it is and
//! no further attempts are made.

use std::{sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{
    endpoint::{Endpoint, RequestDescriptor},
    error::{NetworkError, TransportError},
    retry::{Jitter, RetryPolicy, default_jitter},
    transport::Transport,
};

const BODY_PREVIEW_CHARS: usize = 200;

/// A typed request: where to go and what JSON shape comes back.
pub trait NetworkRequest: Send + Sync {
    type Response: DeserializeOwned + Send;

    fn endpoint(&self) -> Endpoint;

    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Result of one physical attempt.
#[derive(Debug)]
enum AttemptOutcome<T> {
    Decoded(T),
    HttpFailure(u16),
    TransportFailure(TransportError),
    DecodeFailure(String),
    /// 2xx with an empty body.
    Empty,
    /// Status line outside 100..=599.
    Malformed(u16),
}

#[derive(Debug)]
enum Transition<T> {
    Retry,
    Finish(Result<T, NetworkError>),
}

impl<T> AttemptOutcome<T> {
    fn transition(self, attempt: u32, policy: &RetryPolicy) -> Transition<T> {
        let retries_left = policy.has_retries_left(attempt);

        match self {
            AttemptOutcome::Decoded(value) => Transition::Finish(Ok(value)),
            AttemptOutcome::HttpFailure(status)
                if retries_left && policy.is_retryable_status(status) =>
            {
                Transition::Retry
            }
            AttemptOutcome::HttpFailure(status) => {
                Transition::Finish(Err(NetworkError::HttpError(status)))
            }
            AttemptOutcome::TransportFailure(err)
                if retries_left && policy.is_retryable_transport_error(err.kind) =>
            {
                Transition::Retry
            }
            AttemptOutcome::TransportFailure(err) => Transition::Finish(Err((&err).into())),
            AttemptOutcome::DecodeFailure(detail) => {
                Transition::Finish(Err(NetworkError::DecodingError(detail)))
            }
            AttemptOutcome::Empty => Transition::Finish(Err(NetworkError::NoData)),
            AttemptOutcome::Malformed(status) => {
                debug!(status, "status code outside 100..=599");
                Transition::Finish(Err(NetworkError::InvalidResponse))
            }
        }
    }
}

/// Executes requests against a [`Transport`] under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct NetworkClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    jitter: Arc<dyn Jitter>,
}

impl NetworkClient {
    /// Client using the default retry policy and random jitter.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, policy: RetryPolicy::default(), jitter: default_jitter() }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Perform `request` under the client's own policy.
    pub async fn request<R: NetworkRequest>(&self, request: &R) -> Result<R::Response, NetworkError> {
        self.request_with_policy(request, &self.policy).await
    }

    /// Perform `request` under an explicit policy.
    pub async fn request_with_policy<R: NetworkRequest>(
        &self,
        request: &R,
        policy: &RetryPolicy,
    ) -> Result<R::Response, NetworkError> {
        let endpoint = request.endpoint();
        let Some(descriptor) = endpoint.descriptor() else {
            warn!(base = %endpoint.base_url, path = %endpoint.path, "invalid request target");
            return Err(NetworkError::InvalidTarget);
        };
        let descriptor = descriptor.with_headers(request.headers()).with_timeout(request.timeout());

        debug!(method = %descriptor.method, url = %descriptor.url, "request");
        self.execute(&descriptor, policy).await
    }

    /// Run the attempt loop for an already resolved descriptor.
    pub async fn execute<T>(
        &self,
        descriptor: &RequestDescriptor,
        policy: &RetryPolicy,
    ) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send,
    {
        let mut attempt = 0;

        loop {
            let outcome = self.attempt::<T>(descriptor, attempt).await;

            match outcome.transition(attempt, policy) {
                Transition::Finish(Ok(value)) => return Ok(value),
                Transition::Finish(Err(err)) => {
                    warn!(url = %descriptor.url, attempts = attempt + 1, error = %err, "request failed");
                    return Err(err);
                }
                Transition::Retry => {
                    let delay = policy.backoff(attempt, self.jitter.sample());
                    attempt += 1;
                    info!(
                        url = %descriptor.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "waiting before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
        attempt: u32,
    ) -> AttemptOutcome<T> {
        if attempt > 0 {
            debug!(attempt, "retry attempt");
        }
        debug!(url = %descriptor.url, "sending request");

        let res = match self.transport.send(descriptor).await {
            Ok(res) => res,
            Err(err) => {
                debug!(kind = %err.kind, error = %err.message, "transport failure");
                return AttemptOutcome::TransportFailure(err);
            }
        };

        debug!(status = res.status, bytes = res.body.len(), "response");

        if !(100..=599).contains(&res.status) {
            return AttemptOutcome::Malformed(res.status);
        }
        if !res.is_success() {
            return AttemptOutcome::HttpFailure(res.status);
        }
        if res.body.is_empty() {
            return AttemptOutcome::Empty;
        }

        match serde_json::from_slice::<T>(&res.body) {
            Ok(value) => AttemptOutcome::Decoded(value),
            Err(err) => {
                warn!(error = %err, body = %preview(&res.body), "failed to decode response");
                AttemptOutcome::DecodeFailure(err.to_string())
            }
        }
    }
}

fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() > BODY_PREVIEW_CHARS {
        format!("{}...", text.chars().take(BODY_PREVIEW_CHARS).collect::<String>())
    } else {
        text.into_owned()
    }
}
