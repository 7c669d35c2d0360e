//! Scriptable in-memory transport.
//!
//! Maps target URLs to canned outcomes, counts calls per URL and can delay
//! responses. Used by the test suites and handy for offline demos.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    endpoint::RequestDescriptor,
    error::{TransportError, TransportErrorKind},
};

use super::{RawResponse, Transport};

/// One scripted outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubResponse {
    Response(RawResponse),
    Error(TransportErrorKind),
}

impl StubResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        let mut res = RawResponse::new(status, body.into().into_bytes());
        res.headers.push(("Content-Type".into(), "application/json".into()));
        StubResponse::Response(res)
    }

    pub fn status(status: u16) -> Self {
        StubResponse::Response(RawResponse::new(status, Vec::new()))
    }

    pub fn error(kind: TransportErrorKind) -> Self {
        StubResponse::Error(kind)
    }
}

#[derive(Debug, Default)]
struct Script {
    // The last entry repeats forever.
    outcomes: VecDeque<StubResponse>,
    delay: Duration,
}

impl Script {
    fn next(&mut self) -> Option<StubResponse> {
        if self.outcomes.len() > 1 { self.outcomes.pop_front() } else { self.outcomes.front().cloned() }
    }
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, Script>,
    calls: HashMap<String, usize>,
    requests: Vec<RequestDescriptor>,
}

#[derive(Debug, Default)]
pub struct StubTransport {
    state: Mutex<State>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `url` with `outcome`.
    pub fn respond(&self, url: impl AsRef<str>, outcome: StubResponse) -> &Self {
        self.respond_sequence(url, vec![outcome])
    }

    /// Answer `url` with `outcomes` in order, repeating the last one.
    pub fn respond_sequence(&self, url: impl AsRef<str>, outcomes: Vec<StubResponse>) -> &Self {
        let mut state = self.lock();
        let script = state.scripts.entry(url.as_ref().to_string()).or_default();
        script.outcomes = outcomes.into();
        self
    }

    /// Wait `delay` before answering each call to `url`.
    pub fn delay(&self, url: impl AsRef<str>, delay: Duration) -> &Self {
        self.lock().scripts.entry(url.as_ref().to_string()).or_default().delay = delay;
        self
    }

    pub fn calls(&self, url: impl AsRef<str>) -> usize {
        self.lock().calls.get(url.as_ref()).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.lock().requests.clone()
    }

    /// Forget every script and counter.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.scripts.clear();
        state.calls.clear();
        state.requests.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let url = request.url.as_str();

        let (outcome, delay) = {
            let mut state = self.lock();
            *state.calls.entry(url.to_string()).or_insert(0) += 1;
            state.requests.push(request.clone());

            match state.scripts.get_mut(url) {
                Some(script) => (script.next(), script.delay),
                None => (None, Duration::ZERO),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Some(StubResponse::Response(res)) => Ok(res),
            Some(StubResponse::Error(kind)) => {
                Err(TransportError::new(kind, format!("stubbed {kind} for {url}")))
            }
            None => Err(TransportError::new(
                TransportErrorKind::CannotFindHost,
                format!("no stub registered for {url}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;

    fn descriptor(path: &str) -> RequestDescriptor {
        Endpoint::new("https://stub.test", path).descriptor().expect("descriptor")
    }

    #[tokio::test]
    async fn sequence_repeats_last_outcome_and_counts_calls() {
        let stub = StubTransport::new();
        let req = descriptor("/a");
        stub.respond_sequence(
            &req.url,
            vec![StubResponse::status(503), StubResponse::json(200, "{}")],
        );

        assert_eq!(stub.send(&req).await.unwrap().status, 503);
        assert_eq!(stub.send(&req).await.unwrap().status, 200);
        assert_eq!(stub.send(&req).await.unwrap().status, 200);

        assert_eq!(stub.calls(&req.url), 3);
        assert_eq!(stub.calls("https://stub.test/other"), 0);
    }

    #[tokio::test]
    async fn unscripted_url_fails_and_is_still_counted() {
        let stub = StubTransport::new();
        let req = descriptor("/missing");

        let err = stub.send(&req).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::CannotFindHost);
        assert_eq!(stub.total_calls(), 1);
        assert_eq!(stub.requests()[0].url, req.url);

        stub.reset();
        assert_eq!(stub.total_calls(), 0);
        assert!(stub.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied_before_answering() {
        let stub = StubTransport::new();
        let req = descriptor("/slow");
        stub.respond(&req.url, StubResponse::error(TransportErrorKind::TimedOut))
            .delay(&req.url, Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let err = stub.send(&req).await.unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
