//! Retry policy and backoff computation.
//!
//! A [`RetryPolicy`] is a plain immutable value: how many times to retry,
//! how long to wait between attempts, and which HTTP statuses and transport
//! failures count as transient. The executor in [`crate::client`] reads it;
//! nothing here performs I/O.

use std::{collections::HashSet, fmt, str::FromStr, sync::Arc, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::TransportErrorKind;

const DEFAULT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];
const CDN_STATUSES: [u16; 5] = [520, 521, 522, 523, 524];

const DEFAULT_TRANSPORT_ERRORS: [TransportErrorKind; 4] = [
    TransportErrorKind::NotConnected,
    TransportErrorKind::ConnectionLost,
    TransportErrorKind::TimedOut,
    TransportErrorKind::CannotConnectToHost,
];

/// Jitter is drawn from `[JITTER_MIN, JITTER_MAX)` and added as a fraction of the delay.
pub const JITTER_MIN: f64 = 0.1;
pub const JITTER_MAX: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max_delay ({max:?}) must not be shorter than base_delay ({base:?})")]
    MaxDelayBelowBase { base: Duration, max: Duration },

    #[error("backoff multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),
}

/// How a logical request is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    retryable_status_codes: HashSet<u16>,
    retryable_transport_errors: HashSet<TransportErrorKind>,
}

impl RetryPolicy {
    /// Build a custom policy, checking `max_delay >= base_delay` and `multiplier >= 1.0`.
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
        retryable_status_codes: impl IntoIterator<Item = u16>,
        retryable_transport_errors: impl IntoIterator<Item = TransportErrorKind>,
    ) -> Result<Self, PolicyError> {
        if max_delay < base_delay {
            return Err(PolicyError::MaxDelayBelowBase { base: base_delay, max: max_delay });
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(backoff_multiplier));
        }

        Ok(Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_multiplier,
            retryable_status_codes: retryable_status_codes.into_iter().collect(),
            retryable_transport_errors: retryable_transport_errors.into_iter().collect(),
        })
    }

    /// 3 retries, 1s base, 30s cap, doubling.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            retryable_status_codes: DEFAULT_STATUSES.into_iter().collect(),
            retryable_transport_errors: DEFAULT_TRANSPORT_ERRORS.into_iter().collect(),
        }
    }

    /// 5 retries, 0.5s base, 60s cap, x1.5; also retries CDN 52x statuses and DNS failures.
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
            retryable_status_codes: DEFAULT_STATUSES.into_iter().chain(CDN_STATUSES).collect(),
            retryable_transport_errors: DEFAULT_TRANSPORT_ERRORS
                .into_iter()
                .chain([TransportErrorKind::DnsLookupFailed])
                .collect(),
        }
    }

    /// Single attempt, every failure is terminal.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            retryable_status_codes: HashSet::new(),
            retryable_transport_errors: HashSet::new(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on physical attempts for one logical request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    pub fn is_retryable_transport_error(&self, kind: TransportErrorKind) -> bool {
        self.retryable_transport_errors.contains(&kind)
    }

    /// Whether attempt `attempt` (0-based) may be followed by another one.
    pub fn has_retries_left(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Backoff before the attempt following failed attempt `attempt`, ignoring jitter.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        self.capped(self.exponential_secs(attempt))
    }

    /// Backoff before the attempt following failed attempt `attempt`.
    ///
    /// `jitter` is the fraction added on top of the exponential delay; the
    /// result never exceeds `max_delay`.
    pub fn backoff(&self, attempt: u32, jitter: f64) -> Duration {
        self.capped(self.exponential_secs(attempt) * (1.0 + jitter.max(0.0)))
    }

    fn exponential_secs(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent)
    }

    fn capped(&self, secs: f64) -> Duration {
        let max = self.max_delay.as_secs_f64();
        if secs.is_nan() || secs >= max {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Named policy, as written in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPreset {
    #[default]
    Default,
    Aggressive,
    Disabled,
}

impl RetryPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryPreset::Default => "default",
            RetryPreset::Aggressive => "aggressive",
            RetryPreset::Disabled => "disabled",
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        match self {
            RetryPreset::Default => RetryPolicy::standard(),
            RetryPreset::Aggressive => RetryPolicy::aggressive(),
            RetryPreset::Disabled => RetryPolicy::disabled(),
        }
    }
}

impl fmt::Display for RetryPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetryPreset {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "default" => Ok(RetryPreset::Default),
            "aggressive" => Ok(RetryPreset::Aggressive),
            "disabled" | "none" => Ok(RetryPreset::Disabled),
            _ => Err(anyhow::anyhow!(
                "Unknown retry preset '{value}'. Supported presets: default, aggressive, disabled."
            )),
        }
    }
}

/// Source of the random fraction added to each backoff delay.
pub trait Jitter: Send + Sync + fmt::Debug {
    /// A value in `[JITTER_MIN, JITTER_MAX)`.
    fn sample(&self) -> f64;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(JITTER_MIN..JITTER_MAX)
    }
}

/// Always returns the same fraction, clamped into the jitter range.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn sample(&self) -> f64 {
        self.0.clamp(JITTER_MIN, JITTER_MAX)
    }
}

pub(crate) fn default_jitter() -> Arc<dyn Jitter> {
    Arc::new(RandomJitter)
}
