use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Provider-independent current conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub location_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub condition: String,
    pub wind_speed_mps: f64,
    pub provider: String,
    pub observed_at: DateTime<Utc>,
}

impl WeatherRecord {
    pub fn temperature_display(&self) -> String {
        format!("{:.1}°C", self.temperature_c)
    }

    pub fn feels_like_display(&self) -> String {
        format!("{:.1}°C", self.feels_like_c)
    }

    pub fn wind_speed_display(&self) -> String {
        format!("{:.1} m/s", self.wind_speed_mps)
    }

    pub fn humidity_display(&self) -> String {
        format!("{}%", self.humidity_pct)
    }
}

/// Convert a speed in km/h to m/s.
pub fn kph_to_mps(kph: f64) -> f64 {
    kph / 3.6
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location cannot be empty")]
    Empty,

    #[error("Location must be at least {} characters", Location::MIN_LEN)]
    TooShort,

    #[error("Location must be less than {} characters", Location::MAX_LEN)]
    TooLong,

    #[error("Location contains invalid characters")]
    InvalidCharacters,
}

/// A trimmed, validated place name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location(String);

impl Location {
    pub const MIN_LEN: usize = 2;
    pub const MAX_LEN: usize = 100;

    /// Letters, whitespace, hyphens, apostrophes and commas; 2 to 100 characters.
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let trimmed = input.trim();
        let len = trimmed.chars().count();

        if trimmed.is_empty() {
            return Err(LocationError::Empty);
        }
        if len < Self::MIN_LEN {
            return Err(LocationError::TooShort);
        }
        if len > Self::MAX_LEN {
            return Err(LocationError::TooLong);
        }
        if !trimmed.chars().all(|c| c.is_alphabetic() || is_inline_space(c) || "-',".contains(c)) {
            return Err(LocationError::InvalidCharacters);
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Tab or a Unicode space separator; line breaks are not allowed inside a name.
fn is_inline_space(c: char) -> bool {
    c == '\t' || (c.is_whitespace() && !c.is_control() && !matches!(c, '\u{2028}' | '\u{2029}'))
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Location {
    type Error = LocationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
