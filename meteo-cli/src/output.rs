use meteo_core::{NetworkError, ProviderId, WeatherRecord};
use serde_json::json;

/// Multi-line, human-readable summary of a record.
pub fn summary(record: &WeatherRecord) -> String {
    format!(
        "Weather in {} ({})\n\
         \x20 Condition:   {}\n\
         \x20 Temperature: {} (feels like {})\n\
         \x20 Humidity:    {}\n\
         \x20 Wind:        {}\n\
         \x20 Observed:    {}\n",
        record.location_name,
        record.provider,
        record.condition,
        record.temperature_display(),
        record.feels_like_display(),
        record.humidity_display(),
        record.wind_speed_display(),
        record.observed_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

pub fn provider_line(id: ProviderId, configured: bool, is_default: bool) -> String {
    let status = if configured { "configured" } else { "needs API key" };
    let marker = if is_default { " (default)" } else { "" };

    format!("{:<12} {:<16} {status}{marker}", id.as_str(), id.display_name())
}

/// Machine-readable failure for `show --json`.
pub fn error_json(err: &NetworkError) -> String {
    let mut body = json!({ "error": err.tag(), "message": err.to_string() });
    if let NetworkError::HttpError(code) = err {
        body["status"] = json!(code);
    }
    body.to_string()
}
