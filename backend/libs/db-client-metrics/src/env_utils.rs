//! Environment variable parsing utilities
//!
//! Lenient parsers with defaults. Invalid values never fail startup, they
//! fall back to the default and log a warning.

use tracing::warn;

/// Parse a boolean environment variable
///
/// Accepts `true` and `false` in any case, surrounding whitespace ignored.
/// Missing or empty variables yield `default`.
///
/// # Example
/// ```ignore
/// let enabled = parse_env_bool("OTEL_RUST_METRICS_DB_STATEMENT_TRACKING", true);
/// ```
pub fn parse_env_bool(key: &str, default: bool) -> bool {
    let Some(raw) = std::env::var(key).ok() else {
        return default;
    };

    match parse_bool(&raw) {
        Some(value) => value,
        None if raw.trim().is_empty() => default,
        None => {
            warn!(
                variable = key,
                value = %raw,
                default,
                "Invalid boolean in environment, using default"
            );
            default
        }
    }
}

/// Parse a comma separated list, trimming entries and dropping empty ones
pub fn parse_env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|raw| split_list(&raw))
        .unwrap_or_default()
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
