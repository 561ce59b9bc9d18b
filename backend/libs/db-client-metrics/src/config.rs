//! Instrumentation configuration

use crate::env_utils::{parse_env_bool, parse_env_list};
use crate::tracker::TrackerOptions;
use serde::{Deserialize, Serialize};

/// Metrics group this instrumentation belongs to
pub const METRICS_GROUP: &str = "db";

pub const ENV_CONTEXT_TRACKING: &str = "OTEL_RUST_METRICS_DB_CONTEXT_TRACKING";
pub const ENV_STATEMENT_TRACKING: &str = "OTEL_RUST_METRICS_DB_STATEMENT_TRACKING";
pub const ENV_SEND_ROWS_RETURNED: &str = "OTEL_RUST_METRICS_DB_SEND_ROWS_RETURNED";
pub const ENV_DISABLED_METRICS: &str = "OTEL_RUST_DISABLED_METRICS";

/// Configuration for the database client metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Attach the current OpenTelemetry context to emissions (default: true)
    pub track_context: bool,

    /// Record SQL text as `db.query.text` (default: true)
    pub track_statements: bool,

    /// Emit `db.client.response.returned_rows` (default: true)
    pub track_rows_returned: bool,

    /// Disabled metrics groups; `*` disables every group
    pub disabled_metrics: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            track_context: true,
            track_statements: true,
            track_rows_returned: true,
            disabled_metrics: Vec::new(),
        }
    }
}

impl MetricsConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `OTEL_RUST_METRICS_DB_CONTEXT_TRACKING`: true/false
    /// - `OTEL_RUST_METRICS_DB_STATEMENT_TRACKING`: true/false
    /// - `OTEL_RUST_METRICS_DB_SEND_ROWS_RETURNED`: true/false
    /// - `OTEL_RUST_DISABLED_METRICS`: comma separated group names or `*`
    pub fn from_env() -> Self {
        Self {
            track_context: parse_env_bool(ENV_CONTEXT_TRACKING, true),
            track_statements: parse_env_bool(ENV_STATEMENT_TRACKING, true),
            track_rows_returned: parse_env_bool(ENV_SEND_ROWS_RETURNED, true),
            disabled_metrics: parse_env_list(ENV_DISABLED_METRICS),
        }
    }

    /// Whether a metrics group is enabled; group names are case-insensitive
    pub fn is_group_enabled(&self, group: &str) -> bool {
        if self.disabled_metrics.is_empty() {
            return true;
        }
        if self.disabled_metrics.iter().any(|entry| entry == "*") {
            return false;
        }

        let group = group.trim();
        !self
            .disabled_metrics
            .iter()
            .any(|entry| entry.trim().eq_ignore_ascii_case(group))
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            track_context: self.track_context,
            track_statements: self.track_statements,
            track_rows_returned: self.track_rows_returned,
        }
    }
}
