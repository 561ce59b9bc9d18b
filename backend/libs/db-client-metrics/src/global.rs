//! Process-wide instance
//!
//! Register once at startup, call [`shutdown`] before the process exits so
//! every connection still open gets its closing `db.client.connection.count`
//! decrement.

use crate::binder::DbMetrics;
use crate::config::{MetricsConfig, METRICS_GROUP};
use crate::sink::MetricsSink;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info};

static INSTANCE: OnceCell<Arc<DbMetrics>> = OnceCell::new();

/// Register with configuration read from the environment
///
/// Returns `None` when the `db` metrics group is disabled.
pub fn register(sink: Arc<dyn MetricsSink>) -> Option<Arc<DbMetrics>> {
    register_with_config(MetricsConfig::from_env(), sink)
}

/// Register with explicit configuration
///
/// The first successful registration wins; later calls return that instance
/// and ignore their arguments.
pub fn register_with_config(
    config: MetricsConfig,
    sink: Arc<dyn MetricsSink>,
) -> Option<Arc<DbMetrics>> {
    if !config.is_group_enabled(METRICS_GROUP) {
        info!(group = METRICS_GROUP, "Database client metrics disabled");
        return None;
    }

    if let Some(existing) = INSTANCE.get() {
        debug!("Database client metrics already registered");
        return Some(Arc::clone(existing));
    }

    let metrics = INSTANCE.get_or_init(|| Arc::new(DbMetrics::new(&config, sink)));
    Some(Arc::clone(metrics))
}

pub fn get() -> Option<Arc<DbMetrics>> {
    INSTANCE.get().cloned()
}

/// Emit closing metrics for every live connection; returns how many
pub fn shutdown() -> usize {
    match INSTANCE.get() {
        Some(metrics) => metrics.clean_up_connections(),
        None => 0,
    }
}
