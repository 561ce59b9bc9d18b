//! Process-wide registration
//!
//! Kept in its own test binary so the global instance starts out empty.

use db_client_metrics::config::ENV_DISABLED_METRICS;
use db_client_metrics::semconv::metrics::DB_CLIENT_CONNECTION_COUNT;
use db_client_metrics::{global, InMemorySink, InstrumentedConnector, MetricsConfig, SqliteConnector};
use serial_test::serial;
use std::env;
use std::sync::Arc;

#[test]
#[serial]
fn test_register_returns_none_when_group_disabled() {
    env::set_var(ENV_DISABLED_METRICS, "db");
    let registered = global::register(Arc::new(InMemorySink::new()));
    env::remove_var(ENV_DISABLED_METRICS);

    assert!(registered.is_none());

    let config = MetricsConfig {
        disabled_metrics: vec!["*".to_string()],
        ..MetricsConfig::default()
    };
    assert!(global::register_with_config(config, Arc::new(InMemorySink::new())).is_none());
}

#[tokio::test]
#[serial]
async fn test_shutdown_closes_live_connections() {
    let sink = Arc::new(InMemorySink::new());
    let metrics = global::register_with_config(MetricsConfig::default(), sink.clone())
        .expect("db group enabled");

    // Later registrations hand back the first instance
    let again = global::register_with_config(MetricsConfig::default(), Arc::new(InMemorySink::new()))
        .expect("db group enabled");
    assert!(Arc::ptr_eq(&metrics, &again));
    assert!(global::get().is_some());

    let connector = InstrumentedConnector::new(SqliteConnector::new(), metrics);
    let conn = connector
        .connect("sqlite::memory:")
        .await
        .expect("in-memory connection");

    assert_eq!(global::shutdown(), 1);
    assert_eq!(sink.sum(DB_CLIENT_CONNECTION_COUNT), 0.0);

    drop(conn);
    assert_eq!(global::shutdown(), 0);
    assert_eq!(sink.by_name(DB_CLIENT_CONNECTION_COUNT).len(), 2);
}
