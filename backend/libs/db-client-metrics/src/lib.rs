//! Database client metrics
//!
//! Instruments a relational database client's connection and statement
//! lifecycle and emits OpenTelemetry database client metrics:
//!
//! - `db.client.operation.duration` (ms) after query, exec and statement execute
//! - `db.client.response.returned_rows` after the same calls
//! - `db.client.connection.count` +1 on connect, -1 on close or shutdown
//! - `db.client.connection.create_time` (ms) after connecting
//! - `db.client.connection.error.count` / `db.client.operation.error.count` on failures
//!
//! Drivers are wrapped with [`InstrumentedConnector`]. Attributes come from
//! three layers merged at emission time: global, per connection (seeded from
//! the DSN) and per statement. The tracker never owns the connections and
//! statements it keeps state for; entries vanish with the objects.

pub mod attributes;
mod binder;
pub mod config;
pub mod driver;
pub mod dsn;
pub mod env_utils;
mod error;
pub mod global;
mod instrumented;
pub mod semconv;
pub mod sink;
pub mod sqlite;
pub mod store;
pub mod tracker;

pub use attributes::{AttributeLayer, AttributeValue, Attributes};
pub use binder::{DbMetrics, OperationOutcome, Tracked};
pub use config::MetricsConfig;
pub use driver::{Connector, DbConnection, DbStatement, ReturnedRows, SqlParam};
pub use dsn::{parse_dsn, DsnError};
pub use error::{DriverError, DriverResult};
pub use instrumented::{InstrumentedConnection, InstrumentedConnector, InstrumentedStatement};
pub use sink::{InMemorySink, MetricsSink, OtelMetricsSink};
pub use sqlite::SqliteConnector;
pub use store::{AssociationStore, EntityId, EntityKind, EntityRef};
pub use tracker::{MetricsTracker, TrackerOptions};
