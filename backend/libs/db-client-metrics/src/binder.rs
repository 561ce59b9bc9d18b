//! Hook handlers and metric emission
//!
//! [`DbMetrics`] is what the façade calls around every intercepted driver
//! call. Pre-hooks start the entity's timer; post-hooks stop it, build the
//! attribute set from the tracker layers and the call outcome, and emit.
//! Nothing here returns an error: telemetry failures are logged and absorbed.

use crate::attributes::{AttributeValue, Attributes};
use crate::config::MetricsConfig;
use crate::dsn::parse_dsn;
use crate::error::DriverError;
use crate::semconv::attributes::{
    CODE_FILE_PATH, CODE_LINE_NUMBER, DB_QUERY_TEXT, ERROR_TYPE, EXCEPTION_MESSAGE,
    EXCEPTION_TYPE,
};
use crate::semconv::metrics::{
    DB_CLIENT_CONNECTION_COUNT, DB_CLIENT_CONNECTION_CREATE_TIME,
    DB_CLIENT_CONNECTION_ERROR_COUNT, DB_CLIENT_OPERATION_DURATION,
    DB_CLIENT_OPERATION_ERROR_COUNT, DB_CLIENT_RESPONSE_RETURNED_ROWS,
};
use crate::semconv::units::{DIMENSIONLESS, MILLISECONDS};
use crate::sink::MetricsSink;
use crate::store::EntityRef;
use crate::tracker::MetricsTracker;
use opentelemetry::Context;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that carries a tracked entity identity
pub trait Tracked {
    fn entity(&self) -> &EntityRef;
}

impl Tracked for EntityRef {
    fn entity(&self) -> &EntityRef {
        self
    }
}

/// What the post-hook of a database operation observed
#[derive(Debug, Clone, Copy)]
pub struct OperationOutcome<'a> {
    /// SQL passed to the call, or the prepared statement's text
    pub statement: Option<&'a str>,
    /// Rows produced by a successful call
    pub returned_rows: Option<u64>,
    pub error: Option<&'a DriverError>,
    /// Where the application made the call
    pub caller: Option<&'static Location<'static>>,
}

pub struct DbMetrics {
    tracker: MetricsTracker,
    sink: Arc<dyn MetricsSink>,
}

impl DbMetrics {
    pub fn new(config: &MetricsConfig, sink: Arc<dyn MetricsSink>) -> Self {
        info!(
            track_context = config.track_context,
            track_statements = config.track_statements,
            track_rows_returned = config.track_rows_returned,
            "Database client metrics registered"
        );

        Self {
            tracker: MetricsTracker::new(config.tracker_options()),
            sink,
        }
    }

    pub fn tracker(&self) -> &MetricsTracker {
        &self.tracker
    }

    // ----- hooks -----

    /// Pre-hook of every timed call
    pub fn before_call(&self, target: &EntityRef) {
        self.tracker.start(target);
    }

    /// Post-hook of connection construction
    ///
    /// On success the connection is registered for the shutdown sweep and
    /// `db.client.connection.count` goes up by one.
    pub fn after_connect(
        &self,
        connection: &EntityRef,
        dsn: &str,
        error: Option<&DriverError>,
        caller: Option<&'static Location<'static>>,
    ) {
        let duration = self.tracker.stop(connection);

        if error.is_none() {
            self.tracker.track_connection(connection);
        }
        let context = self.current_context();

        let dsn_attributes = match parse_dsn(dsn) {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!(error = %e, "Could not parse DSN, connection attributes omitted");
                Attributes::new()
            }
        };
        let attributes = self.tracker.add_attributes(connection, dsn_attributes);

        let attributes = self.handle_error(
            DB_CLIENT_CONNECTION_ERROR_COUNT,
            error,
            caller,
            attributes,
            context.as_ref(),
        );
        self.record_duration(
            DB_CLIENT_CONNECTION_CREATE_TIME,
            duration,
            &attributes,
            context.as_ref(),
        );

        if error.is_none() {
            self.sink.add_up_down_counter(
                DB_CLIENT_CONNECTION_COUNT,
                1,
                &attributes,
                context.as_ref(),
            );
        }
    }

    /// Post-hook of query, exec and statement execute
    pub fn after_operation(&self, target: &EntityRef, outcome: OperationOutcome<'_>) {
        let duration = self.tracker.stop(target);
        let context = self.current_context();

        let mut attributes = self.tracker.get_attributes(target);

        if self.tracker.is_track_statements() {
            if let Some(statement) = outcome.statement.filter(|s| !s.is_empty()) {
                attributes.insert(DB_QUERY_TEXT.to_string(), AttributeValue::from(statement));
            }
        }

        let attributes = self.handle_error(
            DB_CLIENT_OPERATION_ERROR_COUNT,
            outcome.error,
            outcome.caller,
            attributes,
            context.as_ref(),
        );
        self.record_duration(
            DB_CLIENT_OPERATION_DURATION,
            duration,
            &attributes,
            context.as_ref(),
        );

        if !self.tracker.is_track_rows_returned() {
            return;
        }
        if let Some(rows) = outcome.returned_rows {
            self.sink.record_histogram(
                DB_CLIENT_RESPONSE_RETURNED_ROWS,
                rows as f64,
                DIMENSIONLESS,
                &attributes,
                context.as_ref(),
            );
        }
    }

    /// Post-hook of prepare
    pub fn after_prepare(&self, statement: &EntityRef, connection: &EntityRef) {
        self.tracker.map_statement_to_connection(statement, connection);
    }

    /// A connection handle went away before shutdown
    pub fn connection_closed(&self, connection: &EntityRef) {
        if !self.tracker.untrack_connection(connection) {
            return;
        }
        let context = self.current_context();
        let attributes = self.tracker.get_attributes(connection);
        self.sink.add_up_down_counter(
            DB_CLIENT_CONNECTION_COUNT,
            -1,
            &attributes,
            context.as_ref(),
        );
    }

    /// Shutdown sweep: one `db.client.connection.count` decrement per
    /// connection still alive, which is then untracked
    pub fn clean_up_connections(&self) -> usize {
        let context = self.current_context();
        let mut closed = 0;

        for connection in self.tracker.connections() {
            if !self.tracker.untrack_connection(&connection) {
                continue;
            }
            let attributes = self.tracker.get_attributes(&connection);
            self.sink.add_up_down_counter(
                DB_CLIENT_CONNECTION_COUNT,
                -1,
                &attributes,
                context.as_ref(),
            );
            closed += 1;
        }

        info!(connections = closed, "Database connections cleaned up");
        closed
    }

    // ----- attribute API -----

    /// Set one attribute on an entity, or globally when `entity` is `None`
    pub fn add_attribute(
        &self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
        entity: Option<&dyn Tracked>,
    ) -> Attributes {
        let key: String = key.into();
        let value: AttributeValue = value.into();
        self.add_attributes([(key, value)], entity)
    }

    pub fn add_attributes<I, K, V>(&self, attributes: I, entity: Option<&dyn Tracked>) -> Attributes
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        match entity {
            Some(entity) => self.tracker.add_attributes(entity.entity(), attributes),
            None => self.tracker.add_global_attributes(attributes),
        }
    }

    /// Hide an inherited attribute; the merged view then maps `key` to null
    pub fn remove_attribute(&self, key: impl Into<String>, entity: Option<&dyn Tracked>) -> Attributes {
        self.add_attribute(key, AttributeValue::Null, entity)
    }

    pub fn get_attributes(&self, entity: Option<&dyn Tracked>) -> Attributes {
        match entity {
            Some(entity) => self.tracker.get_attributes(entity.entity()),
            None => self.tracker.get_global_attributes(),
        }
    }

    // ----- helpers -----

    fn current_context(&self) -> Option<Context> {
        self.tracker.is_track_context().then(Context::current)
    }

    fn handle_error(
        &self,
        metric: &'static str,
        error: Option<&DriverError>,
        caller: Option<&'static Location<'static>>,
        mut attributes: Attributes,
        context: Option<&Context>,
    ) -> Attributes {
        let Some(error) = error else {
            return attributes;
        };

        attributes.insert(EXCEPTION_TYPE.to_string(), AttributeValue::from(error.kind()));
        attributes.insert(
            EXCEPTION_MESSAGE.to_string(),
            AttributeValue::from(error.to_string()),
        );
        if let Some(caller) = caller {
            attributes.insert(CODE_FILE_PATH.to_string(), AttributeValue::from(caller.file()));
            attributes.insert(
                CODE_LINE_NUMBER.to_string(),
                AttributeValue::from(caller.line()),
            );
        }
        if let Some(code) = error.code() {
            attributes.insert(ERROR_TYPE.to_string(), AttributeValue::from(code));
        }

        debug!(metric, error = %error, "Database call failed");
        self.sink.add_counter(metric, 1, &attributes, context);

        attributes
    }

    fn record_duration(
        &self,
        metric: &'static str,
        duration: Duration,
        attributes: &Attributes,
        context: Option<&Context>,
    ) {
        self.sink.record_histogram(
            metric,
            duration.as_secs_f64() * 1000.0,
            MILLISECONDS,
            attributes,
            context,
        );
    }
}
