//! Metrics tracker
//!
//! Front door to the association store and the attribute layers. The binder
//! calls it from the façade hooks; applications reach it through the
//! attribute API on [`DbMetrics`](crate::DbMetrics).

use crate::attributes::{AttributeLayer, AttributeValue, Attributes};
use crate::store::{AssociationStore, Connections, EntityKind, EntityRef};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Feature switches, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerOptions {
    /// Capture the current OpenTelemetry context with every emission
    pub track_context: bool,
    /// Record the SQL text as `db.query.text`
    pub track_statements: bool,
    /// Emit `db.client.response.returned_rows`
    pub track_rows_returned: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            track_context: true,
            track_statements: true,
            track_rows_returned: true,
        }
    }
}

pub struct MetricsTracker {
    store: AssociationStore,
    global: RwLock<AttributeLayer>,
    options: TrackerOptions,
}

impl MetricsTracker {
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            store: AssociationStore::new(),
            global: RwLock::new(AttributeLayer::new()),
            options,
        }
    }

    /// Identity for a connection about to be opened
    pub fn new_connection(&self) -> EntityRef {
        self.store.issue(EntityKind::Connection)
    }

    /// Identity for a freshly prepared statement
    pub fn new_statement(&self) -> EntityRef {
        self.store.issue(EntityKind::Statement)
    }

    pub fn start(&self, entity: &EntityRef) {
        self.store.start(entity);
    }

    /// Elapsed time since `start`; zero when `start` was never called
    pub fn stop(&self, entity: &EntityRef) -> Duration {
        self.store.stop(entity)
    }

    /// Write into the entity's own layer and return its merged view
    pub fn add_attributes<I, K, V>(&self, entity: &EntityRef, attributes: I) -> Attributes
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.store.set_attributes(entity, attributes);
        self.get_attributes(entity)
    }

    /// Write into the global layer and return the new global view
    pub fn add_global_attributes<I, K, V>(&self, attributes: I) -> Attributes
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        let mut global = self.global.write();
        global.set_many(attributes);

        let mut merged = Attributes::new();
        global.overlay(&mut merged);
        merged
    }

    pub fn get_global_attributes(&self) -> Attributes {
        let mut merged = Attributes::new();
        self.global.read().overlay(&mut merged);
        merged
    }

    /// Merged view: global, then the owning connection for statements, then
    /// the entity's own layer
    pub fn get_attributes(&self, entity: &EntityRef) -> Attributes {
        let mut merged = self.get_global_attributes();

        if entity.is_statement() {
            if let Some(connection) = self.store.resolve_connection(entity) {
                self.store.overlay_layer(&connection, &mut merged);
            }
        }
        self.store.overlay_layer(entity, &mut merged);

        merged
    }

    /// Register a connection for the shutdown sweep; idempotent
    pub fn track_connection(&self, connection: &EntityRef) {
        self.store.register_connection(connection);
    }

    /// Drop a connection from the shutdown sweep, returning whether it was tracked
    pub fn untrack_connection(&self, connection: &EntityRef) -> bool {
        self.store.unregister_connection(connection)
    }

    /// Live tracked connections, in registration order
    pub fn connections(&self) -> Connections {
        self.store.connections()
    }

    pub fn map_statement_to_connection(&self, statement: &EntityRef, connection: &EntityRef) {
        self.store.link(statement, connection);
    }

    pub fn connection_for_statement(&self, statement: &EntityRef) -> Option<EntityRef> {
        self.store.resolve_connection(statement)
    }

    pub fn options(&self) -> TrackerOptions {
        self.options
    }

    pub fn is_track_context(&self) -> bool {
        self.options.track_context
    }

    pub fn is_track_statements(&self) -> bool {
        self.options.track_statements
    }

    pub fn is_track_rows_returned(&self) -> bool {
        self.options.track_rows_returned
    }

    pub fn store(&self) -> &AssociationStore {
        &self.store
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(TrackerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_start_and_stop() {
        let tracker = MetricsTracker::default();
        let conn = tracker.new_connection();

        tracker.start(&conn);
        thread::sleep(Duration::from_micros(100));
        assert!(tracker.stop(&conn) > Duration::ZERO);
    }

    #[test]
    fn test_stop_without_start_returns_zero() {
        let tracker = MetricsTracker::default();
        let stmt = tracker.new_statement();
        assert_eq!(tracker.stop(&stmt), Duration::ZERO);
    }

    #[test]
    fn test_add_attributes_accumulates() {
        let tracker = MetricsTracker::default();
        let conn = tracker.new_connection();

        assert_eq!(
            tracker.add_attributes(&conn, [("foo", "bar")]),
            attrs(&[("foo", "bar".into())])
        );
        assert_eq!(
            tracker.add_attributes(&conn, [("baz", "zzz")]),
            attrs(&[("foo", "bar".into()), ("baz", "zzz".into())])
        );
        assert_eq!(
            tracker.get_attributes(&conn),
            attrs(&[("foo", "bar".into()), ("baz", "zzz".into())])
        );
    }

    #[test]
    fn test_statement_specific_attributes() {
        let tracker = MetricsTracker::default();
        let stmt = tracker.new_statement();

        tracker.add_attributes(&stmt, [("foo", "bar")]);
        assert_eq!(tracker.get_attributes(&stmt), attrs(&[("foo", "bar".into())]));
    }

    #[test]
    fn test_global_attributes() {
        let tracker = MetricsTracker::default();
        let stmt = tracker.new_statement();

        tracker.add_global_attributes([("foo", "bar")]);
        assert_eq!(tracker.get_attributes(&stmt), attrs(&[("foo", "bar".into())]));
        assert_eq!(tracker.get_global_attributes(), attrs(&[("foo", "bar".into())]));
    }

    #[test]
    fn test_global_attributes_are_retroactive() {
        let tracker = MetricsTracker::default();
        let conn = tracker.new_connection();
        let stmt = tracker.new_statement();
        tracker.map_statement_to_connection(&stmt, &conn);

        tracker.add_global_attributes([("late", "yes")]);

        assert_eq!(tracker.get_attributes(&conn)["late"], AttributeValue::from("yes"));
        assert_eq!(tracker.get_attributes(&stmt)["late"], AttributeValue::from("yes"));
    }

    #[test]
    fn test_statement_inherits_connection_layer() {
        let tracker = MetricsTracker::default();
        let conn = tracker.new_connection();
        let stmt = tracker.new_statement();
        tracker.map_statement_to_connection(&stmt, &conn);

        tracker.add_global_attributes([("scope", "global"), ("g", "1")]);
        tracker.add_attributes(&conn, [("scope", "connection"), ("c", "1")]);
        tracker.add_attributes(&stmt, [("scope", "statement")]);

        let merged = tracker.get_attributes(&stmt);
        assert_eq!(merged["scope"], AttributeValue::from("statement"));
        assert_eq!(merged["g"], AttributeValue::from("1"));
        assert_eq!(merged["c"], AttributeValue::from("1"));

        // Sibling statement sees the connection layer but not the other statement's
        let sibling = tracker.new_statement();
        tracker.map_statement_to_connection(&sibling, &conn);
        assert_eq!(
            tracker.get_attributes(&sibling)["scope"],
            AttributeValue::from("connection")
        );
    }

    #[test]
    fn test_removed_key_reads_as_null_over_lower_value() {
        let tracker = MetricsTracker::default();
        let conn = tracker.new_connection();

        tracker.add_global_attributes([("team", "core")]);
        tracker.add_attributes(&conn, [("team", AttributeValue::Null)]);
        tracker.add_attributes(&conn, [("never_set", AttributeValue::Null)]);

        let merged = tracker.get_attributes(&conn);
        assert_eq!(merged.get("team"), Some(&AttributeValue::Null));
        assert!(!merged.contains_key("never_set"));
    }

    #[test]
    fn test_track_connection_is_idempotent() {
        let tracker = MetricsTracker::default();
        let conn1 = tracker.new_connection();
        let conn2 = tracker.new_connection();

        tracker.track_connection(&conn1);
        tracker.track_connection(&conn2);
        tracker.track_connection(&conn1);

        assert_eq!(tracker.connections().count(), 2);
        assert!(tracker.untrack_connection(&conn1));
        assert!(!tracker.untrack_connection(&conn1));
        assert_eq!(tracker.connections().collect::<Vec<_>>(), vec![conn2]);
    }

    #[test]
    fn test_map_statement_to_connection() {
        let tracker = MetricsTracker::default();
        let conn1 = tracker.new_connection();
        let conn2 = tracker.new_connection();
        let stmt1 = tracker.new_statement();
        let stmt2 = tracker.new_statement();

        tracker.map_statement_to_connection(&stmt1, &conn1);
        tracker.map_statement_to_connection(&stmt2, &conn2);

        assert_eq!(tracker.connection_for_statement(&stmt1), Some(conn1));
        assert_eq!(tracker.connection_for_statement(&stmt2), Some(conn2));
    }

    #[test]
    fn test_unknown_statement_has_no_connection() {
        let tracker = MetricsTracker::default();
        let stmt = tracker.new_statement();
        assert!(tracker.connection_for_statement(&stmt).is_none());
    }

    #[test]
    fn test_options_are_exposed() {
        let tracker = MetricsTracker::new(TrackerOptions {
            track_context: false,
            track_statements: true,
            track_rows_returned: false,
        });

        assert!(!tracker.is_track_context());
        assert!(tracker.is_track_statements());
        assert!(!tracker.is_track_rows_returned());
    }
}
