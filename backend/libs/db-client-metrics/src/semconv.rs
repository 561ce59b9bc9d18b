//! Metric names and attribute keys
//!
//! Names must match the OpenTelemetry database semantic conventions exactly,
//! existing dashboards key on them.

/// Metric names emitted by the binder
pub mod metrics {
    pub const DB_CLIENT_OPERATION_DURATION: &str = "db.client.operation.duration";
    pub const DB_CLIENT_RESPONSE_RETURNED_ROWS: &str = "db.client.response.returned_rows";
    pub const DB_CLIENT_CONNECTION_COUNT: &str = "db.client.connection.count";
    pub const DB_CLIENT_CONNECTION_CREATE_TIME: &str = "db.client.connection.create_time";

    // Not part of the semantic conventions
    pub const DB_CLIENT_CONNECTION_ERROR_COUNT: &str = "db.client.connection.error.count";
    pub const DB_CLIENT_OPERATION_ERROR_COUNT: &str = "db.client.operation.error.count";
}

/// Attribute keys
pub mod attributes {
    pub const DB_SYSTEM_NAME: &str = "db.system.name";
    pub const DB_NAMESPACE: &str = "db.namespace";
    pub const DB_USER: &str = "db.user";
    pub const DB_QUERY_TEXT: &str = "db.query.text";
    pub const SERVER_ADDRESS: &str = "server.address";
    pub const SERVER_PORT: &str = "server.port";

    pub const EXCEPTION_TYPE: &str = "exception.type";
    pub const EXCEPTION_MESSAGE: &str = "exception.message";
    pub const CODE_FILE_PATH: &str = "code.file.path";
    pub const CODE_LINE_NUMBER: &str = "code.line.number";
    pub const ERROR_TYPE: &str = "error.type";
}

/// Histogram units
pub mod units {
    pub const MILLISECONDS: &str = "ms";
    pub const DIMENSIONLESS: &str = "1";
}
