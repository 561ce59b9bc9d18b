//! DSN parsing
//!
//! Turns a `driver:key=value;key=value` connection string into semantic
//! convention attributes.

use crate::attributes::{AttributeValue, Attributes};
use crate::semconv::attributes::{
    DB_NAMESPACE, DB_SYSTEM_NAME, DB_USER, SERVER_ADDRESS, SERVER_PORT,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DsnError {
    #[error("Invalid DSN format: missing driver prefix")]
    MissingDriver,
}

/// Parse a DSN into attributes
///
/// `db.system.name` is always present. SQLite DSNs are file paths, so the
/// whole remainder becomes `server.address`. Segments without `=` are
/// skipped; unknown keys pass through under their own name. Numeric ports
/// are stored as integers.
///
/// # Example
/// ```
/// use db_client_metrics::dsn::parse_dsn;
///
/// let attributes = parse_dsn("pgsql:host=db;dbname=app").unwrap();
/// assert_eq!(attributes["server.address"].as_str(), Some("db"));
/// ```
pub fn parse_dsn(dsn: &str) -> Result<Attributes, DsnError> {
    let (driver, rest) = dsn.split_once(':').ok_or(DsnError::MissingDriver)?;

    let mut attributes = Attributes::new();
    attributes.insert(DB_SYSTEM_NAME.to_string(), AttributeValue::from(driver));

    if driver == "sqlite" {
        attributes.insert(SERVER_ADDRESS.to_string(), AttributeValue::from(rest));
        return Ok(attributes);
    }

    for parameter in rest.split(';') {
        let Some((key, value)) = parameter.split_once('=') else {
            continue;
        };

        let key = match key {
            "host" | "unix_socket" => SERVER_ADDRESS,
            "port" => SERVER_PORT,
            "dbname" => DB_NAMESPACE,
            "user" => DB_USER,
            other => other,
        };

        let value = if key == SERVER_PORT {
            value
                .parse::<i64>()
                .map(AttributeValue::Int)
                .unwrap_or_else(|_| AttributeValue::from(value))
        } else {
            AttributeValue::from(value)
        };

        attributes.insert(key.to_string(), value);
    }

    Ok(attributes)
}
