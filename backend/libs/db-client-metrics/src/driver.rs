//! Database driver abstraction
//!
//! The instrumentation wraps any driver that implements these traits. The
//! shape follows a classic client: a connector opening connections from a
//! DSN, connections running ad-hoc queries and commands or preparing
//! statements, statements executed with bound parameters.

use crate::error::DriverResult;
use async_trait::async_trait;

/// Parameter bound to a prepared statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Float(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

/// Result of a call that can report how many rows it produced
pub trait ReturnedRows {
    fn returned_rows(&self) -> u64;
}

impl<T> ReturnedRows for Vec<T> {
    fn returned_rows(&self) -> u64 {
        self.len() as u64
    }
}

/// Affected row count of a command
impl ReturnedRows for u64 {
    fn returned_rows(&self) -> u64 {
        *self
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: DbConnection;

    async fn connect(&self, dsn: &str) -> DriverResult<Self::Connection>;
}

#[async_trait]
pub trait DbConnection: Send {
    type Rows: ReturnedRows + Send;
    type Statement: DbStatement;

    /// Run a query and return its rows
    async fn query(&mut self, sql: &str) -> DriverResult<Self::Rows>;

    /// Run a command and return the number of affected rows
    async fn exec(&mut self, sql: &str) -> DriverResult<u64>;

    async fn prepare(&mut self, sql: &str) -> DriverResult<Self::Statement>;
}

#[async_trait]
pub trait DbStatement: Send {
    type Rows: ReturnedRows + Send;

    /// SQL text the statement was prepared from
    fn query_string(&self) -> &str;

    async fn execute(&mut self, params: &[SqlParam]) -> DriverResult<Self::Rows>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returned_rows() {
        assert_eq!(vec![1, 2, 3].returned_rows(), 3);
        assert_eq!(Vec::<u8>::new().returned_rows(), 0);
        assert_eq!(7u64.returned_rows(), 7);
    }

    #[test]
    fn test_param_conversions() {
        assert_eq!(SqlParam::from(1i64), SqlParam::Int(1));
        assert_eq!(SqlParam::from("x"), SqlParam::Text("x".to_string()));
        assert_eq!(SqlParam::from(true), SqlParam::Bool(true));
    }
}
