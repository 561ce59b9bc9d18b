//! Driver error types

use crate::dsn::DsnError;
use thiserror::Error;

/// Error returned by a wrapped database driver
///
/// The instrumentation only observes these errors; they reach the caller
/// unchanged.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Database error: {message}")]
    Database {
        code: Option<String>,
        message: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error(transparent)]
    Dsn(#[from] DsnError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DriverResult<T> = Result<T, DriverError>;

impl DriverError {
    /// Error type name, reported as `exception.type`
    pub fn kind(&self) -> &'static str {
        match self {
            DriverError::Database { .. } => "DriverError::Database",
            DriverError::Connection(_) => "DriverError::Connection",
            DriverError::UnsupportedDriver(_) => "DriverError::UnsupportedDriver",
            DriverError::Dsn(_) => "DsnError",
            DriverError::Sqlx(e) => match e {
                sqlx::Error::Database(_) => "sqlx::Error::Database",
                sqlx::Error::Io(_) => "sqlx::Error::Io",
                sqlx::Error::Configuration(_) => "sqlx::Error::Configuration",
                sqlx::Error::Protocol(_) => "sqlx::Error::Protocol",
                sqlx::Error::RowNotFound => "sqlx::Error::RowNotFound",
                sqlx::Error::PoolTimedOut => "sqlx::Error::PoolTimedOut",
                sqlx::Error::PoolClosed => "sqlx::Error::PoolClosed",
                _ => "sqlx::Error",
            },
        }
    }

    /// Database-specific error code (SQLSTATE or engine code), reported as `error.type`
    pub fn code(&self) -> Option<String> {
        match self {
            DriverError::Database { code, .. } => code.clone(),
            DriverError::Sqlx(e) => e
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code.into_owned()),
            _ => None,
        }
    }

    /// Whether the error originated in the database server or engine
    pub fn is_database_error(&self) -> bool {
        match self {
            DriverError::Database { .. } => true,
            DriverError::Sqlx(e) => e.as_database_error().is_some(),
            _ => false,
        }
    }
}
