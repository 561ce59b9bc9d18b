//! SQLite driver on top of sqlx
//!
//! Accepts the same DSNs the parser understands: `sqlite:<path>` and
//! `sqlite::memory:`.

use crate::driver::{Connector, DbConnection, DbStatement, SqlParam};
use crate::dsn::DsnError;
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Executor};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl SqliteConnector {
    pub fn new() -> Self {
        Self
    }
}

fn connect_options(dsn: &str) -> DriverResult<SqliteConnectOptions> {
    let (driver, path) = dsn.split_once(':').ok_or(DsnError::MissingDriver)?;
    if driver != "sqlite" {
        return Err(DriverError::UnsupportedDriver(driver.to_string()));
    }

    if path == MEMORY_PATH {
        return Ok(SqliteConnectOptions::from_str("sqlite::memory:")?);
    }

    Ok(SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true))
}

#[async_trait]
impl Connector for SqliteConnector {
    type Connection = SqliteDb;

    async fn connect(&self, dsn: &str) -> DriverResult<SqliteDb> {
        let options = connect_options(dsn)?;
        let conn = options.connect().await?;

        debug!(dsn = %dsn, "SQLite connection opened");

        Ok(SqliteDb {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Open SQLite connection; statements prepared from it share the handle
pub struct SqliteDb {
    conn: Arc<Mutex<SqliteConnection>>,
}

#[async_trait]
impl DbConnection for SqliteDb {
    type Rows = Vec<SqliteRow>;
    type Statement = SqliteStatement;

    async fn query(&mut self, sql: &str) -> DriverResult<Vec<SqliteRow>> {
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
        Ok(rows)
    }

    async fn exec(&mut self, sql: &str) -> DriverResult<u64> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query(sql).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn prepare(&mut self, sql: &str) -> DriverResult<SqliteStatement> {
        {
            let mut conn = self.conn.lock().await;
            // Validates the SQL now instead of at first execute
            (&mut *conn).prepare(sql).await?;
        }

        Ok(SqliteStatement {
            conn: Arc::clone(&self.conn),
            sql: sql.to_string(),
        })
    }
}

pub struct SqliteStatement {
    conn: Arc<Mutex<SqliteConnection>>,
    sql: String,
}

#[async_trait]
impl DbStatement for SqliteStatement {
    type Rows = Vec<SqliteRow>;

    fn query_string(&self) -> &str {
        &self.sql
    }

    async fn execute(&mut self, params: &[SqlParam]) -> DriverResult<Vec<SqliteRow>> {
        let mut query = sqlx::query(&self.sql);
        for param in params {
            query = match param {
                SqlParam::Null => query.bind(None::<String>),
                SqlParam::Bool(v) => query.bind(*v),
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::Float(v) => query.bind(*v),
                SqlParam::Text(v) => query.bind(v.clone()),
            };
        }

        let mut conn = self.conn.lock().await;
        let rows = query.fetch_all(&mut *conn).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[test]
    fn test_connect_options_rejects_other_drivers() {
        assert!(matches!(
            connect_options("mysql:host=localhost"),
            Err(DriverError::UnsupportedDriver(driver)) if driver == "mysql"
        ));
        assert!(matches!(
            connect_options("no-colon"),
            Err(DriverError::Dsn(DsnError::MissingDriver))
        ));
    }

    #[tokio::test]
    async fn test_query_exec_and_prepared_statement() {
        let mut db = SqliteConnector::new().connect("sqlite::memory:").await.unwrap();

        db.exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
        let affected = db
            .exec("INSERT INTO users (name) VALUES ('a'), ('b')")
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let rows = db.query("SELECT name FROM users ORDER BY id").await.unwrap();
        assert_eq!(rows.len(), 2);

        let mut stmt = db.prepare("SELECT name FROM users WHERE id = ?").await.unwrap();
        assert_eq!(stmt.query_string(), "SELECT name FROM users WHERE id = ?");
        let rows = stmt.execute(&[SqlParam::Int(2)]).await.unwrap();
        assert_eq!(rows.len(), 1);
        let name: String = rows[0].get("name");
        assert_eq!(name, "b");
    }

    #[tokio::test]
    async fn test_invalid_sql_is_database_error() {
        let mut db = SqliteConnector::new().connect("sqlite::memory:").await.unwrap();

        let error = db
            .query("bad statement")
            .await
            .err()
            .expect("invalid SQL should fail");
        assert!(error.is_database_error());
        assert!(error.code().is_some());
        assert!(db.prepare("also bad").await.is_err());
    }
}
