//! Instrumented driver façade
//!
//! Drop-in wrappers around a [`Connector`], its connections and statements.
//! Each timed call runs the pre-hook, awaits the wrapped driver, then runs the
//! post-hook exactly once with the call's outcome before handing the result
//! back unchanged.
//!
//! # Example
//! ```no_run
//! use db_client_metrics::{DbMetrics, InstrumentedConnector, MetricsConfig, OtelMetricsSink, SqliteConnector};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), db_client_metrics::DriverError> {
//! let metrics = Arc::new(DbMetrics::new(
//!     &MetricsConfig::from_env(),
//!     Arc::new(OtelMetricsSink::global()),
//! ));
//! let connector = InstrumentedConnector::new(SqliteConnector::new(), metrics.clone());
//!
//! let mut conn = connector.connect("sqlite::memory:").await?;
//! conn.exec("CREATE TABLE t (id INTEGER)").await?;
//! let mut stmt = conn.prepare("SELECT id FROM t").await?;
//! stmt.execute(&[]).await?;
//!
//! metrics.clean_up_connections();
//! # Ok(())
//! # }
//! ```

use crate::binder::{DbMetrics, OperationOutcome, Tracked};
use crate::driver::{Connector, DbConnection, DbStatement, ReturnedRows, SqlParam};
use crate::error::DriverResult;
use crate::store::EntityRef;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

pub struct InstrumentedConnector<C> {
    inner: C,
    metrics: Arc<DbMetrics>,
}

impl<C: Connector> InstrumentedConnector<C> {
    pub fn new(inner: C, metrics: Arc<DbMetrics>) -> Self {
        Self { inner, metrics }
    }

    /// Open a connection, recording `db.client.connection.create_time` and
    /// the connection count
    #[track_caller]
    pub fn connect<'a>(
        &'a self,
        dsn: &'a str,
    ) -> impl Future<Output = DriverResult<InstrumentedConnection<C::Connection>>> + 'a {
        let caller = Location::caller();
        async move {
            let entity = self.metrics.tracker().new_connection();

            self.metrics.before_call(&entity);
            let result = self.inner.connect(dsn).await;
            self.metrics
                .after_connect(&entity, dsn, result.as_ref().err(), Some(caller));

            result.map(|inner| InstrumentedConnection {
                inner,
                handle: Arc::new(ConnectionHandle {
                    entity,
                    metrics: Arc::clone(&self.metrics),
                }),
            })
        }
    }

    pub fn metrics(&self) -> &Arc<DbMetrics> {
        &self.metrics
    }
}

/// Identity of an open connection, shared by the wrapper and its statements
///
/// The last holder to go away counts the connection as closed.
struct ConnectionHandle {
    entity: EntityRef,
    metrics: Arc<DbMetrics>,
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.metrics.connection_closed(&self.entity);
    }
}

/// Connection wrapper
///
/// The connection counts as closed once the wrapper and every statement
/// prepared from it are dropped.
pub struct InstrumentedConnection<C> {
    inner: C,
    handle: Arc<ConnectionHandle>,
}

impl<C: DbConnection> InstrumentedConnection<C> {
    #[track_caller]
    pub fn query<'a>(&'a mut self, sql: &'a str) -> impl Future<Output = DriverResult<C::Rows>> + 'a {
        let caller = Location::caller();
        async move {
            let ConnectionHandle { entity, metrics } = &*self.handle;
            metrics.before_call(entity);
            let result = self.inner.query(sql).await;
            metrics.after_operation(
                entity,
                OperationOutcome {
                    statement: Some(sql),
                    returned_rows: result.as_ref().ok().map(|rows| rows.returned_rows()),
                    error: result.as_ref().err(),
                    caller: Some(caller),
                },
            );
            result
        }
    }

    #[track_caller]
    pub fn exec<'a>(&'a mut self, sql: &'a str) -> impl Future<Output = DriverResult<u64>> + 'a {
        let caller = Location::caller();
        async move {
            let ConnectionHandle { entity, metrics } = &*self.handle;
            metrics.before_call(entity);
            let result = self.inner.exec(sql).await;
            metrics.after_operation(
                entity,
                OperationOutcome {
                    statement: Some(sql),
                    returned_rows: result.as_ref().ok().copied(),
                    error: result.as_ref().err(),
                    caller: Some(caller),
                },
            );
            result
        }
    }

    /// Prepare a statement bound to this connection; not timed
    pub async fn prepare(&mut self, sql: &str) -> DriverResult<InstrumentedStatement<C::Statement>> {
        let inner = self.inner.prepare(sql).await?;

        let metrics = &self.handle.metrics;
        let entity = metrics.tracker().new_statement();
        metrics.after_prepare(&entity, &self.handle.entity);

        Ok(InstrumentedStatement {
            inner,
            entity,
            connection: Arc::clone(&self.handle),
        })
    }
}

impl<C> InstrumentedConnection<C> {
    /// Wrapped driver connection; calls made on it directly are not measured
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C> Tracked for InstrumentedConnection<C> {
    fn entity(&self) -> &EntityRef {
        &self.handle.entity
    }
}

/// Prepared statement wrapper; keeps its connection's identity alive
pub struct InstrumentedStatement<S> {
    inner: S,
    entity: EntityRef,
    connection: Arc<ConnectionHandle>,
}

impl<S: DbStatement> InstrumentedStatement<S> {
    #[track_caller]
    pub fn execute<'a>(
        &'a mut self,
        params: &'a [SqlParam],
    ) -> impl Future<Output = DriverResult<S::Rows>> + 'a {
        let caller = Location::caller();
        async move {
            let metrics = &self.connection.metrics;
            metrics.before_call(&self.entity);
            let result = self.inner.execute(params).await;
            metrics.after_operation(
                &self.entity,
                OperationOutcome {
                    statement: Some(self.inner.query_string()),
                    returned_rows: result.as_ref().ok().map(|rows| rows.returned_rows()),
                    error: result.as_ref().err(),
                    caller: Some(caller),
                },
            );
            result
        }
    }

    pub fn query_string(&self) -> &str {
        self.inner.query_string()
    }
}

impl<S> InstrumentedStatement<S> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> Tracked for InstrumentedStatement<S> {
    fn entity(&self) -> &EntityRef {
        &self.entity
    }
}
