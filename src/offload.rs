//! Async adapter over the blocking core.
//!
//! [`AsyncConnectionManager`] runs each call on tokio's blocking pool. A
//! semaphore sized to `pool_max` bounds how many calls are in flight, so async
//! callers queue on the semaphore instead of piling up threads that would only
//! wait for a pooled session. A panic inside the blocking call is resumed on
//! the awaiting task.

use crate::db::{ConnectionManager, PooledSession, SchemaIntrospector};
use crate::error::{ErrorContext, OraError, OraResult};
use crate::models::{ConnectionInfo, Params, QueryResult, Row, TableMetadata};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

#[derive(Debug, Clone)]
pub struct AsyncConnectionManager {
    inner: Arc<ConnectionManager>,
    permits: Arc<Semaphore>,
}

impl AsyncConnectionManager {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        let permits = manager.config().pool_max().max(1) as usize;
        Self {
            inner: manager,
            permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// The shared blocking manager.
    pub fn blocking(&self) -> &Arc<ConnectionManager> {
        &self.inner
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub async fn connect(&self) -> OraResult<ConnectionInfo> {
        self.run("connect", |m| m.connect()).await
    }

    pub async fn disconnect(&self) -> OraResult<()> {
        self.run("disconnect", |m| m.disconnect()).await
    }

    pub async fn execute(&self, sql: impl Into<String>, params: Params) -> OraResult<QueryResult> {
        let sql = sql.into();
        self.run("execute", move |m| m.execute(&sql, &params)).await
    }

    pub async fn execute_many(
        &self,
        sql: impl Into<String>,
        params_list: Vec<Params>,
    ) -> OraResult<u64> {
        let sql = sql.into();
        self.run("execute_many", move |m| m.execute_many(&sql, &params_list))
            .await
    }

    pub async fn fetch_one(&self, sql: impl Into<String>, params: Params) -> OraResult<Option<Row>> {
        let sql = sql.into();
        self.run("fetch_one", move |m| m.fetch_one(&sql, &params)).await
    }

    pub async fn fetch_all(&self, sql: impl Into<String>, params: Params) -> OraResult<QueryResult> {
        let sql = sql.into();
        self.run("fetch_all", move |m| m.fetch_all(&sql, &params)).await
    }

    /// Run `f` inside one transaction on the blocking pool.
    pub async fn transaction<T, F>(&self, f: F) -> OraResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PooledSession) -> OraResult<T> + Send + 'static,
    {
        self.run("transaction", move |m| m.transaction(f)).await
    }

    pub async fn get_table_metadata(
        &self,
        table: impl Into<String>,
        schema: Option<String>,
    ) -> OraResult<TableMetadata> {
        let table = table.into();
        self.run("get_table_metadata", move |m| {
            SchemaIntrospector::new(m).get_table_metadata(&table, schema.as_deref())
        })
        .await
    }

    /// Run any blocking operation against the manager.
    pub async fn run<T, F>(&self, operation: &str, f: F) -> OraResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ConnectionManager) -> OraResult<T> + Send + 'static,
    {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| {
                OraError::connection("Offload semaphore closed", ErrorContext::new(operation))
            })?;

        let manager = Arc::clone(&self.inner);
        let joined = tokio::task::spawn_blocking(move || f(&manager)).await;
        joined.unwrap_or_else(|e| Err(join_failure(operation, e)))
    }
}

/// Resume a worker panic on the caller; report cancellation as an error.
fn join_failure(operation: &str, err: JoinError) -> OraError {
    if err.is_panic() {
        std::panic::resume_unwind(err.into_panic());
    }
    OraError::query(
        format!("Blocking task did not complete: {err}"),
        ErrorContext::new(operation),
    )
}
