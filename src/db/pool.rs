//! Connection pool management.
//!
//! [`ConnectionManager`] owns at most one session pool for one
//! [`ConnectionConfig`]. The core is synchronous: every call blocks the calling
//! thread until the database answers. The manager is `Send + Sync`, so a single
//! instance is shared by wrapping it in an `Arc`.
//!
//! Sessions are checked out through [`PooledSession`], an RAII guard that
//! returns the session to the pool on every exit path and rolls back any
//! transaction still open when it is dropped.

use super::driver::{Driver, DriverSession, PoolOptions, SessionPool};
use super::oracle::OracleDriver;
use super::translator::{ErrorTranslator, TranslationScope};
use crate::config::ConnectionConfig;
use crate::error::{OraError, OraResult, truncate_sql};
use crate::models::{ConnectionInfo, Params, QueryResult, Row, TransactionState};
use crate::sql::identifier::validate_identifiers;
use crate::sql::{returning_bind, returns_rows};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Liveness probe run before a connection is declared usable.
pub const PROBE_SQL: &str = "SELECT 1 FROM DUAL";

/// Server banner query. Failure to read it is tolerated.
pub const VERSION_SQL: &str = "SELECT BANNER FROM V$VERSION WHERE ROWNUM = 1";

/// The live pool plus what was learned while opening it.
struct ConnectionHandle {
    pool: Arc<dyn SessionPool>,
    server_version: Option<String>,
    connected_at: DateTime<Utc>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("server_version", &self.server_version)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

pub struct ConnectionManager {
    config: ConnectionConfig,
    driver: Arc<dyn Driver>,
    handle: RwLock<Option<ConnectionHandle>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.config.masked_connection_url())
            .field("handle", &*self.read_handle())
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager backed by the Oracle driver. No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_driver(config, Arc::new(OracleDriver::new()))
    }

    /// Create a manager backed by an arbitrary driver.
    pub fn with_driver(config: ConnectionConfig, driver: Arc<dyn Driver>) -> Self {
        Self {
            config,
            driver,
            handle: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Display-safe connection URL (password masked).
    pub fn connection_url(&self) -> String {
        self.config.masked_connection_url()
    }

    /// Server banner read at connect time, if it could be read.
    pub fn server_version(&self) -> Option<String> {
        self.read_handle()
            .as_ref()
            .and_then(|h| h.server_version.clone())
    }

    /// Details of the live connection, or `None` when disconnected.
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.read_handle().as_ref().map(|h| self.info_for(h))
    }

    /// Pure predicate on handle presence.
    pub fn is_connected(&self) -> bool {
        self.read_handle().is_some()
    }

    /// Open the pool and verify it with a liveness probe.
    ///
    /// Calling this while connected is a no-op that returns the current
    /// connection. Never retries; see [`RetryPolicy`](crate::retry::RetryPolicy).
    pub fn connect(&self) -> OraResult<ConnectionInfo> {
        // Early check for an existing connection
        if let Some(info) = self.connection_info() {
            debug!("Already connected");
            return Ok(info);
        }

        self.config.validate()?;

        let url = self.config.masked_connection_url();
        info!(
            url = %url,
            pool_min = self.config.pool_min(),
            pool_max = self.config.pool_max(),
            "Connecting to Oracle"
        );

        let translator = ErrorTranslator::new("connect").scope(TranslationScope::Connect);
        let pool: Arc<dyn SessionPool> = Arc::from(
            self.driver
                .open_pool(&PoolOptions::from(&self.config))
                .map_err(|e| translator.translate(e))?,
        );

        let server_version = match self.probe(pool.as_ref(), &translator) {
            Ok(version) => version,
            Err(e) => {
                close_pool(pool.as_ref(), &url);
                return Err(e);
            }
        };

        let handle = ConnectionHandle {
            pool,
            server_version,
            connected_at: Utc::now(),
        };

        // Re-check after the blocking work to prevent a TOCTOU race.
        // If another caller won, close our pool outside the lock.
        let outcome = {
            let mut slot = self.write_handle();
            match slot.as_ref() {
                Some(existing) => Err((handle, self.info_for(existing))),
                None => {
                    let info = self.info_for(&handle);
                    *slot = Some(handle);
                    Ok(info)
                }
            }
        }; // Lock released here

        match outcome {
            Ok(info) => {
                info!(
                    url = %url,
                    server_version = ?info.server_version,
                    "Connected successfully"
                );
                Ok(info)
            }
            Err((loser, winner)) => {
                debug!("Concurrent connect detected, discarding duplicate pool");
                close_pool(loser.pool.as_ref(), &url);
                Ok(winner)
            }
        }
    }

    /// Connect unless already connected.
    pub fn ensure_connected(&self) -> OraResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect().map(|_| ())
    }

    /// Close the pool and clear the handle. Succeeds when not connected.
    pub fn disconnect(&self) -> OraResult<()> {
        let handle = self.write_handle().take();
        if let Some(handle) = handle {
            let url = self.config.masked_connection_url();
            close_pool(handle.pool.as_ref(), &url);
            info!(url = %url, "Disconnected");
        }
        Ok(())
    }

    /// Alias of [`disconnect`](Self::disconnect).
    pub fn close(&self) -> OraResult<()> {
        self.disconnect()
    }

    /// Check out one pooled session. It returns to the pool when dropped.
    pub fn session(&self) -> OraResult<PooledSession> {
        self.checkout("session", TranslationScope::General)
    }

    /// Run a statement on its own session.
    ///
    /// Row-returning statements yield rows; anything else yields the affected
    /// row count and is committed immediately.
    pub fn execute(&self, sql: &str, params: &Params) -> OraResult<QueryResult> {
        let mut session = self.checkout("execute", TranslationScope::General)?;
        session.run("execute", sql, params)
    }

    /// Run a statement with a `RETURNING ... INTO` clause on its own session
    /// and read back the returned columns. See
    /// [`PooledSession::execute_returning`].
    pub fn execute_returning<S: AsRef<str>>(
        &self,
        sql: &str,
        params: &Params,
        returning: &[S],
    ) -> OraResult<QueryResult> {
        let mut session = self.checkout("execute_returning", TranslationScope::General)?;
        session.execute_returning(sql, params, returning)
    }

    /// Run one statement once per parameter set, in input order, on a single
    /// session inside one transaction. Returns the summed affected row count.
    ///
    /// Any failure rolls back the whole batch. An empty batch returns 0
    /// without touching the database.
    pub fn execute_many(&self, sql: &str, params_list: &[Params]) -> OraResult<u64> {
        let pool = self.pool("execute_many")?;
        if params_list.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let mut session = PooledSession::acquire(pool, "execute_many", TranslationScope::General)?;
        session.begin();

        let mut total = 0u64;
        for params in params_list {
            match session.execute_in_transaction("execute_many", sql, params) {
                Ok(count) => total += count,
                Err(e) => {
                    session.rollback_quietly();
                    return Err(e);
                }
            }
        }
        session.commit()?;

        debug!(
            sql = %truncate_sql(sql),
            batches = params_list.len(),
            rows_affected = total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch executed"
        );
        Ok(total)
    }

    /// Fetch the first row, or `None` when the query returns no rows.
    pub fn fetch_one(&self, sql: &str, params: &Params) -> OraResult<Option<Row>> {
        let mut session = self.checkout("fetch_one", TranslationScope::General)?;
        let result = session.query_as("fetch_one", sql, params)?;
        Ok(result.into_first_row())
    }

    /// Fetch every row.
    pub fn fetch_all(&self, sql: &str, params: &Params) -> OraResult<QueryResult> {
        let mut session = self.checkout("fetch_all", TranslationScope::General)?;
        session.query_as("fetch_all", sql, params)
    }

    /// Run `f` inside an explicit transaction on one pooled session.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`. If `f`
    /// panics the session guard rolls back while unwinding. The session
    /// returns to the pool in every case.
    pub fn transaction<T, F>(&self, f: F) -> OraResult<T>
    where
        F: FnOnce(&mut PooledSession) -> OraResult<T>,
    {
        let mut session = self.checkout("transaction", TranslationScope::General)?;
        session.begin();
        match f(&mut session) {
            Ok(value) => {
                if session.transaction_state().is_active() {
                    session.commit()?;
                }
                Ok(value)
            }
            Err(e) => {
                session.rollback_quietly();
                Err(e)
            }
        }
    }

    /// Check out a session whose failures are translated in `scope`.
    pub(crate) fn checkout(
        &self,
        operation: &str,
        scope: TranslationScope,
    ) -> OraResult<PooledSession> {
        let pool = self.pool(operation)?;
        PooledSession::acquire(pool, operation, scope)
    }

    /// Clone the pool out of the lock so no lock is held across I/O.
    fn pool(&self, operation: &str) -> OraResult<Arc<dyn SessionPool>> {
        self.read_handle()
            .as_ref()
            .map(|h| Arc::clone(&h.pool))
            .ok_or_else(|| OraError::not_connected(operation))
    }

    /// Probe the pool and read the server banner.
    fn probe(
        &self,
        pool: &dyn SessionPool,
        translator: &ErrorTranslator,
    ) -> OraResult<Option<String>> {
        let mut session = pool.acquire().map_err(|e| translator.translate(e))?;
        session
            .query(PROBE_SQL, &Params::new())
            .map_err(|e| translator.clone().with_sql(PROBE_SQL).translate(e))?;

        let version = match session.query(VERSION_SQL, &Params::new()) {
            Ok(rows) => rows
                .rows
                .into_iter()
                .next()
                .and_then(|row| row.values().next().and_then(|v| v.as_str().map(String::from))),
            Err(e) => {
                warn!(error = %e, "Failed to read server version");
                None
            }
        };
        if let Some(version) = &version {
            debug!(version = %version, "Got server version");
        }
        Ok(version)
    }

    fn info_for(&self, handle: &ConnectionHandle) -> ConnectionInfo {
        ConnectionInfo {
            url: self.config.masked_connection_url(),
            server_version: handle.server_version.clone(),
            pool_min: self.config.pool_min(),
            pool_max: self.config.pool_max(),
            connected_at: handle.connected_at,
        }
    }

    fn read_handle(&self) -> RwLockReadGuard<'_, Option<ConnectionHandle>> {
        self.handle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_handle(&self) -> RwLockWriteGuard<'_, Option<ConnectionHandle>> {
        self.handle.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let handle = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            close_pool(handle.pool.as_ref(), &self.config.masked_connection_url());
        }
    }
}

/// Close a pool, logging (not returning) any failure.
fn close_pool(pool: &dyn SessionPool, url: &str) {
    if let Err(e) = pool.close() {
        warn!(url = %url, error = %e, "Failed to close session pool");
    }
}

/// RAII guard for one checked-out session.
///
/// Outside an explicit transaction, writes are committed as soon as they
/// succeed. Inside one (see [`ConnectionManager::transaction`] or
/// [`begin`](Self::begin)), nothing is committed until
/// [`commit`](Self::commit); a guard dropped with the transaction still open
/// rolls it back. After a commit or rollback inside an explicit transaction,
/// the next write opens a new one, so it too waits for a commit. The session
/// returns to the pool when the guard drops.
pub struct PooledSession {
    session: Option<Box<dyn DriverSession>>,
    state: TransactionState,
    // Set by `begin()`; writes are never auto-committed while set.
    explicit: bool,
    scope: TranslationScope,
    // Keeps the pool alive for as long as the session is out.
    _pool: Arc<dyn SessionPool>,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("state", &self.state)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl PooledSession {
    fn acquire(
        pool: Arc<dyn SessionPool>,
        operation: &str,
        scope: TranslationScope,
    ) -> OraResult<Self> {
        let session = pool
            .acquire()
            .map_err(|e| ErrorTranslator::new(operation).scope(scope).translate(e))?;
        Ok(Self {
            session: Some(session),
            state: TransactionState::Idle,
            explicit: false,
            scope,
            _pool: pool,
        })
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    /// Start an explicit transaction. Oracle opens transactions implicitly, so
    /// this only stops writes from being committed one by one.
    pub fn begin(&mut self) {
        self.explicit = true;
        self.state = TransactionState::Active;
    }

    /// Run a statement: rows for `SELECT`/`WITH`, affected count otherwise.
    pub fn execute(&mut self, sql: &str, params: &Params) -> OraResult<QueryResult> {
        self.run("execute", sql, params)
    }

    /// Run a row-returning statement.
    pub fn query(&mut self, sql: &str, params: &Params) -> OraResult<QueryResult> {
        self.query_as("query", sql, params)
    }

    pub fn fetch_one(&mut self, sql: &str, params: &Params) -> OraResult<Option<Row>> {
        Ok(self.query_as("fetch_one", sql, params)?.into_first_row())
    }

    pub fn commit(&mut self) -> OraResult<()> {
        let translator = self.translator("commit");
        self.driver_session("commit")?
            .commit()
            .map_err(|e| translator.translate(e))?;
        if self.state.is_active() {
            self.state = TransactionState::Committed;
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> OraResult<()> {
        let translator = self.translator("rollback");
        self.driver_session("rollback")?
            .rollback()
            .map_err(|e| translator.translate(e))?;
        if self.state.is_active() {
            self.state = TransactionState::RolledBack;
        }
        Ok(())
    }

    /// Close the session instead of returning it to the pool. Used to enforce
    /// a caller-level deadline on a session that may still be busy.
    pub fn discard(mut self) -> OraResult<()> {
        let translator = self.translator("discard");
        self.state = TransactionState::RolledBack;
        match self.session.take() {
            Some(session) => session.discard().map_err(|e| translator.translate(e)),
            None => Ok(()),
        }
    }

    pub(crate) fn run(
        &mut self,
        operation: &str,
        sql: &str,
        params: &Params,
    ) -> OraResult<QueryResult> {
        if returns_rows(sql) {
            return self.query_as(operation, sql, params);
        }
        let start = Instant::now();
        let rows_affected = self.execute_in_transaction(operation, sql, params)?;
        self.settle_write(operation, sql)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            operation = %operation,
            sql = %truncate_sql(sql),
            rows_affected,
            elapsed_ms,
            "Statement executed"
        );
        Ok(QueryResult::write_result(rows_affected, elapsed_ms))
    }

    /// Run a statement with a `RETURNING ... INTO` clause, such as an INSERT
    /// from [`build_insert`](crate::sql::build_insert).
    ///
    /// `returning` lists the returned columns; each is read through its
    /// `ret_`-prefixed out-bind. The result has one text-valued row per
    /// affected row, keyed by canonical column name, plus the affected count.
    /// Committed immediately outside an explicit transaction.
    pub fn execute_returning<S: AsRef<str>>(
        &mut self,
        sql: &str,
        params: &Params,
        returning: &[S],
    ) -> OraResult<QueryResult> {
        let operation = "execute_returning";
        let columns = validate_identifiers(returning)?;
        let out_binds: Vec<String> = columns.iter().map(|c| returning_bind(c)).collect();

        let start = Instant::now();
        let translator = self.translator(operation).with_sql(sql);
        let (rows_affected, values) = self
            .driver_session(operation)?
            .execute_returning(sql, params, &out_binds)
            .map_err(|e| translator.translate(e))?;
        self.settle_write(operation, sql)?;

        let row_total = values.iter().map(Vec::len).max().unwrap_or(0);
        let rows: Vec<Row> = (0..row_total)
            .map(|i| {
                columns
                    .iter()
                    .zip(&values)
                    .map(|(column, returned)| {
                        let value = returned
                            .get(i)
                            .cloned()
                            .flatten()
                            .map_or(JsonValue::Null, JsonValue::String);
                        (column.clone(), value)
                    })
                    .collect()
            })
            .collect();

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            operation = %operation,
            sql = %truncate_sql(sql),
            rows_affected,
            returned = rows.len(),
            elapsed_ms,
            "Statement executed"
        );
        let mut result = QueryResult::from_rows(columns, rows, elapsed_ms);
        result.rows_affected = Some(rows_affected);
        Ok(result)
    }

    pub(crate) fn query_as(
        &mut self,
        operation: &str,
        sql: &str,
        params: &Params,
    ) -> OraResult<QueryResult> {
        let start = Instant::now();
        let translator = self.translator(operation).with_sql(sql);
        let rows = self
            .driver_session(operation)?
            .query(sql, params)
            .map_err(|e| translator.translate(e))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            operation = %operation,
            sql = %truncate_sql(sql),
            row_count = rows.rows.len(),
            elapsed_ms,
            "Query executed"
        );
        Ok(QueryResult::from_rows(rows.columns, rows.rows, elapsed_ms))
    }

    fn execute_in_transaction(
        &mut self,
        operation: &str,
        sql: &str,
        params: &Params,
    ) -> OraResult<u64> {
        let translator = self.translator(operation).with_sql(sql);
        self.driver_session(operation)?
            .execute(sql, params)
            .map_err(|e| translator.translate(e))
    }

    /// Commit a successful write unless an explicit transaction is open.
    fn settle_write(&mut self, operation: &str, sql: &str) -> OraResult<()> {
        if self.explicit {
            // Oracle opens the next transaction implicitly on the first write.
            self.state = TransactionState::Active;
            return Ok(());
        }
        let translator = self.translator(operation).with_sql(sql);
        self.driver_session(operation)?
            .commit()
            .map_err(|e| translator.translate(e))
    }

    /// Roll back after a failure, keeping the original error.
    fn rollback_quietly(&mut self) {
        if let Err(e) = self.rollback() {
            warn!(error = %e, "Rollback failed");
        }
    }

    fn translator(&self, operation: &str) -> ErrorTranslator {
        ErrorTranslator::new(operation).scope(self.scope)
    }

    fn driver_session(&mut self, operation: &str) -> OraResult<&mut Box<dyn DriverSession>> {
        self.session
            .as_mut()
            .ok_or_else(|| OraError::not_connected(operation))
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if !self.state.is_active() {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            match session.rollback() {
                Ok(()) => warn!("Open transaction rolled back on session drop"),
                Err(e) => warn!(error = %e, "Rollback on session drop failed"),
            }
        }
        self.state = TransactionState::RolledBack;
    }
}
