//! Shared test helpers: an in-memory driver that records every call and can be
//! scripted to return rows or fail.

#![allow(dead_code)]

use oracle_access::config::ConnectionConfig;
use oracle_access::db::{Driver, DriverError, DriverSession, PoolOptions, RowSet, SessionPool};
use oracle_access::models::{Params, Row};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded driver interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OpenPool,
    ClosePool,
    Acquire,
    Release,
    Discard,
    Query(String),
    Execute(String, Params),
    Commit,
    Rollback,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    open_error: Option<DriverError>,
    acquire_error: Option<DriverError>,
    close_error: Option<DriverError>,
    responses: Vec<(String, RowSet)>,
    query_failures: Vec<(String, DriverError)>,
    execute_failures: Vec<(usize, DriverError)>,
    executes: usize,
    rows_affected: Option<u64>,
    query_params: Vec<(String, Params)>,
    returned: Vec<(String, Vec<Option<String>>)>,
    out_binds: Vec<Vec<String>>,
}

/// Scriptable driver. Clones share state, so keep one clone for assertions
/// after handing another to the manager.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    // Scripting

    pub fn fail_open_pool(&self, err: DriverError) -> &Self {
        self.state().open_error = Some(err);
        self
    }

    pub fn fail_acquire(&self, err: DriverError) -> &Self {
        self.state().acquire_error = Some(err);
        self
    }

    pub fn fail_close(&self, err: DriverError) -> &Self {
        self.state().close_error = Some(err);
        self
    }

    /// Return `rows` for every query whose text contains `pattern`.
    pub fn respond(&self, pattern: &str, rows: RowSet) -> &Self {
        self.state().responses.push((pattern.to_string(), rows));
        self
    }

    /// Fail every query whose text contains `pattern`.
    pub fn fail_query(&self, pattern: &str, err: DriverError) -> &Self {
        self.state()
            .query_failures
            .push((pattern.to_string(), err));
        self
    }

    /// Fail the `n`-th execute call (1-based, counted over the driver's life).
    pub fn fail_execute_on(&self, n: usize, err: DriverError) -> &Self {
        self.state().execute_failures.push((n, err));
        self
    }

    pub fn rows_affected(&self, n: u64) -> &Self {
        self.state().rows_affected = Some(n);
        self
    }

    /// Values handed back through the out-bind `bind` by every
    /// `execute_returning` call.
    pub fn returns(&self, bind: &str, values: Vec<Option<&str>>) -> &Self {
        let values = values.into_iter().map(|v| v.map(str::to_string)).collect();
        self.state().returned.push((bind.to_string(), values));
        self
    }

    pub fn with_banner(&self, banner: &str) -> &Self {
        self.respond(
            "V$VERSION",
            rowset(&["BANNER"], vec![vec![JsonValue::from(banner)]]),
        )
    }

    // Inspection

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }

    pub fn executed(&self) -> Vec<(String, Params)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Execute(sql, params) => Some((sql.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Query(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Parameters bound to the last query containing `pattern`.
    pub fn query_params(&self, pattern: &str) -> Option<Params> {
        self.state()
            .query_params
            .iter()
            .rev()
            .find(|(sql, _)| sql.contains(pattern))
            .map(|(_, p)| p.clone())
    }

    /// Sessions checked out and not yet released or discarded.
    pub fn open_sessions(&self) -> usize {
        let state = self.state();
        let out = state.calls.iter().filter(|c| **c == Call::Acquire).count();
        let back = state
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Release | Call::Discard))
            .count();
        out - back
    }

    /// Out-bind names passed to each `execute_returning` call.
    pub fn out_binds(&self) -> Vec<Vec<String>> {
        self.state().out_binds.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

impl Driver for MockDriver {
    fn open_pool(&self, _options: &PoolOptions) -> Result<Box<dyn SessionPool>, DriverError> {
        let mut state = self.state();
        state.calls.push(Call::OpenPool);
        if let Some(err) = state.open_error.clone() {
            return Err(err);
        }
        Ok(Box::new(MockPool {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockPool {
    state: Arc<Mutex<MockState>>,
}

impl SessionPool for MockPool {
    fn acquire(&self) -> Result<Box<dyn DriverSession>, DriverError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.acquire_error.clone() {
            return Err(err);
        }
        state.calls.push(Call::Acquire);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            discarded: false,
        }))
    }

    fn close(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ClosePool);
        match state.close_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
    discarded: bool,
}

impl DriverSession for MockSession {
    fn query(&mut self, sql: &str, params: &Params) -> Result<RowSet, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Query(sql.to_string()));
        state.query_params.push((sql.to_string(), params.clone()));
        if let Some((_, err)) = state.query_failures.iter().find(|(p, _)| sql.contains(p)) {
            return Err(err.clone());
        }
        Ok(state
            .responses
            .iter()
            .find(|(p, _)| sql.contains(p))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.executes += 1;
        let n = state.executes;
        state
            .calls
            .push(Call::Execute(sql.to_string(), params.clone()));
        if let Some((_, err)) = state.execute_failures.iter().find(|(at, _)| *at == n) {
            return Err(err.clone());
        }
        Ok(state.rows_affected.unwrap_or(1))
    }

    fn execute_returning(
        &mut self,
        sql: &str,
        params: &Params,
        out_binds: &[String],
    ) -> Result<(u64, Vec<Vec<Option<String>>>), DriverError> {
        let rows_affected = self.execute(sql, params)?;
        let mut state = self.state.lock().unwrap();
        state.out_binds.push(out_binds.to_vec());
        let values = out_binds
            .iter()
            .map(|bind| {
                state
                    .returned
                    .iter()
                    .find(|(name, _)| name == bind)
                    .map(|(_, values)| values.clone())
                    .unwrap_or_default()
            })
            .collect();
        Ok((rows_affected, values))
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().calls.push(Call::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().calls.push(Call::Rollback);
        Ok(())
    }

    fn discard(mut self: Box<Self>) -> Result<(), DriverError> {
        self.discarded = true;
        self.state.lock().unwrap().calls.push(Call::Discard);
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if !self.discarded {
            if let Ok(mut state) = self.state.lock() {
                state.calls.push(Call::Release);
            }
        }
    }
}

/// Build a row set from column names and positional values.
pub fn rowset(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> RowSet {
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let rows = rows
        .into_iter()
        .map(|values| {
            columns
                .iter()
                .cloned()
                .zip(values)
                .collect::<Row>()
        })
        .collect();
    RowSet { columns, rows }
}

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::builder()
        .host("db.example.com")
        .port(1521)
        .username("scott")
        .password("tiger")
        .service_name("ORCLPDB1")
        .pool_max(4)
        .build()
        .unwrap()
}

pub fn manager_with(driver: &MockDriver) -> oracle_access::ConnectionManager {
    oracle_access::ConnectionManager::with_driver(test_config(), Arc::new(driver.clone()))
}

/// A connected manager with the connect-time calls cleared.
pub fn connected(driver: &MockDriver) -> oracle_access::ConnectionManager {
    let manager = manager_with(driver);
    manager.connect().unwrap();
    driver.clear_calls();
    manager
}
