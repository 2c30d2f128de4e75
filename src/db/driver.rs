//! Driver abstraction.
//!
//! The connection manager talks to the database only through these traits.
//! [`OracleDriver`](super::OracleDriver) is the production implementation on
//! top of the `oracle` crate's session pool; tests plug in an in-memory driver.
//!
//! Errors raised here are raw [`DriverError`]s. They are never returned to
//! callers directly; the [`ErrorTranslator`](super::ErrorTranslator) turns
//! them into classified [`OraError`](crate::error::OraError)s.

use crate::config::ConnectionConfig;
use crate::models::{Params, Row};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a driver, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Could not reach or authenticate against the server.
    #[error("{message}")]
    Connection { message: String },

    /// A call or checkout deadline was exceeded.
    #[error("{message}")]
    Timeout { message: String },

    /// The server rejected the statement (`ORA-xxxxx`).
    #[error("{message}")]
    Database { message: String },

    /// Client-side failure (bind conversion, closed handle, `DPI-xxxx`).
    #[error("{message}")]
    Interface { message: String },
}

impl DriverError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn interface(message: impl Into<String>) -> Self {
        Self::Interface {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message }
            | Self::Timeout { message }
            | Self::Database { message }
            | Self::Interface { message } => message,
        }
    }

    /// Categorize a driver message by its prefix.
    ///
    /// `ORA-` messages come from the server, `DPI-1067` is the client-side
    /// call timeout, everything else is an interface failure.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let head = message.trim_start();
        if head.starts_with("DPI-1067") {
            Self::timeout(message)
        } else if head.starts_with("ORA-") {
            Self::database(message)
        } else {
            Self::interface(message)
        }
    }
}

/// Pool parameters derived from a validated [`ConnectionConfig`].
#[derive(Clone)]
pub struct PoolOptions {
    pub username: String,
    /// Contains sensitive data - never log
    pub password: String,
    pub connect_string: String,
    pub min_sessions: u32,
    pub max_sessions: u32,
    /// Applied to every checkout and every round trip
    pub call_timeout: Duration,
}

impl std::fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolOptions")
            .field("username", &self.username)
            .field("password", &"****")
            .field("connect_string", &self.connect_string)
            .field("min_sessions", &self.min_sessions)
            .field("max_sessions", &self.max_sessions)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl From<&ConnectionConfig> for PoolOptions {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            username: config.username().to_string(),
            password: config.password().to_string(),
            connect_string: config.connect_string(),
            min_sessions: config.pool_min(),
            max_sessions: config.pool_max(),
            call_timeout: config.timeout(),
        }
    }
}

/// Rows returned by a query, column order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Entry point of a database driver.
pub trait Driver: Send + Sync {
    /// Open a session pool. Implementations must not hand out sessions from a
    /// pool that failed to open.
    fn open_pool(&self, options: &PoolOptions) -> Result<Box<dyn SessionPool>, DriverError>;
}

/// A bounded pool of database sessions.
pub trait SessionPool: Send + Sync {
    /// Check out one session, waiting at most the configured call timeout.
    fn acquire(&self) -> Result<Box<dyn DriverSession>, DriverError>;

    /// Close the pool. When sessions are still checked out this succeeds
    /// without closing them; the pool is released once the last one returns.
    fn close(&self) -> Result<(), DriverError>;
}

/// One checked-out database session. Autocommit is always off; the caller
/// decides when to commit.
pub trait DriverSession: Send {
    /// Run a row-returning statement and fetch every row.
    fn query(&mut self, sql: &str, params: &Params) -> Result<RowSet, DriverError>;

    /// Run a statement that does not return rows. Returns the affected row count.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DriverError>;

    /// Run a statement with a `RETURNING ... INTO` clause. `out_binds` names
    /// the out-bind placeholders; for each one the returned values (one per
    /// affected row) come back as text, in `out_binds` order.
    fn execute_returning(
        &mut self,
        sql: &str,
        params: &Params,
        out_binds: &[String],
    ) -> Result<(u64, Vec<Vec<Option<String>>>), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Close the session instead of returning it to the pool.
    fn discard(self: Box<Self>) -> Result<(), DriverError>;
}
