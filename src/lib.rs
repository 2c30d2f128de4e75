//! Oracle database access layer.
//!
//! Pooled, synchronous access to one Oracle database: connection lifecycle,
//! injection-safe SQL building, catalog introspection, Singer schema mapping
//! and a uniform error taxonomy. An async adapter runs the blocking core on
//! tokio's blocking pool.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod offload;
pub mod retry;
pub mod singer;
pub mod sql;

pub use config::{Config, ConnectionConfig};
pub use db::{ConnectionManager, PooledSession, SchemaIntrospector};
pub use error::{ErrorKind, OraError, OraResult};
pub use offload::AsyncConnectionManager;
pub use retry::RetryPolicy;
