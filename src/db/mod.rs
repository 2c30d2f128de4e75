//! Database access layer.
//!
//! This module provides:
//! - The driver seam (`Driver` / `SessionPool` / `DriverSession`) and its Oracle implementation
//! - Connection pool management
//! - Driver error translation
//! - Schema introspection
//! - Column type decoding

pub mod driver;
pub mod oracle;
pub mod pool;
pub mod schema;
pub mod translator;
pub mod types;

pub use driver::{Driver, DriverError, DriverSession, PoolOptions, RowSet, SessionPool};
pub use oracle::OracleDriver;
pub use pool::{ConnectionManager, PooledSession};
pub use schema::SchemaIntrospector;
pub use translator::{ErrorTranslator, TranslationScope};
