//! Data models for the Oracle access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionInfo, TransactionState};
pub use query::{Params, QueryParam, QueryResult, Row};
pub use schema::{
    ColumnMetadata, ColumnSpec, ConstraintKind, ConstraintMetadata, IndexConfig, IndexMetadata,
    TableMetadata, TableStatistics, parse_default_value,
};
