//! Connection-related data models.
//!
//! This module defines types describing connection and transaction state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Information about the live connection, returned by a successful `connect()`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    /// Password is masked
    pub url: String,
    pub server_version: Option<String>,
    pub pool_min: u32,
    pub pool_max: u32,
    pub connected_at: DateTime<Utc>,
}

/// Transaction state of a pooled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// No explicit transaction; writes commit immediately.
    Idle,
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    /// Check if the transaction is still active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the transaction has ended (committed or rolled back).
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}
