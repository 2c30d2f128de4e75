//! Error types for the Oracle access layer.
//!
//! Every public operation returns [`OraResult`]. Failures are classified into a
//! fixed taxonomy ([`ErrorKind`]) so callers can decide what to do without
//! parsing messages. Errors that originate in the driver are produced by the
//! [`ErrorTranslator`](crate::db::ErrorTranslator) and carry an
//! [`ErrorContext`] with a correlation id, the operation name, a truncated SQL
//! snippet and the native `ORA-xxxxx` code when one was reported.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Error classification shared by every failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Contradictory or invalid configuration, caught before any I/O.
    Configuration,
    /// Network or authentication failure, or no open connection.
    Connection,
    /// A deadline was exceeded.
    Timeout,
    /// Malformed SQL, bind mismatch, or an Oracle syntax/semantic error.
    Query,
    /// Introspection target missing or inaccessible.
    Metadata,
    /// Local identifier or DDL-shape violation.
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Configuration => "ConfigurationError",
            Self::Connection => "ConnectionError",
            Self::Timeout => "TimeoutError",
            Self::Query => "QueryError",
            Self::Metadata => "MetadataError",
            Self::Validation => "ValidationError",
        };
        f.write_str(name)
    }
}

/// Diagnostic context attached to every translated driver error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorContext {
    pub correlation_id: Uuid,
    pub operation: String,
    /// At most [`MAX_SQL_SNIPPET_CHARS`] characters, whitespace collapsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_snippet: Option<String>,
    /// e.g. `ORA-00942`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ora_code: Option<String>,
}

/// Upper bound on the SQL text kept in an [`ErrorContext`].
pub const MAX_SQL_SNIPPET_CHARS: usize = 100;

impl ErrorContext {
    /// Create a context with a fresh correlation id.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            operation: operation.into(),
            sql_snippet: None,
            ora_code: None,
        }
    }

    /// Attach a SQL snippet, collapsing whitespace and truncating it.
    pub fn with_sql(mut self, sql: &str) -> Self {
        self.sql_snippet = Some(truncate_sql(sql));
        self
    }

    /// Attach a native Oracle error code.
    pub fn with_ora_code(mut self, code: Option<String>) -> Self {
        self.ora_code = code;
        self
    }
}

/// Collapse runs of whitespace and cut the text to [`MAX_SQL_SNIPPET_CHARS`].
pub fn truncate_sql(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_SQL_SNIPPET_CHARS {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(MAX_SQL_SNIPPET_CHARS - 3).collect();
    out.push_str("...");
    out
}

#[derive(Error, Debug)]
pub enum OraError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not connected: '{operation}' requires an open connection. Call connect() first.")]
    NotConnected { operation: String },

    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        context: ErrorContext,
    },

    #[error("Timeout: {message}")]
    Timeout {
        message: String,
        context: ErrorContext,
    },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        context: ErrorContext,
    },

    #[error("Metadata error: {message}")]
    Metadata {
        message: String,
        context: ErrorContext,
    },
}

impl OraError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-connected error for the given operation.
    pub fn not_connected(operation: impl Into<String>) -> Self {
        Self::NotConnected {
            operation: operation.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Connection {
            message: message.into(),
            context,
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Timeout {
            message: message.into(),
            context,
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Query {
            message: message.into(),
            context,
        }
    }

    /// Create a metadata error.
    pub fn metadata(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Metadata {
            message: message.into(),
            context,
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotConnected { .. } | Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Query { .. } => ErrorKind::Query,
            Self::Metadata { .. } => ErrorKind::Metadata,
        }
    }

    /// True when the failure was raised because no connection is open.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }

    /// Driver diagnostics, present on every translated error.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Connection { context, .. }
            | Self::Timeout { context, .. }
            | Self::Query { context, .. }
            | Self::Metadata { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Native `ORA-xxxxx` code, if the driver reported one.
    pub fn ora_code(&self) -> Option<&str> {
        self.context().and_then(|c| c.ora_code.as_deref())
    }

    /// Get a remediation hint for well-known failures.
    pub fn suggestion(&self) -> Option<&'static str> {
        if let Self::NotConnected { .. } = self {
            return Some("Call connect() or ensure_connected() before issuing statements");
        }
        let hint = match self.ora_code()? {
            "ORA-01017" => "Verify the username and password",
            "ORA-12154" | "ORA-12545" => "Check the host name and listener configuration",
            "ORA-12505" => "Check the SID; the listener does not know it",
            "ORA-12514" => "Check the service name; the listener does not know it",
            "ORA-12541" => "Check that the listener is running on the configured port",
            "ORA-00942" => "Check that the table or view exists and is accessible",
            "ORA-00904" => "Check the column names referenced by the statement",
            "ORA-01008" => "Bind every placeholder referenced by the statement",
            "ORA-00001" => "A unique constraint was violated; check for duplicate keys",
            _ => return None,
        };
        Some(hint)
    }

    /// Check if this error is worth retrying at the caller's level.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Result type alias for every public operation.
pub type OraResult<T> = Result<T, OraError>;
