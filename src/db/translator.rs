//! Driver error translation.
//!
//! Every driver failure passes through an [`ErrorTranslator`] before it reaches
//! a caller. The translator picks the error class from the driver category and
//! the message, attaches a fresh correlation id, the operation name, a
//! truncated SQL snippet and the first `ORA-xxxxx` code, and logs the failure
//! once with the same correlation id.

use super::driver::DriverError;
use crate::error::{ErrorContext, ErrorKind, OraError};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Where the failure happened. Decides the class of otherwise unclassified errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationScope {
    /// Statement execution: unclassified failures are query errors.
    #[default]
    General,
    /// Pool creation and the liveness probe: everything is a connection error
    /// unless it is a timeout.
    Connect,
    /// Catalog introspection: connection and timeout errors keep their class,
    /// everything else is a metadata error.
    Metadata,
}

fn ora_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ORA-\d{5}").expect("failed to compile ORA code regex"))
}

fn timeout_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)DPI-1067|ORA-01013|ORA-12170|ORA-03136|timed out|call timeout")
            .expect("failed to compile timeout regex")
    })
}

fn connection_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"ORA-(01017|12154|12505|12514|12537|12541|12543|12545|12547|12560",
            r"|03113|03114|03135|28000|28001)",
            r"|DPI-1010|DPI-1080",
        ))
        .expect("failed to compile connection regex")
    })
}

/// Extract the first `ORA-xxxxx` code from a driver message.
pub fn extract_ora_code(message: &str) -> Option<String> {
    ora_code_pattern()
        .find(message)
        .map(|m| m.as_str().to_string())
}

/// Decide the error class for a driver failure in a given scope.
pub fn classify(err: &DriverError, scope: TranslationScope) -> ErrorKind {
    let message = err.message();
    if matches!(err, DriverError::Timeout { .. }) || timeout_pattern().is_match(message) {
        return ErrorKind::Timeout;
    }
    if matches!(err, DriverError::Connection { .. }) || connection_pattern().is_match(message) {
        return ErrorKind::Connection;
    }
    match scope {
        TranslationScope::Connect => ErrorKind::Connection,
        TranslationScope::Metadata => ErrorKind::Metadata,
        TranslationScope::General => ErrorKind::Query,
    }
}

/// Translates driver failures for one operation.
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    operation: String,
    sql: Option<String>,
    scope: TranslationScope,
}

impl ErrorTranslator {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            sql: None,
            scope: TranslationScope::General,
        }
    }

    /// Attach the statement text (truncated in the error context).
    pub fn with_sql(mut self, sql: &str) -> Self {
        self.sql = Some(sql.to_string());
        self
    }

    pub fn scope(mut self, scope: TranslationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Translate and log a driver failure.
    pub fn translate(&self, err: DriverError) -> OraError {
        let message = err.message().to_string();
        let mut context =
            ErrorContext::new(&self.operation).with_ora_code(extract_ora_code(&message));
        if let Some(sql) = &self.sql {
            context = context.with_sql(sql);
        }
        let kind = classify(&err, self.scope);

        warn!(
            correlation_id = %context.correlation_id,
            operation = %context.operation,
            kind = %kind,
            ora_code = ?context.ora_code,
            error = %message,
            "Database operation failed"
        );

        match kind {
            ErrorKind::Timeout => OraError::timeout(message, context),
            ErrorKind::Connection => OraError::connection(message, context),
            ErrorKind::Metadata => OraError::metadata(message, context),
            // classify() never yields the local-only kinds
            ErrorKind::Query | ErrorKind::Configuration | ErrorKind::Validation => {
                OraError::query(message, context)
            }
        }
    }
}
