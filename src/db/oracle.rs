//! Production driver backed by the `oracle` crate (ODPI-C).
//!
//! Sessions come from an `oracle::pool::Pool` bounded by the configured
//! minimum/maximum. Every checkout waits at most the call timeout, and the same
//! timeout is applied to each round trip on the session. Autocommit is off.

use super::driver::{Driver, DriverError, DriverSession, PoolOptions, RowSet, SessionPool};
use super::types::{
    TypeCategory, categorize_type, decode_binary_value, decode_float, decode_json_text,
    decode_number_text,
};
use crate::models::{Params, QueryParam, Row};
use oracle::conn::CloseMode as ConnCloseMode;
use oracle::pool::{CloseMode, GetMode, Pool, PoolBuilder};
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, Statement};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

impl From<oracle::Error> for DriverError {
    fn from(err: oracle::Error) -> Self {
        DriverError::from_message(err.to_string())
    }
}

/// Driver for real Oracle servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDriver;

impl OracleDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for OracleDriver {
    fn open_pool(&self, options: &PoolOptions) -> Result<Box<dyn SessionPool>, DriverError> {
        let pool = PoolBuilder::new(
            options.username.as_str(),
            options.password.as_str(),
            options.connect_string.as_str(),
        )
        .min_connections(options.min_sessions)
        .max_connections(options.max_sessions)
        .get_mode(GetMode::TimedWait(options.call_timeout))
        .build()
        .map_err(connect_error)?;

        debug!(
            min = options.min_sessions,
            max = options.max_sessions,
            "Opened Oracle session pool"
        );

        Ok(Box::new(OraclePool {
            pool,
            call_timeout: options.call_timeout,
        }))
    }
}

/// Failures while building the pool are connection failures unless they are timeouts.
fn connect_error(err: oracle::Error) -> DriverError {
    match DriverError::from(err) {
        DriverError::Timeout { message } => DriverError::Timeout { message },
        other => DriverError::connection(other.message()),
    }
}

struct OraclePool {
    pool: Pool,
    call_timeout: Duration,
}

impl SessionPool for OraclePool {
    fn acquire(&self) -> Result<Box<dyn DriverSession>, DriverError> {
        let mut conn = self.pool.get()?;
        conn.set_call_timeout(Some(self.call_timeout))?;
        conn.set_autocommit(false);
        Ok(Box::new(OracleSession { conn }))
    }

    fn close(&self) -> Result<(), DriverError> {
        match self.pool.close(&CloseMode::Default) {
            Ok(()) => Ok(()),
            Err(e) if sessions_still_out(&e.to_string()) => {
                debug!("Session pool busy; it is released when the last session returns");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// ORA-24422: a default-mode pool close refused because sessions are checked out.
fn sessions_still_out(message: &str) -> bool {
    message.contains("ORA-24422")
}

struct OracleSession {
    conn: Connection,
}

impl OracleSession {
    fn prepare(&self, sql: &str, params: &Params) -> Result<Statement, DriverError> {
        let mut stmt = self.conn.statement(sql).build()?;
        for (name, value) in params.iter() {
            let value = bind_value(value);
            stmt.bind(name, value.as_ref())?;
        }
        Ok(stmt)
    }
}

impl DriverSession for OracleSession {
    fn query(&mut self, sql: &str, params: &Params) -> Result<RowSet, DriverError> {
        let mut stmt = self.prepare(sql, params)?;
        let result_set = stmt.query(&[])?;

        let columns: Vec<(String, TypeCategory)> = result_set
            .column_info()
            .iter()
            .map(|col| {
                (
                    col.name().to_string(),
                    categorize_type(&col.oracle_type().to_string()),
                )
            })
            .collect();

        let mut rows = Vec::new();
        for row_result in result_set {
            let row = row_result?;
            let mut out = Row::new();
            for (idx, (name, category)) in columns.iter().enumerate() {
                out.insert(name.clone(), decode_column(&row, idx, *category)?);
            }
            rows.push(out);
        }

        Ok(RowSet {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        })
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DriverError> {
        let mut stmt = self.prepare(sql, params)?;
        stmt.execute(&[])?;
        Ok(stmt.row_count()?)
    }

    fn execute_returning(
        &mut self,
        sql: &str,
        params: &Params,
        out_binds: &[String],
    ) -> Result<(u64, Vec<Vec<Option<String>>>), DriverError> {
        let mut stmt = self.prepare(sql, params)?;
        for name in out_binds {
            stmt.bind(name.as_str(), &OracleType::Varchar2(RETURNING_TEXT_LEN))?;
        }
        stmt.execute(&[])?;
        let rows_affected = stmt.row_count()?;
        let values = out_binds
            .iter()
            .map(|name| stmt.returned_values::<_, Option<String>>(name.as_str()))
            .collect::<Result<Vec<_>, oracle::Error>>()?;
        Ok((rows_affected, values))
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.conn.commit()?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.conn.rollback()?;
        Ok(())
    }

    fn discard(self: Box<Self>) -> Result<(), DriverError> {
        self.conn.close_with_mode(ConnCloseMode::Drop)?;
        Ok(())
    }
}

/// Size of the text out-binds used for `RETURNING ... INTO`.
const RETURNING_TEXT_LEN: u32 = 4000;

/// Convert a bind parameter to a value the driver can bind.
///
/// Booleans bind as `1`/`0` and structured JSON as its text, which is what
/// `NUMBER(1)` and `CLOB` columns expect.
fn bind_value(param: &QueryParam) -> Box<dyn ToSql> {
    match param {
        QueryParam::Null => Box::new(None::<String>),
        QueryParam::Bool(b) => Box::new(i64::from(*b)),
        QueryParam::Int(i) => Box::new(*i),
        QueryParam::Float(f) => Box::new(*f),
        QueryParam::String(s) => Box::new(s.clone()),
        QueryParam::Json(v) => Box::new(v.to_string()),
        QueryParam::Bytes(b) => Box::new(b.clone()),
    }
}

/// Fetch one column in the representation its category asks for.
fn decode_column(
    row: &oracle::Row,
    idx: usize,
    category: TypeCategory,
) -> Result<JsonValue, DriverError> {
    let value = match category {
        TypeCategory::Integer | TypeCategory::Decimal => row
            .get::<usize, Option<String>>(idx)?
            .map(|s| decode_number_text(&s)),
        TypeCategory::Float => row.get::<usize, Option<f64>>(idx)?.map(decode_float),
        TypeCategory::Boolean => row.get::<usize, Option<bool>>(idx)?.map(JsonValue::Bool),
        TypeCategory::Binary => row
            .get::<usize, Option<Vec<u8>>>(idx)?
            .map(|b| decode_binary_value(&b)),
        TypeCategory::Json => row
            .get::<usize, Option<String>>(idx)?
            .map(|s| decode_json_text(&s)),
        TypeCategory::Text => row.get::<usize, Option<String>>(idx)?.map(JsonValue::String),
    };
    Ok(value.unwrap_or(JsonValue::Null))
}
