//! Injection-safe Oracle SQL text generation.
//!
//! Caller-supplied values are always bound as named parameters and never
//! interpolated. Caller-supplied identifiers (table, column, schema, index
//! names) pass [`validate_identifier`] and are embedded in canonical
//! upper-case form: double-quoted in DML, bare in DDL.
//!
//! Every builder is a pure function; none of them touches the database.

pub mod builder;
pub mod ddl;
pub mod identifier;

pub use builder::{
    RETURNING_BIND_PREFIX, WHERE_BIND_PREFIX, build_delete, build_insert, build_merge,
    build_select, build_update, dual_source, returning_bind,
};
pub use ddl::{
    build_create_index, create_table_ddl, create_table_ddl_in, drop_table_ddl,
    drop_table_purge_ddl, render_default, validate_data_type,
};
pub use identifier::{MAX_IDENTIFIER_LEN, is_reserved_word, validate_identifier};

use crate::models::Params;
use serde::Serialize;

/// SQL text together with the parameters it binds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Params,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Check whether a statement returns rows (`SELECT` or `WITH`).
///
/// Leading whitespace, `--` and `/* */` comments and opening parentheses are
/// skipped before the first keyword is read.
pub fn returns_rows(sql: &str) -> bool {
    let keyword = first_keyword(sql);
    keyword.eq_ignore_ascii_case("SELECT") || keyword.eq_ignore_ascii_case("WITH")
}

fn first_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            break;
        }
    }
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    &rest[..end]
}
