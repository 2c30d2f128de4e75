//! DDL builders.
//!
//! DDL cannot use bind parameters, so everything embedded here is either a
//! validated identifier (emitted bare, upper-case), a data type that matched
//! the type grammar, or a default value rendered as a literal.

use super::identifier::{bare_object_name, validate_identifier};
use crate::error::{OraError, OraResult};
use crate::models::{ColumnSpec, IndexConfig};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

/// Default expressions accepted verbatim instead of being quoted.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "SYSDATE",
    "SYSTIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIMESTAMP",
    "LOCALTIMESTAMP",
    "USER",
    "SYS_GUID()",
];

fn data_type_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:",
            r"(?:VARCHAR2|NVARCHAR2|CHAR|NCHAR)\(\d{1,5}(?: (?:BYTE|CHAR))?\)",
            r"|RAW\(\d{1,5}\)",
            r"|NUMBER(?:\(\d{1,2}(?:, ?-?\d{1,3})?\))?",
            r"|FLOAT(?:\(\d{1,3}\))?",
            r"|TIMESTAMP(?:\(\d\))?(?: WITH (?:LOCAL )?TIME ZONE)?",
            r"|INTERVAL YEAR(?:\(\d\))? TO MONTH",
            r"|INTERVAL DAY(?:\(\d\))? TO SECOND(?:\(\d\))?",
            r"|DATE|CLOB|NCLOB|BLOB|BINARY_FLOAT|BINARY_DOUBLE|INTEGER|LONG|ROWID|JSON|BOOLEAN",
            r")$",
        ))
        .expect("failed to compile data type regex")
    })
}

/// Normalize a data type (trim, upper-case, collapse whitespace) and check it
/// against the conservative Oracle type grammar.
pub fn validate_data_type(data_type: &str) -> OraResult<String> {
    let normalized = data_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
        .replace(" (", "(")
        .replace("( ", "(")
        .replace(" )", ")");
    if normalized.is_empty() {
        return Err(OraError::validation("Data type cannot be empty"));
    }
    if !data_type_pattern().is_match(&normalized) {
        return Err(OraError::validation(format!(
            "Unsupported or malformed data type '{}'",
            data_type.trim()
        )));
    }
    Ok(normalized)
}

/// Render a default value as a SQL literal.
pub fn render_default(value: &JsonValue) -> OraResult<String> {
    match value {
        JsonValue::Null => Ok("NULL".to_string()),
        JsonValue::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::String(s) => {
            let upper = s.trim().to_ascii_uppercase();
            if DEFAULT_KEYWORDS.contains(&upper.as_str()) {
                Ok(upper)
            } else {
                Ok(format!("'{}'", s.replace('\'', "''")))
            }
        }
        JsonValue::Array(_) | JsonValue::Object(_) => Err(OraError::validation(
            "Default values must be a number, string, boolean or null",
        )),
    }
}

/// `CREATE TABLE` without a schema qualifier.
///
/// ```text
/// CREATE TABLE T (ID NUMBER NOT NULL, NAME VARCHAR2(100), PRIMARY KEY (ID))
/// ```
pub fn create_table_ddl<P: AsRef<str>>(
    table: &str,
    columns: &[ColumnSpec],
    primary_keys: &[P],
) -> OraResult<String> {
    create_table_ddl_in(table, columns, primary_keys, None)
}

/// `CREATE TABLE` with an optional schema qualifier.
pub fn create_table_ddl_in<P: AsRef<str>>(
    table: &str,
    columns: &[ColumnSpec],
    primary_keys: &[P],
    schema: Option<&str>,
) -> OraResult<String> {
    let object = bare_object_name(table, schema)?;
    if columns.is_empty() {
        return Err(OraError::validation(format!(
            "CREATE TABLE {object} requires at least one column"
        )));
    }

    let mut names: Vec<String> = Vec::with_capacity(columns.len());
    let mut definitions = Vec::with_capacity(columns.len() + 1);
    for column in columns {
        let name = validate_identifier(&column.name)?;
        if names.contains(&name) {
            return Err(OraError::validation(format!("Duplicate column {name}")));
        }
        let data_type = match column.data_type.as_deref() {
            Some(t) if !t.trim().is_empty() => validate_data_type(t)?,
            _ => {
                return Err(OraError::validation(format!(
                    "Column {name} is missing a data type"
                )));
            }
        };

        let mut definition = format!("{name} {data_type}");
        if let Some(default) = &column.default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&render_default(default)?);
        }
        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        definitions.push(definition);
        names.push(name);
    }

    if !primary_keys.is_empty() {
        let mut pk = Vec::with_capacity(primary_keys.len());
        for key in primary_keys {
            let key = validate_identifier(key.as_ref())?;
            if !names.contains(&key) {
                return Err(OraError::validation(format!(
                    "Primary key column {key} is not a declared column"
                )));
            }
            if pk.contains(&key) {
                return Err(OraError::validation(format!(
                    "Duplicate primary key column {key}"
                )));
            }
            pk.push(key);
        }
        definitions.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }

    Ok(format!("CREATE TABLE {object} ({})", definitions.join(", ")))
}

/// `DROP TABLE [schema.]table`.
pub fn drop_table_ddl(table: &str, schema: Option<&str>) -> OraResult<String> {
    Ok(format!("DROP TABLE {}", bare_object_name(table, schema)?))
}

/// `DROP TABLE [schema.]table PURGE` (bypasses the recycle bin).
pub fn drop_table_purge_ddl(table: &str, schema: Option<&str>) -> OraResult<String> {
    Ok(format!("{} PURGE", drop_table_ddl(table, schema)?))
}

/// `CREATE [UNIQUE] INDEX [schema.]name ON [schema.]table (cols) [TABLESPACE t] [PARALLEL n]`.
pub fn build_create_index(config: &IndexConfig) -> OraResult<String> {
    let schema = config.schema.as_deref();
    let index = bare_object_name(&config.name, schema)?;
    let table = bare_object_name(&config.table, schema)?;
    if config.columns.is_empty() {
        return Err(OraError::validation(format!(
            "Index {index} requires at least one column"
        )));
    }
    let mut columns: Vec<String> = Vec::with_capacity(config.columns.len());
    for column in &config.columns {
        let column = validate_identifier(column)?;
        if columns.contains(&column) {
            return Err(OraError::validation(format!(
                "Duplicate index column {column}"
            )));
        }
        columns.push(column);
    }

    let mut sql = format!(
        "CREATE {}INDEX {index} ON {table} ({})",
        if config.unique { "UNIQUE " } else { "" },
        columns.join(", ")
    );
    if let Some(tablespace) = &config.tablespace {
        sql.push_str(&format!(" TABLESPACE {}", validate_identifier(tablespace)?));
    }
    match config.parallel {
        Some(0) => {
            return Err(OraError::validation("PARALLEL degree must be at least 1"));
        }
        Some(degree) => sql.push_str(&format!(" PARALLEL {degree}")),
        None => {}
    }
    Ok(sql)
}
