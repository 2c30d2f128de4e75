//! Schema introspection.
//!
//! Read-only queries against the `ALL_*` catalog views. The owner defaults to
//! the session's current schema when no schema is given. Table and schema
//! arguments are validated as identifiers and bound, never interpolated.
//!
//! Results are built fresh on every call. Failures are translated with the
//! metadata scope: connection and timeout failures keep their kind, anything
//! else becomes a metadata error.

use crate::db::pool::{ConnectionManager, PooledSession};
use crate::db::translator::TranslationScope;
use crate::error::{ErrorContext, OraError, OraResult};
use crate::models::{
    ColumnMetadata, ConstraintKind, ConstraintMetadata, IndexMetadata, Params, Row,
    TableMetadata, TableStatistics,
};
use crate::sql::validate_identifier;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Format `LAST_ANALYZED` is rendered in by the statistics query.
const ANALYZED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Catalog reader borrowing a connected [`ConnectionManager`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaIntrospector<'m> {
    manager: &'m ConnectionManager,
}

impl<'m> SchemaIntrospector<'m> {
    pub fn new(manager: &'m ConnectionManager) -> Self {
        Self { manager }
    }

    /// Distinct owners that own at least one visible table, ordered.
    pub fn get_schemas(&self) -> OraResult<Vec<String>> {
        let mut session = self.session("get_schemas")?;
        let result = session.query_as("get_schemas", queries::SCHEMAS, &Params::new())?;
        Ok(result.rows.iter().filter_map(|r| text(r, "OWNER")).collect())
    }

    /// Table names of a schema, ordered. An empty schema yields an empty list.
    pub fn get_table_names(&self, schema: Option<&str>) -> OraResult<Vec<String>> {
        let owner = owner_param(schema)?;
        let mut session = self.session("get_table_names")?;
        let result = session.query_as(
            "get_table_names",
            queries::TABLE_NAMES,
            &Params::new().bind("owner", owner),
        )?;
        Ok(result
            .rows
            .iter()
            .filter_map(|r| text(r, "TABLE_NAME"))
            .collect())
    }

    /// Columns ordered by position. A missing table yields an empty list.
    pub fn get_column_info(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> OraResult<Vec<ColumnMetadata>> {
        let target = Target::new(table, schema)?;
        let mut session = self.session("get_column_info")?;
        fetch_columns(&mut session, &target)
    }

    /// Primary key column names ordered by key position.
    pub fn get_primary_key_columns(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> OraResult<Vec<String>> {
        let target = Target::new(table, schema)?;
        let mut session = self.session("get_primary_key_columns")?;
        fetch_primary_key(&mut session, &target)
    }

    /// Primary key, foreign key, unique and check constraints. System-generated
    /// `NOT NULL` checks are left out; they show up as non-nullable columns.
    pub fn get_constraints(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> OraResult<Vec<ConstraintMetadata>> {
        let target = Target::new(table, schema)?;
        let mut session = self.session("get_constraints")?;
        fetch_constraints(&mut session, &target)
    }

    pub fn get_indexes(&self, table: &str, schema: Option<&str>) -> OraResult<Vec<IndexMetadata>> {
        let target = Target::new(table, schema)?;
        let mut session = self.session("get_indexes")?;
        fetch_indexes(&mut session, &target)
    }

    /// Optimizer statistics. Missing or never-analyzed tables yield empty
    /// statistics.
    pub fn get_table_statistics(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> OraResult<TableStatistics> {
        let target = Target::new(table, schema)?;
        let mut session = self.session("get_table_statistics")?;
        fetch_statistics(&mut session, &target)
    }

    pub fn table_exists(&self, table: &str, schema: Option<&str>) -> OraResult<bool> {
        let target = Target::new(table, schema)?;
        let mut session = self.session("table_exists")?;
        let result =
            session.query_as("table_exists", queries::TABLE_EXISTS, &target.params())?;
        let count = result
            .rows
            .first()
            .and_then(|r| unsigned(r, "TABLE_COUNT"))
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Full description of one table, read on a single pooled session.
    ///
    /// Every sub-fetch must succeed. A table with no visible columns does not
    /// exist (or is not visible) and is reported as a metadata error.
    pub fn get_table_metadata(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> OraResult<TableMetadata> {
        let target = Target::new(table, schema)?;
        let mut session = self.session("get_table_metadata")?;

        let columns = fetch_columns(&mut session, &target)?;
        if columns.is_empty() {
            return Err(OraError::metadata(
                format!("Table '{}' not found or has no visible columns", target.table),
                ErrorContext::new("get_table_metadata"),
            ));
        }

        let schema = match &target.owner {
            Some(owner) => owner.clone(),
            None => current_schema(&mut session)?,
        };
        let primary_key = fetch_primary_key(&mut session, &target)?;
        let constraints = fetch_constraints(&mut session, &target)?;
        let indexes = fetch_indexes(&mut session, &target)?;
        let statistics = fetch_statistics(&mut session, &target)?;

        debug!(
            table = %target.table,
            schema = %schema,
            columns = columns.len(),
            constraints = constraints.len(),
            indexes = indexes.len(),
            "Table metadata loaded"
        );

        Ok(TableMetadata {
            name: target.table,
            schema,
            columns,
            primary_key,
            constraints,
            indexes,
            statistics,
        })
    }

    fn session(&self, operation: &str) -> OraResult<PooledSession> {
        self.manager.checkout(operation, TranslationScope::Metadata)
    }
}

/// Validated table and owner, ready to bind.
struct Target {
    table: String,
    owner: Option<String>,
}

impl Target {
    fn new(table: &str, schema: Option<&str>) -> OraResult<Self> {
        Ok(Self {
            table: validate_identifier(table)?,
            owner: owner_param(schema)?,
        })
    }

    fn params(&self) -> Params {
        Params::new()
            .bind("owner", self.owner.clone())
            .bind("table_name", self.table.as_str())
    }
}

fn owner_param(schema: Option<&str>) -> OraResult<Option<String>> {
    schema.map(validate_identifier).transpose()
}

fn current_schema(session: &mut PooledSession) -> OraResult<String> {
    let result = session.query_as("get_table_metadata", queries::CURRENT_SCHEMA, &Params::new())?;
    result
        .rows
        .first()
        .and_then(|r| text(r, "CURRENT_SCHEMA"))
        .ok_or_else(|| {
            OraError::metadata(
                "Could not determine the current schema",
                ErrorContext::new("get_table_metadata"),
            )
        })
}

fn fetch_columns(session: &mut PooledSession, target: &Target) -> OraResult<Vec<ColumnMetadata>> {
    let result = session.query_as("get_column_info", queries::COLUMNS, &target.params())?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            let name = text(row, "COLUMN_NAME")?;
            let data_type = text(row, "DATA_TYPE").unwrap_or_default();
            let position = unsigned(row, "COLUMN_ID").unwrap_or(0) as u32;
            Some(
                ColumnMetadata::new(name, data_type, position)
                    .with_nullable(text(row, "NULLABLE").as_deref() != Some("N"))
                    .with_precision(
                        unsigned(row, "DATA_PRECISION").map(|p| p as u32),
                        signed(row, "DATA_SCALE").map(|s| s as i32),
                    )
                    .with_max_length(unsigned(row, "MAX_LENGTH").map(|n| n as u32))
                    .with_default(text(row, "DATA_DEFAULT")),
            )
        })
        .collect())
}

fn fetch_primary_key(session: &mut PooledSession, target: &Target) -> OraResult<Vec<String>> {
    let result = session.query_as(
        "get_primary_key_columns",
        queries::PRIMARY_KEY,
        &target.params(),
    )?;
    Ok(result
        .rows
        .iter()
        .filter_map(|r| text(r, "COLUMN_NAME"))
        .collect())
}

fn fetch_constraints(
    session: &mut PooledSession,
    target: &Target,
) -> OraResult<Vec<ConstraintMetadata>> {
    let result = session.query_as("get_constraints", queries::CONSTRAINTS, &target.params())?;

    // One row per constraint column, already ordered by name then position
    let mut constraints: Vec<ConstraintMetadata> = Vec::new();
    for row in &result.rows {
        let Some(name) = text(row, "CONSTRAINT_NAME") else {
            continue;
        };
        let column = text(row, "COLUMN_NAME");
        if let Some(last) = constraints.last_mut().filter(|c| c.name == name) {
            last.column_names.extend(column);
            continue;
        }
        let Some(kind) = text(row, "CONSTRAINT_TYPE").and_then(|c| ConstraintKind::from_code(&c))
        else {
            continue;
        };
        constraints.push(ConstraintMetadata {
            name,
            kind,
            column_names: column.into_iter().collect(),
            check_condition: text(row, "SEARCH_CONDITION"),
            references: text(row, "R_CONSTRAINT_NAME"),
        });
    }
    Ok(constraints)
}

fn fetch_indexes(session: &mut PooledSession, target: &Target) -> OraResult<Vec<IndexMetadata>> {
    let result = session.query_as("get_indexes", queries::INDEXES, &target.params())?;

    let mut indexes: Vec<IndexMetadata> = Vec::new();
    for row in &result.rows {
        let Some(name) = text(row, "INDEX_NAME") else {
            continue;
        };
        let column = text(row, "COLUMN_NAME");
        if let Some(last) = indexes.last_mut().filter(|i| i.name == name) {
            last.column_names.extend(column);
            continue;
        }
        indexes.push(IndexMetadata {
            name,
            column_names: column.into_iter().collect(),
            unique: text(row, "UNIQUENESS").as_deref() == Some("UNIQUE"),
            status: text(row, "STATUS").unwrap_or_default(),
        });
    }
    Ok(indexes)
}

fn fetch_statistics(session: &mut PooledSession, target: &Target) -> OraResult<TableStatistics> {
    let result = session.query_as("get_table_statistics", queries::STATISTICS, &target.params())?;
    Ok(result
        .rows
        .first()
        .map(|row| TableStatistics {
            num_rows: unsigned(row, "NUM_ROWS"),
            blocks: unsigned(row, "BLOCKS"),
            avg_row_len: unsigned(row, "AVG_ROW_LEN"),
            last_analyzed: text(row, "LAST_ANALYZED")
                .and_then(|s| NaiveDateTime::parse_from_str(&s, ANALYZED_FORMAT).ok()),
        })
        .unwrap_or_default())
}

/// Read a column as text. Numbers are rendered; nulls are absent.
fn text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn unsigned(row: &Row, column: &str) -> Option<u64> {
    match row.get(column)? {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn signed(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Every per-table query binds `:owner` (NULL means the current schema) and
// `:table_name`.

pub mod queries {
    pub const CURRENT_SCHEMA: &str =
        "SELECT SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') AS CURRENT_SCHEMA FROM DUAL";

    pub const SCHEMAS: &str = "SELECT DISTINCT OWNER FROM ALL_TABLES ORDER BY OWNER";

    pub const TABLE_NAMES: &str = r#"
        SELECT TABLE_NAME
        FROM ALL_TABLES
        WHERE OWNER = NVL(:owner, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))
        ORDER BY TABLE_NAME
    "#;

    pub const COLUMNS: &str = r#"
        SELECT
            COLUMN_NAME,
            DATA_TYPE,
            NULLABLE,
            COLUMN_ID,
            DATA_PRECISION,
            DATA_SCALE,
            CASE
                WHEN DATA_TYPE IN ('VARCHAR2', 'NVARCHAR2', 'CHAR', 'NCHAR') THEN CHAR_LENGTH
                WHEN DATA_TYPE = 'RAW' THEN DATA_LENGTH
            END AS MAX_LENGTH,
            DATA_DEFAULT
        FROM ALL_TAB_COLUMNS
        WHERE OWNER = NVL(:owner, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))
            AND TABLE_NAME = :table_name
        ORDER BY COLUMN_ID
    "#;

    pub const PRIMARY_KEY: &str = r#"
        SELECT cc.COLUMN_NAME
        FROM ALL_CONSTRAINTS c
        JOIN ALL_CONS_COLUMNS cc
            ON cc.OWNER = c.OWNER
            AND cc.CONSTRAINT_NAME = c.CONSTRAINT_NAME
        WHERE c.CONSTRAINT_TYPE = 'P'
            AND c.OWNER = NVL(:owner, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))
            AND c.TABLE_NAME = :table_name
        ORDER BY cc.POSITION
    "#;

    pub const CONSTRAINTS: &str = r#"
        SELECT
            c.CONSTRAINT_NAME,
            c.CONSTRAINT_TYPE,
            c.SEARCH_CONDITION_VC AS SEARCH_CONDITION,
            c.R_CONSTRAINT_NAME,
            cc.COLUMN_NAME
        FROM ALL_CONSTRAINTS c
        LEFT JOIN ALL_CONS_COLUMNS cc
            ON cc.OWNER = c.OWNER
            AND cc.CONSTRAINT_NAME = c.CONSTRAINT_NAME
        WHERE c.OWNER = NVL(:owner, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))
            AND c.TABLE_NAME = :table_name
            AND c.CONSTRAINT_TYPE IN ('P', 'R', 'U', 'C')
            AND NOT (
                c.CONSTRAINT_TYPE = 'C'
                AND c.GENERATED = 'GENERATED NAME'
                AND c.SEARCH_CONDITION_VC LIKE '% IS NOT NULL'
            )
        ORDER BY c.CONSTRAINT_NAME, cc.POSITION
    "#;

    pub const INDEXES: &str = r#"
        SELECT
            i.INDEX_NAME,
            i.UNIQUENESS,
            i.STATUS,
            ic.COLUMN_NAME
        FROM ALL_INDEXES i
        JOIN ALL_IND_COLUMNS ic
            ON ic.INDEX_OWNER = i.OWNER
            AND ic.INDEX_NAME = i.INDEX_NAME
        WHERE i.TABLE_OWNER = NVL(:owner, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))
            AND i.TABLE_NAME = :table_name
        ORDER BY i.INDEX_NAME, ic.COLUMN_POSITION
    "#;

    pub const STATISTICS: &str = r#"
        SELECT
            NUM_ROWS,
            BLOCKS,
            AVG_ROW_LEN,
            TO_CHAR(LAST_ANALYZED, 'YYYY-MM-DD HH24:MI:SS') AS LAST_ANALYZED
        FROM ALL_TABLES
        WHERE OWNER = NVL(:owner, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))
            AND TABLE_NAME = :table_name
    "#;

    pub const TABLE_EXISTS: &str = r#"
        SELECT COUNT(*) AS TABLE_COUNT
        FROM ALL_TABLES
        WHERE OWNER = NVL(:owner, SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA'))
            AND TABLE_NAME = :table_name
    "#;
}
