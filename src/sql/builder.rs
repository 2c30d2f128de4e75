//! DML statement builders.
//!
//! Identifiers are validated, upper-cased and double-quoted; values are always
//! bound as named parameters. Bind names equal the canonical column names,
//! except UPDATE's WHERE binds which carry a `where_` prefix so they never
//! collide with the SET binds, and INSERT's RETURNING out-binds which carry a
//! `ret_` prefix so they never collide with the VALUES binds.

use super::BoundStatement;
use super::identifier::{quote, quoted_object_name, validate_identifier, validate_identifiers};
use crate::error::{OraError, OraResult};
use crate::models::Params;

/// Prefix of UPDATE WHERE bind names.
pub const WHERE_BIND_PREFIX: &str = "where_";

/// Prefix of INSERT `RETURNING ... INTO` out-bind names.
pub const RETURNING_BIND_PREFIX: &str = "ret_";

/// Out-bind name for a returned column.
pub fn returning_bind(canonical_column: &str) -> String {
    format!("{RETURNING_BIND_PREFIX}{canonical_column}")
}

/// Build a parameterized SELECT.
///
/// An empty column list selects `*`. WHERE conditions are equality tests
/// joined with `AND`; their values come back in the statement's params,
/// bound under the canonical column names. `limit` adds `ROWNUM <= n`.
///
/// ```text
/// SELECT "ID", "NAME" FROM "HR"."EMPLOYEES" WHERE "STATUS" = :STATUS AND ROWNUM <= 10
/// ```
pub fn build_select<S: AsRef<str>>(
    table: &str,
    columns: &[S],
    where_conditions: &Params,
    schema: Option<&str>,
    limit: Option<u32>,
) -> OraResult<BoundStatement> {
    let object = quoted_object_name(table, schema)?;
    let columns = validate_identifiers(columns)?;
    let select_list = if columns.is_empty() {
        "*".to_string()
    } else {
        columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
    };

    let mut predicates = Vec::with_capacity(where_conditions.len() + 1);
    let mut params = Params::new();
    for (name, value) in where_conditions.iter() {
        let column = validate_identifier(name)?;
        if params.get(&column).is_some() {
            return Err(OraError::validation(format!(
                "Duplicate WHERE condition on column {column}"
            )));
        }
        predicates.push(format!("{} = :{column}", quote(&column)));
        params.insert(column, value.clone());
    }
    if let Some(limit) = limit {
        predicates.push(format!("ROWNUM <= {limit}"));
    }

    let mut sql = format!("SELECT {select_list} FROM {object}");
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    Ok(BoundStatement::new(sql, params))
}

/// Build a parameterized INSERT, optionally with a `RETURNING ... INTO` clause.
///
/// ```text
/// INSERT INTO "USERS" ("NAME") VALUES (:NAME) RETURNING "ID" INTO :ret_ID
/// ```
///
/// Run statements with a RETURNING clause through
/// `ConnectionManager::execute_returning` to read the returned values.
pub fn build_insert<S: AsRef<str>, R: AsRef<str>>(
    table: &str,
    columns: &[S],
    schema: Option<&str>,
    returning_columns: &[R],
) -> OraResult<String> {
    let object = quoted_object_name(table, schema)?;
    let columns = non_empty_columns(columns, "INSERT requires at least one column")?;
    let returning = validate_identifiers(returning_columns)?;

    let mut sql = format!(
        "INSERT INTO {object} ({}) VALUES ({})",
        quoted_list(&columns),
        bind_list(&columns, "")
    );
    if !returning.is_empty() {
        sql.push_str(&format!(
            " RETURNING {} INTO {}",
            quoted_list(&returning),
            bind_list(&returning, RETURNING_BIND_PREFIX)
        ));
    }
    Ok(sql)
}

/// Build a parameterized UPDATE.
///
/// ```text
/// UPDATE "APP"."USERS" SET "NAME" = :NAME WHERE "ID" = :where_ID
/// ```
pub fn build_update<S: AsRef<str>, W: AsRef<str>>(
    table: &str,
    set_columns: &[S],
    where_columns: &[W],
    schema: Option<&str>,
) -> OraResult<String> {
    let object = quoted_object_name(table, schema)?;
    let set_columns = non_empty_columns(set_columns, "UPDATE requires at least one SET column")?;
    let where_columns = non_empty_columns(
        where_columns,
        "UPDATE requires at least one WHERE column; refusing to update every row",
    )?;

    let assignments = set_columns
        .iter()
        .map(|c| format!("{} = :{c}", quote(c)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "UPDATE {object} SET {assignments} WHERE {}",
        equality_predicates(&where_columns, WHERE_BIND_PREFIX)
    ))
}

/// Build a parameterized DELETE.
pub fn build_delete<W: AsRef<str>>(
    table: &str,
    where_columns: &[W],
    schema: Option<&str>,
) -> OraResult<String> {
    let object = quoted_object_name(table, schema)?;
    let where_columns = non_empty_columns(
        where_columns,
        "DELETE requires at least one WHERE column; refusing to delete every row",
    )?;
    Ok(format!(
        "DELETE FROM {object} WHERE {}",
        equality_predicates(&where_columns, "")
    ))
}

/// Build a MERGE (upsert) from a source query.
///
/// The source query is embedded as given and must expose the merge, update
/// and insert columns under their canonical names (see [`dual_source`]).
/// Update columns may not appear in the join condition, because Oracle
/// rejects updates to columns referenced in the ON clause (ORA-38104).
pub fn build_merge<M: AsRef<str>, U: AsRef<str>, I: AsRef<str>>(
    target_table: &str,
    source_query: &str,
    merge_conditions: &[M],
    update_columns: &[U],
    insert_columns: &[I],
    schema: Option<&str>,
) -> OraResult<String> {
    let object = quoted_object_name(target_table, schema)?;
    let source_query = source_query.trim();
    if source_query.is_empty() {
        return Err(OraError::validation("MERGE requires a source query"));
    }
    let keys = non_empty_columns(merge_conditions, "MERGE requires at least one join column")?;
    let update_columns = validate_identifiers(update_columns)?;
    let insert_columns = validate_identifiers(insert_columns)?;
    if update_columns.is_empty() && insert_columns.is_empty() {
        return Err(OraError::validation(
            "MERGE requires update columns, insert columns, or both",
        ));
    }
    if let Some(col) = update_columns.iter().find(|c| keys.contains(c)) {
        return Err(OraError::validation(format!(
            "Column {col} is part of the MERGE join condition and cannot be updated"
        )));
    }

    let on = keys
        .iter()
        .map(|k| format!("tgt.{0} = src.{0}", quote(k)))
        .collect::<Vec<_>>()
        .join(" AND ");
    let mut sql = format!("MERGE INTO {object} tgt USING ({source_query}) src ON ({on})");

    if !update_columns.is_empty() {
        let assignments = update_columns
            .iter()
            .map(|c| format!("tgt.{0} = src.{0}", quote(c)))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" WHEN MATCHED THEN UPDATE SET {assignments}"));
    }
    if !insert_columns.is_empty() {
        let values = insert_columns
            .iter()
            .map(|c| format!("src.{}", quote(c)))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({values})",
            quoted_list(&insert_columns)
        ));
    }
    Ok(sql)
}

/// Single-row MERGE source selecting one bind per column from `DUAL`.
///
/// ```text
/// SELECT :ID AS "ID", :NAME AS "NAME" FROM DUAL
/// ```
pub fn dual_source<S: AsRef<str>>(columns: &[S]) -> OraResult<String> {
    let columns = non_empty_columns(columns, "DUAL source requires at least one column")?;
    let list = columns
        .iter()
        .map(|c| format!(":{c} AS {}", quote(c)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("SELECT {list} FROM DUAL"))
}

fn non_empty_columns<S: AsRef<str>>(columns: &[S], message: &str) -> OraResult<Vec<String>> {
    let columns = validate_identifiers(columns)?;
    if columns.is_empty() {
        return Err(OraError::validation(message));
    }
    for (i, c) in columns.iter().enumerate() {
        if columns[..i].contains(c) {
            return Err(OraError::validation(format!("Duplicate column {c}")));
        }
    }
    Ok(columns)
}

fn quoted_list(columns: &[String]) -> String {
    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

fn bind_list(columns: &[String], prefix: &str) -> String {
    columns
        .iter()
        .map(|c| format!(":{prefix}{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn equality_predicates(columns: &[String], prefix: &str) -> String {
    columns
        .iter()
        .map(|c| format!("{} = :{prefix}{c}", quote(c)))
        .collect::<Vec<_>>()
        .join(" AND ")
}
