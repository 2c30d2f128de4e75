//! Singer (JSON Schema) to Oracle type mapping.
//!
//! Pure functions: no I/O, no state. Unknown descriptors fall back to
//! [`FALLBACK_TYPE`] so a single unrecognized field never aborts the mapping of
//! a whole stream schema.

use crate::models::ColumnSpec;
use serde_json::Value as JsonValue;

/// Longest `VARCHAR2` emitted (standard `MAX_STRING_SIZE`).
pub const MAX_VARCHAR2_LENGTH: u64 = 4000;

/// Type used for anything the mapper does not recognize.
pub const FALLBACK_TYPE: &str = "VARCHAR2(4000)";

/// Prefix of Singer's own bookkeeping properties; such properties are skipped.
pub const SDC_PREFIX: &str = "_sdc_";

/// Bookkeeping columns appended to every mapped stream.
pub const SDC_COLUMNS: [(&str, &str); 4] = [
    ("SDC_EXTRACTED_AT", "TIMESTAMP"),
    ("SDC_ENTITY", "VARCHAR2(100)"),
    ("SDC_SEQUENCE", "NUMBER"),
    ("SDC_BATCHED_AT", "TIMESTAMP"),
];

/// Convert a Singer type descriptor to an Oracle type.
///
/// `descriptor` is a type name (`"string"`) or a union (`["string", "null"]`).
/// `"null"` is dropped from unions; exactly one remaining type is mapped and
/// anything else falls back.
///
/// | Singer                     | Oracle          |
/// |----------------------------|-----------------|
/// | string                     | VARCHAR2(n)     |
/// | string + `date-time`       | TIMESTAMP       |
/// | string + `date`            | DATE            |
/// | integer                    | NUMBER(38)      |
/// | number                     | NUMBER          |
/// | boolean                    | NUMBER(1)       |
/// | array, object              | CLOB            |
///
/// `n` is `max_length` capped at 4000, or 4000 when absent.
pub fn convert_singer_type(
    descriptor: &JsonValue,
    format: Option<&str>,
    max_length: Option<u64>,
) -> String {
    let Some(type_name) = resolve_type_name(descriptor) else {
        return FALLBACK_TYPE.to_string();
    };

    match type_name.to_ascii_lowercase().as_str() {
        "string" => match format {
            Some("date-time") => "TIMESTAMP".to_string(),
            Some("date") => "DATE".to_string(),
            _ => {
                let length = max_length
                    .filter(|n| *n > 0)
                    .map_or(MAX_VARCHAR2_LENGTH, |n| n.min(MAX_VARCHAR2_LENGTH));
                format!("VARCHAR2({length})")
            }
        },
        "integer" => "NUMBER(38)".to_string(),
        "number" => "NUMBER".to_string(),
        "boolean" => "NUMBER(1)".to_string(),
        "array" | "object" => "CLOB".to_string(),
        _ => FALLBACK_TYPE.to_string(),
    }
}

/// The single non-null type name of a descriptor, if there is one.
fn resolve_type_name(descriptor: &JsonValue) -> Option<&str> {
    match descriptor {
        JsonValue::String(s) => Some(s.as_str()),
        JsonValue::Array(items) => {
            let mut non_null = items
                .iter()
                .filter_map(JsonValue::as_str)
                .filter(|t| !t.eq_ignore_ascii_case("null"));
            match (non_null.next(), non_null.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Map one property schema, resolving `anyOf` by its first non-null branch.
pub fn convert_property(property: &JsonValue) -> String {
    let branch = property
        .get("anyOf")
        .and_then(JsonValue::as_array)
        .and_then(|branches| branches.iter().find(|b| !is_null_branch(b)))
        .unwrap_or(property);

    let descriptor = branch.get("type").unwrap_or(&JsonValue::Null);
    let format = branch.get("format").and_then(JsonValue::as_str);
    let max_length = branch.get("maxLength").and_then(JsonValue::as_u64);
    convert_singer_type(descriptor, format, max_length)
}

fn is_null_branch(branch: &JsonValue) -> bool {
    match branch.get("type") {
        Some(JsonValue::String(t)) => t.eq_ignore_ascii_case("null"),
        Some(JsonValue::Array(items)) => items
            .iter()
            .all(|t| t.as_str().is_some_and(|t| t.eq_ignore_ascii_case("null"))),
        _ => false,
    }
}

/// Map a Singer stream schema to nullable Oracle columns.
///
/// Properties are walked in document order and their names upper-cased;
/// names starting with `_sdc_` are skipped. The [`SDC_COLUMNS`] are appended.
/// The result feeds `create_table_ddl` directly.
pub fn map_singer_schema(schema: &JsonValue) -> Vec<ColumnSpec> {
    let mut columns: Vec<ColumnSpec> = schema
        .get("properties")
        .and_then(JsonValue::as_object)
        .map(|properties| {
            properties
                .iter()
                .filter(|(name, _)| !is_sdc_property(name))
                .map(|(name, property)| {
                    ColumnSpec::new(name.to_ascii_uppercase(), convert_property(property))
                })
                .collect()
        })
        .unwrap_or_default();

    columns.extend(
        SDC_COLUMNS
            .iter()
            .map(|(name, data_type)| ColumnSpec::new(*name, *data_type)),
    );
    columns
}

fn is_sdc_property(name: &str) -> bool {
    name.get(..SDC_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SDC_PREFIX))
}
