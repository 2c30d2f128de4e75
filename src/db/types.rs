//! Oracle type mappings for result decoding.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies a column's Oracle type into a logical category
//! 2. The driver fetches the value in the representation the category asks
//!    for and the helpers below turn it into JSON
//!
//! Keeping the classification here (and free of driver types) lets it be
//! tested without a database.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for Oracle column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// `NUMBER(p)`, `NUMBER(p,0)`, `INTEGER`
    Integer,
    /// `BINARY_FLOAT`, `BINARY_DOUBLE`, `FLOAT(p)`
    Float,
    /// Unconstrained `NUMBER` or `NUMBER(p,s)` with `s != 0`
    Decimal,
    Boolean,
    /// `RAW`, `LONG RAW`, `BLOB`
    Binary,
    Json,
    /// Character, LOB text, date/time and everything else
    Text,
}

/// Classify an Oracle type name (as rendered by the driver) into a category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let upper = type_name.trim().to_uppercase();

    // NUMBER first: its scale decides between integer and decimal
    if let Some(args) = upper.strip_prefix("NUMBER") {
        return match number_scale(args) {
            Some(0) => TypeCategory::Integer,
            _ => TypeCategory::Decimal,
        };
    }

    if matches!(upper.as_str(), "INTEGER" | "INT" | "SMALLINT" | "INT64" | "UINT64") {
        return TypeCategory::Integer;
    }

    if upper.starts_with("BINARY_FLOAT")
        || upper.starts_with("BINARY_DOUBLE")
        || upper.starts_with("FLOAT")
    {
        return TypeCategory::Float;
    }

    if upper == "BOOLEAN" {
        return TypeCategory::Boolean;
    }

    if upper.starts_with("RAW") || upper.starts_with("LONG RAW") || upper == "BLOB" {
        return TypeCategory::Binary;
    }

    if upper == "JSON" {
        return TypeCategory::Json;
    }

    TypeCategory::Text
}

/// Scale of a `NUMBER` argument list: `""` → `None`, `"(10)"` → `Some(0)`,
/// `"(10,2)"` → `Some(2)`.
fn number_scale(args: &str) -> Option<i32> {
    let inner = args.trim().strip_prefix('(')?.strip_suffix(')')?;
    match inner.split_once(',') {
        Some((_, scale)) => scale.trim().parse().ok(),
        None => Some(0),
    }
}

// =============================================================================
// Value Decoding
// =============================================================================

/// Oracle renders fractions below one without a leading zero (`.5`, `-.5`).
fn normalize_number_text(text: &str) -> String {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("-.") {
        format!("-0.{rest}")
    } else if let Some(rest) = text.strip_prefix('.') {
        format!("0.{rest}")
    } else {
        text.to_string()
    }
}

/// Decode numeric text fetched from an integer or decimal column.
///
/// Whole numbers within `i64` become JSON integers (so `COUNT(*)` reads
/// naturally); anything else keeps its exact text to preserve precision.
pub fn decode_number_text(text: &str) -> JsonValue {
    let text = normalize_number_text(text);
    match text.parse::<i64>() {
        Ok(n) => JsonValue::Number(n.into()),
        Err(_) => JsonValue::String(text),
    }
}

/// Decode a binary float. NaN and infinities have no JSON form and keep their text.
pub fn decode_float(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(value.to_string()))
}

/// Decode JSON column text, falling back to the raw string.
pub fn decode_json_text(text: &str) -> JsonValue {
    serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}

/// Encode binary data as base64.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}
