//! Schema-related data models.
//!
//! Introspection results (`*Metadata`) are built fresh for every call. The DDL
//! descriptors ([`ColumnSpec`], [`IndexConfig`]) are inputs to the statement
//! builder.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Oracle type name as reported by `ALL_TAB_COLUMNS` (e.g. `VARCHAR2`, `NUMBER`)
    pub data_type: String,
    pub nullable: bool,
    /// 1-based `COLUMN_ID`
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    /// `CHAR_LENGTH` for character types, `DATA_LENGTH` otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Default expression text, trimmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ColumnMetadata {
    /// Create a new column description.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            position,
            precision: None,
            scale: None,
            max_length: None,
            default_value: None,
        }
    }

    /// Set whether the column accepts NULL.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set numeric precision and scale.
    pub fn with_precision(mut self, precision: Option<u32>, scale: Option<i32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn with_max_length(mut self, max_length: Option<u32>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the default expression. Oracle pads `DATA_DEFAULT` with whitespace.
    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default_value = default
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }

    /// Default value as a typed JSON value (numbers for numeric columns,
    /// unquoted text for string literals, expressions verbatim).
    pub fn default_json(&self) -> Option<serde_json::Value> {
        self.default_value
            .as_deref()
            .map(|d| parse_default_value(d, &self.data_type, self.scale))
    }

    /// Full type text, e.g. `VARCHAR2(100)` or `NUMBER(10,2)`.
    pub fn full_type(&self) -> String {
        match (self.data_type.as_str(), self.precision, self.scale, self.max_length) {
            ("NUMBER", Some(p), Some(s), _) if s != 0 => format!("NUMBER({p},{s})"),
            ("NUMBER", Some(p), _, _) => format!("NUMBER({p})"),
            ("VARCHAR2" | "NVARCHAR2" | "CHAR" | "NCHAR" | "RAW", _, _, Some(len)) => {
                format!("{}({len})", self.data_type)
            }
            _ => self.data_type.clone(),
        }
    }
}

/// Kind of table constraint, from `ALL_CONSTRAINTS.CONSTRAINT_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
}

impl ConstraintKind {
    /// Parse the single-letter Oracle constraint type code.
    ///
    /// Returns `None` for kinds outside the taxonomy (view constraints, etc).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "P" => Some(Self::PrimaryKey),
            "R" => Some(Self::ForeignKey),
            "U" => Some(Self::Unique),
            "C" => Some(Self::Check),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrimaryKey => write!(f, "PRIMARY_KEY"),
            Self::ForeignKey => write!(f, "FOREIGN_KEY"),
            Self::Unique => write!(f, "UNIQUE"),
            Self::Check => write!(f, "CHECK"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintMetadata {
    pub name: String,
    pub kind: ConstraintKind,
    /// Ordered by `POSITION`; empty for most CHECK constraints
    pub column_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_condition: Option<String>,
    /// Referenced constraint for foreign keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    /// Ordered by `COLUMN_POSITION`
    pub column_names: Vec<String>,
    pub unique: bool,
    /// `VALID`, `UNUSABLE`, `N/A`
    pub status: String,
}

/// Optimizer statistics. All fields are absent for never-analyzed tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStatistics {
    pub num_rows: Option<u64>,
    pub blocks: Option<u64>,
    pub avg_row_len: Option<u64>,
    pub last_analyzed: Option<NaiveDateTime>,
}

impl TableStatistics {
    pub fn is_analyzed(&self) -> bool {
        self.last_analyzed.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub schema: String,
    /// Ordered by position
    pub columns: Vec<ColumnMetadata>,
    pub primary_key: Vec<String>,
    pub constraints: Vec<ConstraintMetadata>,
    pub indexes: Vec<IndexMetadata>,
    pub statistics: TableStatistics,
}

impl TableMetadata {
    /// Get the fully qualified table name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Look up a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Constraints of a given kind.
    pub fn constraints_of(&self, kind: ConstraintKind) -> impl Iterator<Item = &ConstraintMetadata> {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }
}

/// Column descriptor consumed by `create_table_ddl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Oracle type text; a missing type is rejected when DDL is generated
    #[serde(default, alias = "type")]
    pub data_type: Option<String>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Rendered as a literal: numbers, strings (escaped), null, or a known keyword
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
            nullable: true,
            default: None,
        }
    }

    /// Mark the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Index definition consumed by `build_create_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tablespace: Option<String>,
    /// Degree of parallelism for the index build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<u32>,
}

impl IndexConfig {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            schema: None,
            unique: false,
            tablespace: None,
            parallel: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_tablespace(mut self, tablespace: impl Into<String>) -> Self {
        self.tablespace = Some(tablespace.into());
        self
    }

    pub fn with_parallel(mut self, degree: u32) -> Self {
        self.parallel = Some(degree);
        self
    }
}

/// Parse an Oracle default expression into the appropriate JSON type.
///
/// - `NUMBER` with zero (or absent) scale, `INTEGER` → JSON Number (integer)
/// - Other numeric types (`NUMBER(p,s)`, `FLOAT`, `BINARY_DOUBLE`) → JSON Number
/// - Quoted literals (`'ACTIVE'`) → JSON String without quotes, `''` unescaped
/// - `NULL` → JSON Null
/// - Expressions (`SYSDATE`, `SYS_GUID()`, sequences) → JSON String verbatim
pub fn parse_default_value(
    default_str: &str,
    data_type: &str,
    scale: Option<i32>,
) -> serde_json::Value {
    let text = default_str.trim();
    let dt_upper = data_type.to_uppercase();

    if text.eq_ignore_ascii_case("NULL") {
        return serde_json::Value::Null;
    }

    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return serde_json::Value::String(text[1..text.len() - 1].replace("''", "'"));
    }

    let integral = dt_upper == "INTEGER" || (dt_upper == "NUMBER" && scale.unwrap_or(0) == 0);
    if integral {
        if let Ok(n) = text.parse::<i64>() {
            return serde_json::Value::Number(n.into());
        }
    }

    if dt_upper == "NUMBER" || dt_upper == "FLOAT" || dt_upper.starts_with("BINARY_") {
        if let Some(num) = text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return serde_json::Value::Number(num);
        }
    }

    serde_json::Value::String(text.to_string())
}
