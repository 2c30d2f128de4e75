//! Identifier validation shared by every statement builder.
//!
//! A valid identifier is non-empty after trimming, at most
//! [`MAX_IDENTIFIER_LEN`] characters, matches `[A-Za-z][A-Za-z0-9_]*` and is
//! not an Oracle reserved word. The canonical form is upper-case, which is how
//! Oracle stores unquoted names in the data dictionary.

use crate::error::{OraError, OraResult};
use regex::Regex;
use std::sync::OnceLock;

/// Longest identifier accepted (Oracle 12.2+ limit).
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Oracle reserved words (`V$RESERVED_WORDS` with `RESERVED = 'Y'`), sorted.
pub const RESERVED_WORDS: &[&str] = &[
    "ACCESS", "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUDIT", "BETWEEN", "BY", "CHAR",
    "CHECK", "CLUSTER", "COLUMN", "COMMENT", "COMPRESS", "CONNECT", "CREATE", "CURRENT", "DATE",
    "DECIMAL", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "EXCLUSIVE", "EXISTS",
    "FILE", "FLOAT", "FOR", "FROM", "GRANT", "GROUP", "HAVING", "IDENTIFIED", "IMMEDIATE", "IN",
    "INCREMENT", "INDEX", "INITIAL", "INSERT", "INTEGER", "INTERSECT", "INTO", "IS", "LEVEL",
    "LIKE", "LOCK", "LONG", "MAXEXTENTS", "MINUS", "MLSLABEL", "MODE", "MODIFY", "NOAUDIT",
    "NOCOMPRESS", "NOT", "NOWAIT", "NULL", "NUMBER", "OF", "OFFLINE", "ON", "ONLINE", "OPTION",
    "OR", "ORDER", "PCTFREE", "PRIOR", "PUBLIC", "RAW", "RENAME", "RESOURCE", "REVOKE", "ROW",
    "ROWID", "ROWNUM", "ROWS", "SELECT", "SESSION", "SET", "SHARE", "SIZE", "SMALLINT", "START",
    "SUCCESSFUL", "SYNONYM", "SYSDATE", "TABLE", "THEN", "TO", "TRIGGER", "UID", "UNION",
    "UNIQUE", "UPDATE", "USER", "VALIDATE", "VALUES", "VARCHAR", "VARCHAR2", "VIEW", "WHENEVER",
    "WHERE", "WITH",
];

fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("failed to compile identifier regex")
    })
}

/// Check whether a word is reserved (case-insensitive).
pub fn is_reserved_word(word: &str) -> bool {
    let upper = word.trim().to_ascii_uppercase();
    RESERVED_WORDS.binary_search(&upper.as_str()).is_ok()
}

/// Validate an identifier and return its canonical upper-case form.
pub fn validate_identifier(name: &str) -> OraResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(OraError::validation("Identifier cannot be empty"));
    }
    if trimmed.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(OraError::validation(format!(
            "Identifier exceeds {MAX_IDENTIFIER_LEN} characters: '{}...'",
            trimmed.chars().take(30).collect::<String>()
        )));
    }
    if !identifier_pattern().is_match(trimmed) {
        return Err(OraError::validation(format!(
            "Invalid identifier '{trimmed}': must start with a letter and contain only letters, digits and underscores"
        )));
    }
    let canonical = trimmed.to_ascii_uppercase();
    if RESERVED_WORDS.binary_search(&canonical.as_str()).is_ok() {
        return Err(OraError::validation(format!(
            "Invalid identifier '{trimmed}': {canonical} is an Oracle reserved word"
        )));
    }
    Ok(canonical)
}

/// Validate every identifier in a list, preserving order.
pub fn validate_identifiers<S: AsRef<str>>(names: &[S]) -> OraResult<Vec<String>> {
    names
        .iter()
        .map(|n| validate_identifier(n.as_ref()))
        .collect()
}

/// Double-quote a canonical identifier for DML.
pub fn quote(canonical: &str) -> String {
    format!("\"{canonical}\"")
}

/// `"SCHEMA"."TABLE"` (or `"TABLE"`) for DML.
pub fn quoted_object_name(table: &str, schema: Option<&str>) -> OraResult<String> {
    let table = validate_identifier(table)?;
    match schema {
        Some(schema) => Ok(format!(
            "{}.{}",
            quote(&validate_identifier(schema)?),
            quote(&table)
        )),
        None => Ok(quote(&table)),
    }
}

/// `SCHEMA.NAME` (or `NAME`) for DDL. Bare names are safe because they passed validation.
pub fn bare_object_name(name: &str, schema: Option<&str>) -> OraResult<String> {
    let name = validate_identifier(name)?;
    match schema {
        Some(schema) => Ok(format!("{}.{}", validate_identifier(schema)?, name)),
        None => Ok(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words_sorted() {
        let mut sorted = RESERVED_WORDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, RESERVED_WORDS);
    }

    #[test]
    fn test_validate_identifier_canonical_form() {
        assert_eq!(validate_identifier("employees").unwrap(), "EMPLOYEES");
        assert_eq!(validate_identifier("  Hr_Data2 ").unwrap(), "HR_DATA2");
        assert_eq!(validate_identifier("x").unwrap(), "X");
    }

    #[test]
    fn test_validate_identifier_rejects_bad_shapes() {
        for bad in ["", "   ", "1ABC", "_X", "A-B", "A B", "A;DROP", "\"X\"", "A.B", "ÄBC"] {
            let err = validate_identifier(bad).unwrap_err();
            assert!(matches!(err, OraError::Validation { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        let ok = "A".repeat(MAX_IDENTIFIER_LEN);
        assert!(validate_identifier(&ok).is_ok());
        let too_long = "A".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier(&too_long).is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_reserved() {
        assert!(validate_identifier("select").is_err());
        assert!(validate_identifier("Table").is_err());
        assert!(is_reserved_word("rownum"));
        assert!(!is_reserved_word("EMPLOYEES"));
    }

    #[test]
    fn test_object_names() {
        assert_eq!(
            quoted_object_name("employees", Some("hr")).unwrap(),
            "\"HR\".\"EMPLOYEES\""
        );
        assert_eq!(quoted_object_name("t", None).unwrap(), "\"T\"");
        assert_eq!(bare_object_name("t", Some("app")).unwrap(), "APP.T");
        assert!(bare_object_name("t", Some("bad schema")).is_err());
    }
}
