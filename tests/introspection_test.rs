//! Integration tests for catalog introspection.

mod common;

use common::{Call, MockDriver, connected, manager_with, rowset};
use oracle_access::SchemaIntrospector;
use oracle_access::db::DriverError;
use oracle_access::db::schema::queries;
use oracle_access::error::ErrorKind;
use oracle_access::models::{ConstraintKind, QueryParam};
use serde_json::json;

fn employees_catalog(driver: &MockDriver) {
    driver.respond(
        queries::COLUMNS,
        rowset(
            &[
                "COLUMN_NAME",
                "DATA_TYPE",
                "NULLABLE",
                "COLUMN_ID",
                "DATA_PRECISION",
                "DATA_SCALE",
                "MAX_LENGTH",
                "DATA_DEFAULT",
            ],
            vec![
                vec![
                    json!("ID"),
                    json!("NUMBER"),
                    json!("N"),
                    json!(1),
                    json!(10),
                    json!(0),
                    json!(null),
                    json!(null),
                ],
                vec![
                    json!("NAME"),
                    json!("VARCHAR2"),
                    json!("Y"),
                    json!(2),
                    json!(null),
                    json!(null),
                    json!(100),
                    json!(null),
                ],
                vec![
                    json!("STATUS"),
                    json!("VARCHAR2"),
                    json!("N"),
                    json!(3),
                    json!(null),
                    json!(null),
                    json!(10),
                    json!("'ACTIVE' "),
                ],
                vec![
                    json!("DEPT_ID"),
                    json!("NUMBER"),
                    json!("Y"),
                    json!(4),
                    json!(null),
                    json!(null),
                    json!(null),
                    json!(null),
                ],
            ],
        ),
    );
    driver.respond(
        queries::PRIMARY_KEY,
        rowset(&["COLUMN_NAME"], vec![vec![json!("ID")]]),
    );
    driver.respond(
        queries::CONSTRAINTS,
        rowset(
            &[
                "CONSTRAINT_NAME",
                "CONSTRAINT_TYPE",
                "SEARCH_CONDITION",
                "R_CONSTRAINT_NAME",
                "COLUMN_NAME",
            ],
            vec![
                vec![json!("EMP_DEPT_FK"), json!("R"), json!(null), json!("DEPT_PK"), json!("DEPT_ID")],
                vec![json!("EMP_NAME_UQ"), json!("U"), json!(null), json!(null), json!("NAME")],
                vec![json!("EMP_NAME_UQ"), json!("U"), json!(null), json!(null), json!("DEPT_ID")],
                vec![json!("EMP_PK"), json!("P"), json!(null), json!(null), json!("ID")],
                vec![
                    json!("EMP_STATUS_CK"),
                    json!("C"),
                    json!("STATUS IN ('ACTIVE', 'INACTIVE')"),
                    json!(null),
                    json!("STATUS"),
                ],
            ],
        ),
    );
    driver.respond(
        queries::INDEXES,
        rowset(
            &["INDEX_NAME", "UNIQUENESS", "STATUS", "COLUMN_NAME"],
            vec![
                vec![json!("EMP_NAME_UQ"), json!("UNIQUE"), json!("VALID"), json!("NAME")],
                vec![json!("EMP_NAME_UQ"), json!("UNIQUE"), json!("VALID"), json!("DEPT_ID")],
                vec![json!("EMP_PK"), json!("UNIQUE"), json!("VALID"), json!("ID")],
                vec![json!("EMP_STATUS_IX"), json!("NONUNIQUE"), json!("UNUSABLE"), json!("STATUS")],
            ],
        ),
    );
    driver.respond(
        queries::STATISTICS,
        rowset(
            &["NUM_ROWS", "BLOCKS", "AVG_ROW_LEN", "LAST_ANALYZED"],
            vec![vec![json!(107), json!(5), json!(69), json!("2024-03-01 22:00:14")]],
        ),
    );
    driver.respond(
        queries::CURRENT_SCHEMA,
        rowset(&["CURRENT_SCHEMA"], vec![vec![json!("HR")]]),
    );
}

// =========================================================================
// Listing
// =========================================================================

#[test]
fn test_get_schemas() {
    let driver = MockDriver::new();
    driver.respond(
        queries::SCHEMAS,
        rowset(&["OWNER"], vec![vec![json!("HR")], vec![json!("SALES")]]),
    );
    let manager = connected(&driver);

    let schemas = SchemaIntrospector::new(&manager).get_schemas().unwrap();
    assert_eq!(schemas, vec!["HR", "SALES"]);
}

#[test]
fn test_empty_schema_is_ok_and_empty() {
    let driver = MockDriver::new();
    let manager = connected(&driver);

    let tables = SchemaIntrospector::new(&manager)
        .get_table_names(Some("EMPTY_SCHEMA"))
        .unwrap();

    assert!(tables.is_empty());
    assert_eq!(driver.open_sessions(), 0);
}

#[test]
fn test_get_table_names_binds_owner() {
    let driver = MockDriver::new();
    driver.respond(
        queries::TABLE_NAMES,
        rowset(
            &["TABLE_NAME"],
            vec![vec![json!("DEPARTMENTS")], vec![json!("EMPLOYEES")]],
        ),
    );
    let manager = connected(&driver);
    let introspector = SchemaIntrospector::new(&manager);

    let tables = introspector.get_table_names(Some("hr")).unwrap();
    assert_eq!(tables, vec!["DEPARTMENTS", "EMPLOYEES"]);
    let params = driver.query_params(queries::TABLE_NAMES).unwrap();
    assert_eq!(params.get("owner"), Some(&QueryParam::String("HR".into())));

    introspector.get_table_names(None).unwrap();
    let params = driver.query_params(queries::TABLE_NAMES).unwrap();
    assert_eq!(params.get("owner"), Some(&QueryParam::Null));
}

#[test]
fn test_invalid_names_fail_before_io() {
    let driver = MockDriver::new();
    let manager = connected(&driver);
    let introspector = SchemaIntrospector::new(&manager);

    let errors = [
        introspector.get_table_names(Some("HR; DROP USER x")).unwrap_err(),
        introspector.get_column_info("EMP'--", None).unwrap_err(),
        introspector.get_column_info("", None).unwrap_err(),
        introspector.get_table_metadata("SELECT", None).unwrap_err(),
        introspector.table_exists("T", Some("1HR")).unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
    }
    assert!(driver.calls().is_empty());
}

// =========================================================================
// Columns and keys
// =========================================================================

#[test]
fn test_get_column_info() {
    let driver = MockDriver::new();
    employees_catalog(&driver);
    let manager = connected(&driver);

    let columns = SchemaIntrospector::new(&manager)
        .get_column_info("employees", Some("hr"))
        .unwrap();

    assert_eq!(columns.len(), 4);
    assert_eq!(columns[0].name, "ID");
    assert!(!columns[0].nullable);
    assert_eq!(columns[0].precision, Some(10));
    assert_eq!(columns[0].scale, Some(0));
    assert_eq!(columns[1].max_length, Some(100));
    assert!(columns[1].nullable);
    assert_eq!(columns[2].default_value.as_deref(), Some("'ACTIVE'"));
    assert_eq!(
        columns.iter().map(|c| c.position).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );

    let params = driver.query_params(queries::COLUMNS).unwrap();
    assert_eq!(
        params.get("table_name"),
        Some(&QueryParam::String("EMPLOYEES".into()))
    );
}

#[test]
fn test_missing_table_has_no_columns() {
    let driver = MockDriver::new();
    let manager = connected(&driver);
    let columns = SchemaIntrospector::new(&manager)
        .get_column_info("NO_SUCH_TABLE", None)
        .unwrap();
    assert!(columns.is_empty());
}

#[test]
fn test_get_primary_key_columns() {
    let driver = MockDriver::new();
    driver.respond(
        queries::PRIMARY_KEY,
        rowset(
            &["COLUMN_NAME"],
            vec![vec![json!("ORDER_ID")], vec![json!("LINE_NO")]],
        ),
    );
    let manager = connected(&driver);
    let pk = SchemaIntrospector::new(&manager)
        .get_primary_key_columns("ORDER_LINES", None)
        .unwrap();
    assert_eq!(pk, vec!["ORDER_ID", "LINE_NO"]);
}

#[test]
fn test_constraints_are_grouped() {
    let driver = MockDriver::new();
    employees_catalog(&driver);
    let manager = connected(&driver);

    let constraints = SchemaIntrospector::new(&manager)
        .get_constraints("EMPLOYEES", None)
        .unwrap();

    assert_eq!(constraints.len(), 4);
    let fk = &constraints[0];
    assert_eq!(fk.kind, ConstraintKind::ForeignKey);
    assert_eq!(fk.references.as_deref(), Some("DEPT_PK"));
    assert_eq!(constraints[1].column_names, vec!["NAME", "DEPT_ID"]);
    assert_eq!(constraints[2].kind, ConstraintKind::PrimaryKey);
    assert_eq!(
        constraints[3].check_condition.as_deref(),
        Some("STATUS IN ('ACTIVE', 'INACTIVE')")
    );
}

#[test]
fn test_indexes_are_grouped() {
    let driver = MockDriver::new();
    employees_catalog(&driver);
    let manager = connected(&driver);

    let indexes = SchemaIntrospector::new(&manager)
        .get_indexes("EMPLOYEES", None)
        .unwrap();

    assert_eq!(indexes.len(), 3);
    assert_eq!(indexes[0].column_names, vec!["NAME", "DEPT_ID"]);
    assert!(indexes[0].unique);
    assert!(!indexes[2].unique);
    assert_eq!(indexes[2].status, "UNUSABLE");
}

#[test]
fn test_statistics() {
    let driver = MockDriver::new();
    employees_catalog(&driver);
    let manager = connected(&driver);
    let introspector = SchemaIntrospector::new(&manager);

    let stats = introspector.get_table_statistics("EMPLOYEES", None).unwrap();
    assert_eq!(stats.num_rows, Some(107));
    assert_eq!(stats.blocks, Some(5));
    assert_eq!(stats.avg_row_len, Some(69));
    assert!(stats.is_analyzed());
    assert_eq!(
        stats.last_analyzed.unwrap().format("%Y-%m-%d").to_string(),
        "2024-03-01"
    );
}

#[test]
fn test_statistics_of_unanalyzed_table() {
    let driver = MockDriver::new();
    driver.respond(
        queries::STATISTICS,
        rowset(
            &["NUM_ROWS", "BLOCKS", "AVG_ROW_LEN", "LAST_ANALYZED"],
            vec![vec![json!(null), json!(null), json!(null), json!(null)]],
        ),
    );
    let manager = connected(&driver);
    let stats = SchemaIntrospector::new(&manager)
        .get_table_statistics("STAGING", None)
        .unwrap();
    assert!(!stats.is_analyzed());
    assert!(stats.num_rows.is_none());
}

#[test]
fn test_table_exists() {
    let driver = MockDriver::new();
    driver.respond(
        queries::TABLE_EXISTS,
        rowset(&["TABLE_COUNT"], vec![vec![json!(1)]]),
    );
    let manager = connected(&driver);
    assert!(SchemaIntrospector::new(&manager).table_exists("EMPLOYEES", None).unwrap());

    let driver = MockDriver::new();
    driver.respond(
        queries::TABLE_EXISTS,
        rowset(&["TABLE_COUNT"], vec![vec![json!(0)]]),
    );
    let manager = connected(&driver);
    assert!(!SchemaIntrospector::new(&manager).table_exists("GHOST", None).unwrap());
}

// =========================================================================
// Full metadata
// =========================================================================

#[test]
fn test_get_table_metadata_uses_one_session() {
    let driver = MockDriver::new();
    employees_catalog(&driver);
    let manager = connected(&driver);

    let metadata = SchemaIntrospector::new(&manager)
        .get_table_metadata("EMPLOYEES", None)
        .unwrap();

    assert_eq!(metadata.name, "EMPLOYEES");
    assert_eq!(metadata.schema, "HR");
    assert_eq!(metadata.qualified_name(), "HR.EMPLOYEES");
    assert_eq!(metadata.columns.len(), 4);
    assert_eq!(metadata.primary_key, vec!["ID"]);
    assert_eq!(metadata.constraints_of(ConstraintKind::Unique).count(), 1);
    assert_eq!(metadata.indexes.len(), 3);
    assert_eq!(metadata.statistics.num_rows, Some(107));
    assert!(metadata.column("status").is_some());

    assert_eq!(driver.count(&Call::Acquire), 1);
    assert_eq!(driver.open_sessions(), 0);
    assert_eq!(driver.count(&Call::Commit), 0);
}

#[test]
fn test_get_table_metadata_with_explicit_schema() {
    let driver = MockDriver::new();
    employees_catalog(&driver);
    let manager = connected(&driver);

    let metadata = SchemaIntrospector::new(&manager)
        .get_table_metadata("EMPLOYEES", Some("hr"))
        .unwrap();

    assert_eq!(metadata.schema, "HR");
    assert!(!driver.queries().iter().any(|q| q == queries::CURRENT_SCHEMA));
}

#[test]
fn test_get_table_metadata_without_columns_fails() {
    let driver = MockDriver::new();
    let manager = connected(&driver);

    let err = SchemaIntrospector::new(&manager)
        .get_table_metadata("GHOST", None)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Metadata);
    assert_eq!(driver.open_sessions(), 0);
}

#[test]
fn test_get_table_metadata_fails_when_any_part_fails() {
    let driver = MockDriver::new();
    employees_catalog(&driver);
    driver.fail_query(
        queries::INDEXES,
        DriverError::database("ORA-01031: insufficient privileges"),
    );
    let manager = connected(&driver);

    let err = SchemaIntrospector::new(&manager)
        .get_table_metadata("EMPLOYEES", None)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Metadata);
    assert_eq!(err.ora_code(), Some("ORA-01031"));
}

// =========================================================================
// Failure classification
// =========================================================================

#[test]
fn test_catalog_failure_is_metadata_error() {
    let driver = MockDriver::new();
    driver.fail_query(
        queries::TABLE_NAMES,
        DriverError::database("ORA-00942: table or view does not exist"),
    );
    let manager = connected(&driver);

    let err = SchemaIntrospector::new(&manager)
        .get_table_names(None)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Metadata);
    assert_eq!(err.context().unwrap().operation, "get_table_names");
}

#[test]
fn test_catalog_connection_loss_keeps_kind() {
    let driver = MockDriver::new();
    driver.fail_query(
        queries::SCHEMAS,
        DriverError::database("ORA-03114: not connected to ORACLE"),
    );
    let manager = connected(&driver);
    let err = SchemaIntrospector::new(&manager).get_schemas().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn test_catalog_timeout_keeps_kind() {
    let driver = MockDriver::new();
    driver.fail_query(
        queries::COLUMNS,
        DriverError::timeout("DPI-1067: call timeout of 30000 ms exceeded"),
    );
    let manager = connected(&driver);
    let err = SchemaIntrospector::new(&manager)
        .get_column_info("EMPLOYEES", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[test]
fn test_introspection_requires_connection() {
    let driver = MockDriver::new();
    let manager = manager_with(&driver);
    let err = SchemaIntrospector::new(&manager).get_schemas().unwrap_err();
    assert!(err.is_not_connected());
    assert!(driver.calls().is_empty());
}
