//! Integration tests for SQL generation, including running generated
//! statements through the connection manager.

mod common;

use common::{MockDriver, connected};
use oracle_access::error::ErrorKind;
use oracle_access::models::{ColumnSpec, IndexConfig, Params, QueryParam};
use oracle_access::sql::{
    RETURNING_BIND_PREFIX, build_create_index, build_delete, build_insert, build_merge,
    build_select, build_update, create_table_ddl, create_table_ddl_in, drop_table_ddl,
    drop_table_purge_ddl, dual_source, returning_bind,
};
use serde_json::json;

const NONE: &[&str] = &[];

// =========================================================================
// SELECT
// =========================================================================

#[test]
fn test_select_binds_where_values() {
    let conditions = Params::new().bind("STATUS", "ACTIVE");
    let stmt = build_select("EMPLOYEES", &["ID", "NAME"], &conditions, Some("HR"), None).unwrap();

    assert!(stmt.sql.contains(r#""HR"."EMPLOYEES""#));
    assert!(stmt.sql.contains(r#""ID""#));
    assert!(stmt.sql.contains(r#""NAME""#));
    assert!(stmt.sql.contains(":STATUS"));
    assert!(!stmt.sql.contains("'ACTIVE'"));
    assert!(!stmt.sql.contains("ACTIVE'"));
    assert_eq!(
        stmt.params.get("STATUS"),
        Some(&QueryParam::String("ACTIVE".into()))
    );
}

#[test]
fn test_select_shapes() {
    let stmt = build_select("t", NONE, &Params::new(), None, None).unwrap();
    assert_eq!(stmt.sql, r#"SELECT * FROM "T""#);
    assert!(stmt.params.is_empty());

    let stmt = build_select(
        "orders",
        &["id"],
        &Params::new().bind("customer_id", 7).bind("state", "OPEN"),
        Some("sales"),
        Some(25),
    )
    .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT "ID" FROM "SALES"."ORDERS" WHERE "CUSTOMER_ID" = :CUSTOMER_ID AND "STATE" = :STATE AND ROWNUM <= 25"#
    );
    assert_eq!(stmt.params.names().collect::<Vec<_>>(), vec!["CUSTOMER_ID", "STATE"]);
}

#[test]
fn test_select_rejects_injection_in_names() {
    let conditions = Params::new().bind("ID = 1 OR 1", 1);
    let err = build_select("T", NONE, &conditions, None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(build_select("T\"; DROP TABLE X; --", NONE, &Params::new(), None, None).is_err());
    assert!(build_select("T", &["*"], &Params::new(), None, None).is_err());
}

#[test]
fn test_hostile_values_stay_in_params() {
    let hostile = "x' OR '1'='1";
    let stmt = build_select(
        "USERS",
        NONE,
        &Params::new().bind("NAME", hostile),
        None,
        None,
    )
    .unwrap();
    assert!(!stmt.sql.contains(hostile));
    assert_eq!(stmt.params.get("NAME"), Some(&QueryParam::String(hostile.into())));
}

// =========================================================================
// INSERT / UPDATE / DELETE / MERGE
// =========================================================================

#[test]
fn test_insert_update_delete_shapes() {
    assert_eq!(
        build_insert("users", &["id", "name"], Some("app"), NONE).unwrap(),
        r#"INSERT INTO "APP"."USERS" ("ID", "NAME") VALUES (:ID, :NAME)"#
    );
    assert_eq!(
        build_insert("users", &["name"], None, &["id"]).unwrap(),
        r#"INSERT INTO "USERS" ("NAME") VALUES (:NAME) RETURNING "ID" INTO :ret_ID"#
    );
    assert_eq!(
        build_update("users", &["name", "email"], &["id"], Some("app")).unwrap(),
        r#"UPDATE "APP"."USERS" SET "NAME" = :NAME, "EMAIL" = :EMAIL WHERE "ID" = :where_ID"#
    );
    assert_eq!(
        build_delete("users", &["id", "tenant"], None).unwrap(),
        r#"DELETE FROM "USERS" WHERE "ID" = :ID AND "TENANT" = :TENANT"#
    );
}

#[test]
fn test_update_where_binds_never_collide() {
    let sql = build_update("T", &["ID"], &["ID"], None).unwrap();
    assert!(sql.contains(r#"SET "ID" = :ID"#));
    assert!(sql.contains(r#"WHERE "ID" = :where_ID"#));
}

/// Every `:name` placeholder in `sql`, in order.
fn placeholders(sql: &str) -> Vec<&str> {
    sql.match_indices(':')
        .map(|(at, _)| {
            let rest = &sql[at + 1..];
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            &rest[..end]
        })
        .collect()
}

#[test]
fn test_insert_returning_binds_never_collide() {
    let sql = build_insert("T", &["ID", "NAME"], None, &["ID"]).unwrap();
    assert_eq!(
        sql,
        r#"INSERT INTO "T" ("ID", "NAME") VALUES (:ID, :NAME) RETURNING "ID" INTO :ret_ID"#
    );
    let names = placeholders(&sql);
    assert_eq!(names, vec!["ID", "NAME", "ret_ID"]);
    for name in &names {
        assert_eq!(names.iter().filter(|n| *n == name).count(), 1, "{name}");
    }
    assert_eq!(returning_bind("ID"), format!("{RETURNING_BIND_PREFIX}ID"));
}

#[test]
fn test_unbounded_writes_are_refused() {
    assert_eq!(
        build_update("T", &["A"], NONE, None).unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(build_delete("T", NONE, None).unwrap_err().kind(), ErrorKind::Validation);
    assert!(build_insert("T", NONE, None, NONE).is_err());
}

#[test]
fn test_merge_with_dual_source() {
    let source = dual_source(&["id", "name", "email"]).unwrap();
    assert_eq!(
        source,
        r#"SELECT :ID AS "ID", :NAME AS "NAME", :EMAIL AS "EMAIL" FROM DUAL"#
    );

    let sql = build_merge(
        "users",
        &source,
        &["id"],
        &["name", "email"],
        &["id", "name", "email"],
        Some("app"),
    )
    .unwrap();

    assert!(sql.starts_with(r#"MERGE INTO "APP"."USERS" tgt USING (SELECT :ID"#));
    assert!(sql.contains(r#"ON (tgt."ID" = src."ID")"#));
    assert!(sql.contains(
        r#"WHEN MATCHED THEN UPDATE SET tgt."NAME" = src."NAME", tgt."EMAIL" = src."EMAIL""#
    ));
    assert!(sql.ends_with(
        r#"WHEN NOT MATCHED THEN INSERT ("ID", "NAME", "EMAIL") VALUES (src."ID", src."NAME", src."EMAIL")"#
    ));
}

#[test]
fn test_merge_rejects_updating_join_columns() {
    let err = build_merge("T", "SELECT 1 AS ID FROM DUAL", &["ID"], &["id"], NONE, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_merge_requires_an_action() {
    assert!(build_merge("T", "SELECT 1 AS ID FROM DUAL", &["ID"], NONE, NONE, None).is_err());
    assert!(build_merge("T", "  ", &["ID"], &["A"], NONE, None).is_err());
    assert!(build_merge("T", "SELECT 1 FROM DUAL", NONE, &["A"], NONE, None).is_err());
}

// =========================================================================
// DDL
// =========================================================================

#[test]
fn test_create_table_ddl() {
    let columns: Vec<ColumnSpec> = serde_json::from_value(json!([
        {"name": "ID", "data_type": "NUMBER", "nullable": false}
    ]))
    .unwrap();

    let ddl = create_table_ddl("T", &columns, &["ID"]).unwrap();

    assert!(ddl.contains("CREATE TABLE T"));
    assert!(ddl.contains("ID NUMBER NOT NULL"));
    assert!(ddl.contains("PRIMARY KEY (ID)"));
}

#[test]
fn test_create_table_ddl_with_defaults_and_schema() {
    let columns = vec![
        ColumnSpec::new("id", "number(10)").not_null(),
        ColumnSpec::new("status", "varchar2(10)").with_default("NEW"),
        ColumnSpec::new("created_at", "timestamp").with_default("SYSTIMESTAMP").not_null(),
        ColumnSpec::new("note", "varchar2 ( 200 )"),
    ];

    let ddl = create_table_ddl_in("tickets", &columns, &["id"], Some("app")).unwrap();

    assert_eq!(
        ddl,
        "CREATE TABLE APP.TICKETS (ID NUMBER(10) NOT NULL, STATUS VARCHAR2(10) DEFAULT 'NEW', \
         CREATED_AT TIMESTAMP DEFAULT SYSTIMESTAMP NOT NULL, NOTE VARCHAR2(200), PRIMARY KEY (ID))"
    );
}

#[test]
fn test_create_table_ddl_rejects_bad_input() {
    let missing_type: Vec<ColumnSpec> =
        serde_json::from_value(json!([{"name": "ID"}])).unwrap();
    assert_eq!(
        create_table_ddl("T", &missing_type, NONE).unwrap_err().kind(),
        ErrorKind::Validation
    );

    let injected = vec![ColumnSpec::new("ID", "NUMBER); DROP TABLE X; --")];
    assert!(create_table_ddl("T", &injected, NONE).is_err());

    let columns = vec![ColumnSpec::new("ID", "NUMBER")];
    assert!(create_table_ddl("T", &columns, &["OTHER"]).is_err());
    assert!(create_table_ddl("T", &[] as &[ColumnSpec], NONE).is_err());
}

#[test]
fn test_drop_and_index_ddl() {
    assert_eq!(drop_table_ddl("t", Some("app")).unwrap(), "DROP TABLE APP.T");
    assert_eq!(drop_table_purge_ddl("t", None).unwrap(), "DROP TABLE T PURGE");

    let index = IndexConfig::new("emp_name_ix", "employees", ["last_name", "first_name"])
        .with_schema("hr")
        .unique()
        .with_tablespace("users")
        .with_parallel(4);
    assert_eq!(
        build_create_index(&index).unwrap(),
        "CREATE UNIQUE INDEX HR.EMP_NAME_IX ON HR.EMPLOYEES (LAST_NAME, FIRST_NAME) \
         TABLESPACE USERS PARALLEL 4"
    );

    let no_columns = IndexConfig::new("ix", "t", Vec::<String>::new());
    assert!(build_create_index(&no_columns).is_err());
}

// =========================================================================
// Generated statements through the manager
// =========================================================================

#[test]
fn test_generated_insert_runs_as_batch() {
    let driver = MockDriver::new();
    let manager = connected(&driver);
    let sql = build_insert("users", &["id", "name"], None, NONE).unwrap();
    let rows: Vec<Params> = vec![
        Params::new().bind("ID", 1).bind("NAME", "Ada"),
        Params::new().bind("ID", 2).bind("NAME", "Grace"),
    ];

    assert_eq!(manager.execute_many(&sql, &rows).unwrap(), 2);
    assert_eq!(driver.executed()[1].1.get("name"), Some(&QueryParam::String("Grace".into())));
}

#[test]
fn test_generated_select_runs_with_its_params() {
    let driver = MockDriver::new();
    let manager = connected(&driver);
    let stmt = build_select(
        "users",
        &["id"],
        &Params::new().bind("email", "a@example.com"),
        None,
        Some(1),
    )
    .unwrap();

    let result = manager.fetch_all(&stmt.sql, &stmt.params).unwrap();

    assert!(result.is_empty());
    let bound = driver.query_params("FROM \"USERS\"").unwrap();
    assert_eq!(bound, stmt.params);
}
