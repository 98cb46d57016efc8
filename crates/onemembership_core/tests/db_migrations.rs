use onemembership_core::db::migrations::latest_version;
use onemembership_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "languages",
        "users",
        "service_providers",
        "projects",
        "subscription_plans",
        "subscriptions",
        "payment_gateways",
        "subscription_transactions",
        "sp_payroll_transactions",
        "deleted_users",
        "deleted_sp_payroll_transactions",
        "bot_sessions",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let orphan = conn.execute(
        "INSERT INTO user_passwords (user_id, password, salt, created_at, updated_at)
         VALUES ('UR-missing', 'hash', 'salt', 0, 0);",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn open_db_creates_missing_directories_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("store").join("onemembership.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO languages (code, name, flag, display_order) VALUES ('en', 'English', '', 1);",
        [],
    )
    .unwrap();
    drop(conn);

    let reopened = open_db(&path).unwrap();
    assert_eq!(schema_version(&reopened), latest_version());
    let languages: i64 = reopened
        .query_row("SELECT COUNT(*) FROM languages;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(languages, 1);
}

#[test]
fn database_path_under_a_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let err = open_db(blocker.join("onemembership.db")).unwrap_err();
    assert!(matches!(err, DbError::CreateDir { .. }), "unexpected error: {err}");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
