//! Script runner integration tests against in-memory SQLite.

#![cfg(feature = "sqlite")]

use sqlbind::core::{Connection, Driver};
use sqlbind::drivers::SqliteDriver;
use sqlbind::{BindError, SqlScriptRunner, SqlValue};

async fn make_test_connection() -> Box<dyn Connection> {
    SqliteDriver::new()
        .connect("sqlite::memory:", None, None)
        .await
        .unwrap()
}

async fn count(conn: &mut dyn Connection, sql: &str) -> i64 {
    let rs = conn.query(sql, &[]).await.unwrap();
    match &rs.rows[0].values[0] {
        SqlValue::I64(n) => *n,
        other => panic!("unexpected count value {:?}", other),
    }
}

async fn table_exists(conn: &mut dyn Connection, name: &str) -> bool {
    let rs = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[SqlValue::Text(name.to_string())],
        )
        .await
        .unwrap();
    !rs.rows.is_empty()
}

const FAILING_SCRIPT: &str = "
CREATE TABLE t (id INTEGER PRIMARY KEY);
INSERT INTO t VALUES (1);
INSERT INTO missing VALUES (2);
INSERT INTO t VALUES (3);
";

// =============================================================================
// Batch mode
// =============================================================================

#[tokio::test]
async fn test_batch_commits_all() {
    let mut conn = make_test_connection().await;
    let script = "CREATE TABLE t (id INTEGER PRIMARY KEY, note TEXT);\n\
                  INSERT INTO t VALUES (1, 'a;b');\n\
                  -- trailing comment\n\
                  INSERT INTO t VALUES (2, 'c');";

    SqlScriptRunner::run_script(conn.as_mut(), script, None)
        .await
        .unwrap();

    assert!(conn.auto_commit());
    assert_eq!(count(conn.as_mut(), "SELECT COUNT(*) FROM t").await, 2);
}

#[tokio::test]
async fn test_batch_failure_rolls_back_everything() {
    let mut conn = make_test_connection().await;

    let err = SqlScriptRunner::run_script(conn.as_mut(), FAILING_SCRIPT, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing"));

    // SQLite DDL is transactional, so the table is gone too.
    assert!(!table_exists(conn.as_mut(), "t").await);
    assert!(conn.auto_commit());
}

#[tokio::test]
async fn test_manual_commit_mode_is_restored() {
    let mut conn = make_test_connection().await;
    conn.set_auto_commit(false).await.unwrap();

    SqlScriptRunner::run_script(conn.as_mut(), "CREATE TABLE t (id INTEGER);", None)
        .await
        .unwrap();
    assert!(!conn.auto_commit());

    let _ = SqlScriptRunner::run_script(conn.as_mut(), FAILING_SCRIPT, None).await;
    assert!(!conn.auto_commit());
}

// =============================================================================
// Tolerant mode
// =============================================================================

#[tokio::test]
async fn test_handler_skips_tolerated_failures() {
    let mut conn = make_test_connection().await;
    let tolerate_missing = |stmt: &str, _: &BindError| stmt.contains("missing");

    SqlScriptRunner::run_script(conn.as_mut(), FAILING_SCRIPT, Some(&tolerate_missing))
        .await
        .unwrap();

    assert_eq!(count(conn.as_mut(), "SELECT COUNT(*) FROM t").await, 2);
    assert!(conn.auto_commit());
}

#[tokio::test]
async fn test_handler_refusal_aborts_and_rolls_back() {
    let mut conn = make_test_connection().await;
    let refuse = |_: &str, _: &BindError| false;

    let result =
        SqlScriptRunner::run_script(conn.as_mut(), FAILING_SCRIPT, Some(&refuse)).await;
    assert!(result.is_err());
    assert!(!table_exists(conn.as_mut(), "t").await);
    assert!(conn.auto_commit());
}
