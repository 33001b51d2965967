//! Executes multi-statement SQL scripts against a connection.

use tracing::{debug, warn};

use crate::core::traits::Connection;
use crate::error::{BindError, Result};

use super::parser::SqlScriptParser;

/// Decides whether a failed statement may be skipped.
///
/// Called with the statement text and the error (whose
/// [`sql_state`](BindError::sql_state) carries the driver's code). Returning
/// `true` continues with the next statement.
pub type FailureHandler<'a> = &'a (dyn Fn(&str, &BindError) -> bool + Send + Sync);

pub struct SqlScriptRunner;

impl SqlScriptRunner {
    /// Run every command of `script` on `conn` and commit.
    ///
    /// Without a handler the commands run as one batch: any failure rolls the
    /// whole script back. With a handler they run one at a time and the
    /// handler decides, per failure, whether to continue or abort (rolling
    /// back). The connection's auto-commit setting is restored on every path.
    pub async fn run_script(
        conn: &mut dyn Connection,
        script: &str,
        handler: Option<FailureHandler<'_>>,
    ) -> Result<()> {
        let auto_commit = conn.auto_commit();
        conn.set_auto_commit(false).await?;

        let result = match Self::run_commands(conn, script, handler).await {
            Ok(()) => conn.commit().await,
            Err(e) => {
                if let Err(rollback_err) = conn.rollback().await {
                    warn!("Rollback after script failure also failed: {}", rollback_err);
                }
                Err(e)
            }
        };

        let restored = conn.set_auto_commit(auto_commit).await;
        result.and(restored)
    }

    async fn run_commands(
        conn: &mut dyn Connection,
        script: &str,
        handler: Option<FailureHandler<'_>>,
    ) -> Result<()> {
        let commands = SqlScriptParser::commands(script, conn.vendor().extra_separator());
        debug!(
            "Running script with {} commands ({})",
            commands.len(),
            if handler.is_some() { "tolerant" } else { "batch" }
        );

        let Some(handler) = handler else {
            conn.execute_batch(&commands).await?;
            return Ok(());
        };

        for command in &commands {
            if let Err(e) = conn.execute(command).await {
                if handler(command, &e) {
                    debug!("Ignoring failed statement: {} ({})", command, e);
                } else {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::traits::{ImportedKeyRow, MetaRow, ResultSet, TableRow};
    use crate::core::value::SqlValue;

    /// Connection that records calls and fails statements containing `fail_on`.
    struct RecordingConnection {
        auto_commit: bool,
        fail_on: &'static str,
        log: Vec<String>,
    }

    impl RecordingConnection {
        fn new(auto_commit: bool, fail_on: &'static str) -> Self {
            Self {
                auto_commit,
                fail_on,
                log: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        fn product_name(&self) -> &str {
            "Recording"
        }

        fn url(&self) -> &str {
            "recording:"
        }

        fn auto_commit(&self) -> bool {
            self.auto_commit
        }

        async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
            self.auto_commit = auto_commit;
            Ok(())
        }

        async fn commit(&mut self) -> Result<()> {
            self.log.push("COMMIT".to_string());
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            self.log.push("ROLLBACK".to_string());
            Ok(())
        }

        async fn set_schema(&mut self, _schema: &str) -> Result<()> {
            Ok(())
        }

        async fn execute(&mut self, sql: &str) -> Result<u64> {
            if !self.fail_on.is_empty() && sql.contains(self.fail_on) {
                return Err(BindError::Sql {
                    message: format!("cannot run {}", sql),
                    sql_state: Some("42000".to_string()),
                });
            }
            self.log.push(sql.to_string());
            Ok(0)
        }

        async fn query(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<ResultSet> {
            Ok(ResultSet::default())
        }

        async fn schemas(&mut self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn tables(&mut self, _schema: Option<&str>) -> Result<Vec<TableRow>> {
            Ok(Vec::new())
        }

        async fn columns(&mut self, _schema: Option<&str>, _table: &str) -> Result<Vec<MetaRow>> {
            Ok(Vec::new())
        }

        async fn primary_keys(&mut self, _schema: Option<&str>, _table: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn imported_keys(
            &mut self,
            _schema: Option<&str>,
            _table: &str,
        ) -> Result<Vec<ImportedKeyRow>> {
            Ok(Vec::new())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_batch_commits_once() {
        let mut conn = RecordingConnection::new(true, "");
        SqlScriptRunner::run_script(&mut conn, "CREATE TABLE a(x INT); INSERT INTO a VALUES (1);", None)
            .await
            .unwrap();
        assert_eq!(
            conn.log,
            vec!["CREATE TABLE a(x INT)", "INSERT INTO a VALUES (1)", "COMMIT"]
        );
        assert!(conn.auto_commit);
    }

    #[tokio::test]
    async fn test_batch_failure_rolls_back_and_restores() {
        let mut conn = RecordingConnection::new(true, "BROKEN");
        let err = SqlScriptRunner::run_script(&mut conn, "CREATE TABLE a(x INT); BROKEN; SELECT 1", None)
            .await
            .unwrap_err();
        assert_eq!(err.sql_state(), Some("42000"));
        assert_eq!(conn.log, vec!["CREATE TABLE a(x INT)", "ROLLBACK"]);
        assert!(conn.auto_commit);
    }

    #[tokio::test]
    async fn test_tolerant_continues_when_handler_allows() {
        let mut conn = RecordingConnection::new(false, "DROP USER");
        let handler = |stmt: &str, _e: &BindError| stmt.starts_with("DROP USER");
        SqlScriptRunner::run_script(
            &mut conn,
            "DROP USER missing_user; CREATE TABLE t(id INT)",
            Some(&handler),
        )
        .await
        .unwrap();
        assert_eq!(conn.log, vec!["CREATE TABLE t(id INT)", "COMMIT"]);
        assert!(!conn.auto_commit);
    }

    #[tokio::test]
    async fn test_tolerant_rethrows_when_handler_refuses() {
        let mut conn = RecordingConnection::new(true, "BROKEN");
        let handler = |_: &str, e: &BindError| e.sql_state() != Some("42000");
        let result = SqlScriptRunner::run_script(
            &mut conn,
            "CREATE TABLE t(id INT); BROKEN; CREATE TABLE u(id INT)",
            Some(&handler),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(conn.log, vec!["CREATE TABLE t(id INT)", "ROLLBACK"]);
        assert!(conn.auto_commit);
    }
}
