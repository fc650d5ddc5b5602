//! Per-host execution wrapper: deadline, in-host read retry, slow-call
//! logging, and the commit/rollback transaction helper.

mod connection;
mod tx;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::time::{self, Instant as Deadline};
use tracing::{debug, warn};

pub use connection::{HostConnection, HostConnector, HostTransaction};
pub use tx::Tx;

use crate::config::{DEFAULT_RETRY, DEFAULT_TIMEOUT};
use crate::error::SqlClusterError;
use crate::results::ResultSet;
use crate::row::Row;
use crate::types::{ExecResult, RowValues};

/// Calls slower than this are logged with their statement text.
pub const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(1);

/// One database host: a live connection plus its timeout and retry policy.
pub struct DbHost {
    host: String,
    conn: Arc<dyn HostConnection>,
    timeout: Duration,
    retry: u32,
}

impl std::fmt::Debug for DbHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHost")
            .field("host", &self.host)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DbHost {
    /// Wrap a connection.
    ///
    /// # Arguments
    ///
    /// * `host` - The `host:port` label used in logs and timeout errors
    /// * `conn` - The live connection
    /// * `timeout` - Per-call deadline; zero falls back to [`DEFAULT_TIMEOUT`]
    /// * `retry` - Extra same-host attempts for a retryable read failure
    #[must_use]
    pub fn new(host: impl Into<String>, conn: Arc<dyn HostConnection>, timeout: Duration, retry: u32) -> Self {
        Self {
            host: host.into(),
            conn,
            timeout: if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout },
            retry,
        }
    }

    /// Wrap a connection with the default timeout and retry count.
    #[must_use]
    pub fn with_defaults(host: impl Into<String>, conn: Arc<dyn HostConnection>) -> Self {
        Self::new(host, conn, DEFAULT_TIMEOUT, DEFAULT_RETRY)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn retry(&self) -> u32 {
        self.retry
    }

    /// Run a query, retrying on this same host up to `retry` extra times when
    /// the failure is retryable.
    ///
    /// # Errors
    /// Returns the last error once retries are spent, or the first
    /// non-retryable error.
    pub async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        let mut attempt = 0;
        loop {
            match self.bounded(sql, self.conn.query(sql, params)).await {
                Ok(rs) => return Ok(rs),
                Err(err) if attempt < self.retry && err.is_retryable() => {
                    attempt += 1;
                    warn!(host = %self.host, attempt, error = %err, "retrying query on same host");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run a query expected to return at most one row.
    pub async fn query_row(&self, sql: &str, params: &[RowValues]) -> Row {
        Row::from(self.query(sql, params).await)
    }

    /// Run a statement once; statements are never retried.
    ///
    /// # Errors
    /// Returns the driver error, or `SqlClusterError::Timeout` past the deadline.
    pub async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        self.bounded(sql, self.conn.exec(sql, params)).await
    }

    /// Cheap reachability check.
    ///
    /// # Errors
    /// Returns the failure of `SELECT 1`.
    pub async fn ping(&self) -> Result<(), SqlClusterError> {
        self.query("SELECT 1", &[]).await.map(|_| ())
    }

    /// Run `f` inside a transaction on this host.
    ///
    /// Begin, the callback, and commit share one deadline derived from the
    /// host timeout. The transaction is committed when `f` succeeds and rolled
    /// back when `f` or the commit fails.
    ///
    /// ```rust,no_run
    /// # use sql_cluster::prelude::*;
    /// # async fn demo(host: &DbHost) -> Result<(), SqlClusterError> {
    /// let moved = host
    ///     .transaction(|tx| {
    ///         Box::pin(async move {
    ///             tx.exec("UPDATE `acct` SET `bal`=`bal`-? WHERE `id`=?", &[RowValues::Int(5), RowValues::Int(1)]).await?;
    ///             let res = tx.exec("UPDATE `acct` SET `bal`=`bal`+? WHERE `id`=?", &[RowValues::Int(5), RowValues::Int(2)]).await?;
    ///             Ok(res.rows_affected)
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = moved;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the callback's error, the commit error, or
    /// `SqlClusterError::Timeout` when the deadline passes.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, SqlClusterError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<T, SqlClusterError>> + Send,
    {
        let started = Instant::now();
        let deadline = Deadline::now() + self.timeout;

        let inner = match time::timeout_at(deadline, self.conn.begin()).await {
            Ok(begun) => begun?,
            Err(_) => return Err(self.timeout_error(started)),
        };
        let mut tx = Tx::new(inner, self.host.clone());

        let outcome = match time::timeout_at(deadline, f(&mut tx)).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error(started)),
        };

        let result = match outcome {
            Ok(value) => match time::timeout_at(deadline, tx.commit()).await {
                Ok(Ok(())) => Ok(value),
                Ok(Err(err)) => {
                    self.rollback_quietly(&mut tx).await;
                    Err(err)
                }
                Err(_) => {
                    self.rollback_quietly(&mut tx).await;
                    Err(self.timeout_error(started))
                }
            },
            Err(err) => {
                self.rollback_quietly(&mut tx).await;
                Err(err)
            }
        };

        self.log_call("transaction", started.elapsed());
        result
    }

    /// Release the underlying connection.
    ///
    /// # Errors
    /// Returns the driver's disconnect error.
    pub async fn close(&self) -> Result<(), SqlClusterError> {
        self.conn.close().await
    }

    async fn rollback_quietly(&self, tx: &mut Tx) {
        match time::timeout(self.timeout, tx.rollback()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(host = %self.host, error = %err, "rollback failed"),
            Err(_) => warn!(host = %self.host, "rollback timed out"),
        }
    }

    async fn bounded<T>(
        &self,
        sql: &str,
        call: impl Future<Output = Result<T, SqlClusterError>>,
    ) -> Result<T, SqlClusterError> {
        let started = Instant::now();
        let result = match time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error(started)),
        };
        self.log_call(sql, started.elapsed());
        result
    }

    fn log_call(&self, sql: &str, elapsed: Duration) {
        if elapsed > SLOW_CALL_THRESHOLD {
            warn!(host = %self.host, elapsed = ?elapsed, sql, "slow sql");
        } else {
            debug!(host = %self.host, elapsed = ?elapsed, sql, "sql");
        }
    }

    fn timeout_error(&self, started: Instant) -> SqlClusterError {
        SqlClusterError::Timeout {
            host: self.host.clone(),
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockConnection, MockReply};

    fn host(conn: &Arc<MockConnection>, timeout: Duration, retry: u32) -> DbHost {
        DbHost::new("db1:3306", conn.clone(), timeout, retry)
    }

    #[tokio::test]
    async fn zero_timeout_uses_default() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        assert_eq!(host(&conn, Duration::ZERO, 1).timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn query_retries_retryable_errors_on_same_host() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        conn.push(MockReply::Error(SqlClusterError::ConnectionError("reset".into())));
        conn.push(MockReply::rows(&["one"], vec![vec![RowValues::Int(1)]]));

        let rs = host(&conn, Duration::from_secs(1), 1)
            .query("SELECT 1", &[])
            .await
            .unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(conn.query_count(), 2);
    }

    #[tokio::test]
    async fn query_stops_on_non_retryable_error() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        conn.push(MockReply::Error(SqlClusterError::ExecutionError("syntax".into())));

        let err = host(&conn, Duration::from_secs(1), 3)
            .query("SELEC 1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SqlClusterError::ExecutionError(_)));
        assert_eq!(conn.query_count(), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        conn.set_default(MockReply::Error(SqlClusterError::ConnectionError("down".into())));

        let err = host(&conn, Duration::from_secs(1), 2)
            .query("SELECT 1", &[])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(conn.query_count(), 3);
    }

    #[tokio::test]
    async fn exec_is_not_retried() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        conn.set_default(MockReply::Error(SqlClusterError::ConnectionError("down".into())));

        let result = host(&conn, Duration::from_secs(1), 5)
            .exec("DELETE FROM `t` WHERE `id`=?", &[RowValues::Int(1)])
            .await;
        assert!(result.is_err());
        assert_eq!(conn.exec_count(), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        conn.set_default(MockReply::Delay(Duration::from_secs(5)));

        let err = host(&conn, Duration::from_millis(100), 0)
            .query("SELECT SLEEP(5)", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SqlClusterError::Timeout { ref host, .. } if host == "db1:3306"));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn calls_over_a_second_log_a_warning() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let conn = Arc::new(MockConnection::new("db1:3306"));
        let db = host(&conn, Duration::from_secs(3), 0);

        conn.push(MockReply::rows(&["one"], vec![vec![RowValues::Int(1)]]));
        db.query("SELECT 1", &[]).await.unwrap();
        assert!(!logs.contents().contains("slow sql"));

        conn.push(MockReply::Delay(Duration::from_millis(1200)));
        db.query("SELECT SLEEP(1.2)", &[]).await.unwrap();

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("slow sql"))
            .expect("slow call was not logged");
        assert!(line.contains("WARN"), "{line}");
        assert!(line.contains("host=db1:3306"), "{line}");
        assert!(line.contains("SELECT SLEEP(1.2)"), "{line}");
        assert!(line.contains("elapsed="), "{line}");
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        conn.set_default(MockReply::Exec(ExecResult { rows_affected: 1, last_insert_id: None }));

        let affected = host(&conn, Duration::from_secs(1), 1)
            .transaction(|tx| {
                Box::pin(async move {
                    let res = tx
                        .exec("UPDATE `t` SET `a`=? WHERE `id`=?", &[RowValues::Int(1), RowValues::Int(2)])
                        .await?;
                    Ok(res.rows_affected)
                })
            })
            .await
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(conn.commits(), 1);
        assert_eq!(conn.rollbacks(), 0);
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_callback_error() {
        let conn = Arc::new(MockConnection::new("db1:3306"));

        let err = host(&conn, Duration::from_secs(1), 1)
            .transaction(|_tx| {
                Box::pin(async move { Err::<(), _>(SqlClusterError::Other("abort".into())) })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SqlClusterError::Other(_)));
        assert_eq!(conn.commits(), 0);
        assert_eq!(conn.rollbacks(), 1);
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_commit_error() {
        let conn = Arc::new(MockConnection::new("db1:3306"));
        conn.fail_commit(SqlClusterError::ConnectionError("lost".into()));

        let err = host(&conn, Duration::from_secs(1), 1)
            .transaction(|_tx| Box::pin(async move { Ok(()) }))
            .await
            .unwrap_err();

        assert!(matches!(err, SqlClusterError::ConnectionError(_)));
        assert_eq!(conn.rollbacks(), 1);
    }
}
