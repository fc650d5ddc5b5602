use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Pool, PoolConstraints, PoolOpts};
use tracing::warn;

use crate::config::HostTarget;
use crate::error::SqlClusterError;
use crate::host::{HostConnection, HostConnector, HostTransaction};
use crate::results::ResultSet;
use crate::types::{ExecResult, RowValues};

use super::value::{from_mysql_value, to_mysql_params};

/// Opens a `mysql_async` pool per host target. Pools connect lazily.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlConnector;

impl MysqlConnector {
    /// Driver options for `target`.
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` for pool limits the driver rejects.
    pub fn options(target: &HostTarget) -> Result<OptsBuilder, SqlClusterError> {
        let mut init = Vec::new();
        if let Some(charset) = &target.charset {
            init.push(format!("SET NAMES {charset}"));
        }
        if target.safe_updates {
            init.push("SET SESSION sql_safe_updates=1".to_string());
        }

        let mut pool_opts = PoolOpts::default();
        if let Some(max) = target.max_open_conns {
            let min = target.max_idle_conns.unwrap_or(0).min(max);
            let constraints = PoolConstraints::new(min, max).ok_or_else(|| {
                SqlClusterError::ConfigError(format!(
                    "invalid pool size for {}: idle {min}, open {max}",
                    target.address()
                ))
            })?;
            pool_opts = pool_opts.with_constraints(constraints);
        }
        if let Some(lifetime) = target.conn_max_lifetime {
            pool_opts = pool_opts.with_abs_conn_ttl(Some(lifetime));
        }

        let mut opts = OptsBuilder::default()
            .ip_or_hostname(target.host.clone())
            .tcp_port(target.port)
            .user(Some(target.user.clone()))
            .pass(Some(target.password.clone()))
            .db_name(Some(target.database.clone()))
            .client_found_rows(target.client_found_rows)
            .init(init)
            .pool_opts(pool_opts);
        if target.proxy {
            // Statement-multiplexing proxies do not keep server-side
            // prepared statements alive between calls.
            opts = opts.stmt_cache_size(0);
        }
        Ok(opts)
    }
}

#[async_trait]
impl HostConnector for MysqlConnector {
    async fn connect(&self, target: &HostTarget) -> Result<Arc<dyn HostConnection>, SqlClusterError> {
        let pool = Pool::new(Self::options(target)?);
        Ok(Arc::new(MysqlHost { pool }))
    }
}

/// One host's connection pool.
#[derive(Debug, Clone)]
pub struct MysqlHost {
    pool: Pool,
}

impl MysqlHost {
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

async fn query_on(conn: &mut Conn, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
    let rows: Vec<mysql_async::Row> = conn.exec(sql, to_mysql_params(params)).await?;

    let Some(first) = rows.first() else {
        return Ok(ResultSet::default());
    };
    let columns = first
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();

    let mut rs = ResultSet::with_columns(columns);
    for row in rows {
        rs.add_row_values(row.unwrap().into_iter().map(from_mysql_value).collect());
    }
    Ok(rs)
}

async fn exec_on(conn: &mut Conn, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
    conn.exec_drop(sql, to_mysql_params(params)).await?;
    Ok(ExecResult {
        rows_affected: conn.affected_rows(),
        last_insert_id: conn.last_insert_id(),
    })
}

#[async_trait]
impl HostConnection for MysqlHost {
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        let mut conn = self.pool.get_conn().await?;
        query_on(&mut conn, sql, params).await
    }

    async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        let mut conn = self.pool.get_conn().await?;
        exec_on(&mut conn, sql, params).await
    }

    async fn begin(&self) -> Result<Box<dyn HostTransaction>, SqlClusterError> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop("START TRANSACTION").await?;
        Ok(Box::new(MysqlTransaction { conn: Some(conn) }))
    }

    async fn close(&self) -> Result<(), SqlClusterError> {
        self.pool.clone().disconnect().await?;
        Ok(())
    }
}

/// A transaction pinned to one pooled connection.
struct MysqlTransaction {
    conn: Option<Conn>,
}

impl MysqlTransaction {
    fn conn(&mut self) -> Result<&mut Conn, SqlClusterError> {
        self.conn
            .as_mut()
            .ok_or_else(|| SqlClusterError::ProgrammingError("transaction already finished".to_string()))
    }

    /// Runs `COMMIT` or `ROLLBACK` and releases the connection.
    ///
    /// The connection is only released once the statement succeeds, so a
    /// failed `COMMIT` can still be followed by a `ROLLBACK` on it.
    async fn finish(&mut self, sql: &str) -> Result<(), SqlClusterError> {
        self.conn()?.query_drop(sql).await?;
        self.conn = None;
        Ok(())
    }
}

#[async_trait]
impl HostTransaction for MysqlTransaction {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        query_on(self.conn()?, sql, params).await
    }

    async fn exec(&mut self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        exec_on(self.conn()?, sql, params).await
    }

    async fn commit(&mut self) -> Result<(), SqlClusterError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlClusterError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for MysqlTransaction {
    fn drop(&mut self) {
        // An abandoned transaction must not go back to the pool open.
        if let Some(mut conn) = self.conn.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(err) = conn.query_drop("ROLLBACK").await {
                            warn!(error = %err, "rollback of abandoned transaction failed");
                        }
                    });
                }
                Err(_) => warn!("transaction dropped outside a runtime; connection discarded"),
            }
        }
    }
}
