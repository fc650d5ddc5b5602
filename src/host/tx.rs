use crate::error::SqlClusterError;
use crate::results::ResultSet;
use crate::row::Row;
use crate::types::{ExecResult, RowValues};

use super::HostTransaction;

/// Transaction handle passed to [`DbHost::transaction`](super::DbHost::transaction)
/// callbacks. Commit and rollback are driven by the wrapper.
pub struct Tx {
    inner: Box<dyn HostTransaction>,
    host: String,
}

impl Tx {
    pub(crate) fn new(inner: Box<dyn HostTransaction>, host: String) -> Self {
        Self { inner, host }
    }

    /// Host label this transaction runs on.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run a statement inside the transaction.
    ///
    /// # Errors
    /// Returns the driver error unchanged.
    pub async fn exec(&mut self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        self.inner.exec(sql, params).await
    }

    /// Run a query inside the transaction.
    ///
    /// # Errors
    /// Returns the driver error unchanged.
    pub async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        self.inner.query(sql, params).await
    }

    /// Run a single-row query inside the transaction.
    pub async fn query_row(&mut self, sql: &str, params: &[RowValues]) -> Row {
        Row::from(self.inner.query(sql, params).await)
    }

    pub(crate) async fn commit(&mut self) -> Result<(), SqlClusterError> {
        self.inner.commit().await
    }

    pub(crate) async fn rollback(&mut self) -> Result<(), SqlClusterError> {
        self.inner.rollback().await
    }
}
