use std::sync::Arc;

use async_trait::async_trait;

use crate::config::HostTarget;
use crate::error::SqlClusterError;
use crate::results::ResultSet;
use crate::types::{ExecResult, RowValues};

/// One live, pooled connection handle to a single database host.
///
/// Implementations must be safe for concurrent use; the wrapper adds no
/// locking of its own. `query` returns a fully materialized result set.
#[async_trait]
pub trait HostConnection: Send + Sync {
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError>;

    async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError>;

    async fn begin(&self) -> Result<Box<dyn HostTransaction>, SqlClusterError>;

    /// Release the underlying pool. Called once per host by the client.
    async fn close(&self) -> Result<(), SqlClusterError>;
}

/// An open transaction on one host.
///
/// Dropping an unfinished transaction must not leave it open on the server.
#[async_trait]
pub trait HostTransaction: Send {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError>;

    async fn exec(&mut self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError>;

    async fn commit(&mut self) -> Result<(), SqlClusterError>;

    async fn rollback(&mut self) -> Result<(), SqlClusterError>;
}

/// Opens host connections from normalized targets.
#[async_trait]
pub trait HostConnector: Send + Sync {
    async fn connect(&self, target: &HostTarget) -> Result<Arc<dyn HostConnection>, SqlClusterError>;
}
