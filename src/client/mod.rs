//! The cluster client: lifecycle, host selection, read failover, and the
//! typed operations built on the mapper and the SQL builder.

mod crud;
mod lifecycle;
mod topology;
mod upsert;

use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;
use tracing::{info, warn};

pub use crud::InsertOptions;
pub use lifecycle::LifecycleState;
pub use upsert::UpsertMode;

use crate::config::{ConfigSource, HostTarget};
use crate::error::SqlClusterError;
use crate::host::{DbHost, HostConnector, Tx};
use crate::results::ResultSet;
use crate::row::Row;
use crate::types::{ExecResult, RowValues};

use lifecycle::Lifecycle;
use topology::Topology;

/// Client for one master/replica cluster.
///
/// Writes go to a random master; reads go to replicas (or to the masters when
/// no replica is configured) with one failover to another host on
/// connection-class errors. The client is `Send + Sync` and meant to be
/// shared, usually behind an `Arc`.
///
/// ```rust,no_run
/// use sql_cluster::prelude::*;
///
/// # async fn demo() -> Result<(), SqlClusterError> {
/// let client = Client::new();
/// client
///     .init(
///         ClusterConfig::new("app")
///             .with_master(["10.0.0.1:3306"])
///             .with_replicas(["10.0.0.2:3306", "10.0.0.3:3306"])
///             .with_credentials("app", "secret"),
///     )
///     .await?;
///
/// let rs = client.query("SELECT `id` FROM `users` WHERE `age` > ?", &[RowValues::Int(18)]).await?;
/// # let _ = rs;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    connector: Arc<dyn HostConnector>,
    lifecycle: Lifecycle,
    topology: OnceLock<Topology>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.lifecycle.state())
            .field("topology", &self.topology.get())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "mysql")]
impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// A client that connects through `mysql_async`.
    #[cfg(feature = "mysql")]
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(Arc::new(crate::mysql::MysqlConnector))
    }

    /// A client that opens hosts through `connector`.
    #[must_use]
    pub fn with_connector(connector: Arc<dyn HostConnector>) -> Self {
        Self {
            connector,
            lifecycle: Lifecycle::new(),
            topology: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Connect to every configured host.
    ///
    /// Runs at most once: later calls return the first call's outcome, with
    /// the same error variant, and a concurrent caller waits until the first
    /// one finishes.
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` for a missing master, a missing
    /// database, or a malformed host entry; the connector's error if a host
    /// cannot be opened; `SqlClusterError::Closed` after [`Client::close`].
    pub async fn init(&self, source: impl Into<ConfigSource>) -> Result<(), SqlClusterError> {
        if let Some(done) = self.settled_init() {
            return done;
        }

        let _gate = self.lifecycle.enter().await;
        if let Some(done) = self.settled_init() {
            return done;
        }

        self.lifecycle.set(LifecycleState::Starting);
        match self.connect_all(source.into()).await {
            Ok(topology) => {
                info!(
                    masters = topology.masters().len(),
                    replicas = topology.replicas().len(),
                    "cluster client ready"
                );
                let _ = self.topology.set(topology);
                self.lifecycle.set(LifecycleState::Ready);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "cluster client initialization failed");
                self.lifecycle.fail(&err);
                Err(err)
            }
        }
    }

    fn settled_init(&self) -> Option<Result<(), SqlClusterError>> {
        match self.lifecycle.state() {
            LifecycleState::Unstarted | LifecycleState::Starting => None,
            LifecycleState::Ready => Some(Ok(())),
            LifecycleState::Failed => Some(Err(self.lifecycle.failure())),
            LifecycleState::Closing | LifecycleState::Closed => Some(Err(SqlClusterError::Closed)),
        }
    }

    async fn connect_all(&self, source: ConfigSource) -> Result<Topology, SqlClusterError> {
        let config = source.resolve()?;
        let (master_targets, replica_targets) = config.targets()?;

        let mut opened = Vec::with_capacity(master_targets.len() + replica_targets.len());
        let mut masters = Vec::with_capacity(master_targets.len());
        let mut replicas = Vec::with_capacity(replica_targets.len());

        for (target, is_master) in master_targets
            .iter()
            .map(|t| (t, true))
            .chain(replica_targets.iter().map(|t| (t, false)))
        {
            let host = match self.open(target).await {
                Ok(host) => host,
                Err(err) => {
                    let _ = close_hosts(opened.iter()).await;
                    return Err(err);
                }
            };
            opened.push(host.clone());
            if is_master {
                masters.push(host);
            } else {
                replicas.push(host);
            }
        }

        Ok(Topology::new(masters, replicas))
    }

    async fn open(&self, target: &HostTarget) -> Result<Arc<DbHost>, SqlClusterError> {
        let conn = self.connector.connect(target).await?;
        info!(host = %target.address(), role = %target.role, "opened host");
        Ok(Arc::new(DbHost::new(
            target.address(),
            conn,
            target.timeout,
            target.retry,
        )))
    }

    /// Release every host connection once. Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns the first disconnect error; the remaining hosts are still
    /// closed.
    pub async fn close(&self) -> Result<(), SqlClusterError> {
        if self.lifecycle.state() == LifecycleState::Closed {
            return Ok(());
        }
        let _gate = self.lifecycle.enter().await;
        if self.lifecycle.state() == LifecycleState::Closed {
            return Ok(());
        }

        self.lifecycle.set(LifecycleState::Closing);
        let result = match self.topology.get() {
            Some(topology) => close_hosts(topology.distinct_hosts()).await,
            None => Ok(()),
        };
        self.lifecycle.set(LifecycleState::Closed);
        info!("cluster client closed");
        result
    }

    fn topology(&self) -> Result<&Topology, SqlClusterError> {
        match self.lifecycle.state() {
            LifecycleState::Ready => self.topology.get().ok_or(SqlClusterError::NotInitialized),
            LifecycleState::Closing | LifecycleState::Closed => Err(SqlClusterError::Closed),
            LifecycleState::Unstarted | LifecycleState::Starting | LifecycleState::Failed => {
                Err(SqlClusterError::NotInitialized)
            }
        }
    }

    /// Labels (`host:port`) of the write pool.
    ///
    /// # Errors
    /// Fails unless the client is ready.
    pub fn masters(&self) -> Result<Vec<String>, SqlClusterError> {
        Ok(labels(self.topology()?.masters()))
    }

    /// Labels of the read pool; the master labels when no replica is set.
    ///
    /// # Errors
    /// Fails unless the client is ready.
    pub fn replicas(&self) -> Result<Vec<String>, SqlClusterError> {
        Ok(labels(self.topology()?.replicas()))
    }

    /// Every distinct host, masters first.
    ///
    /// # Errors
    /// Fails unless the client is ready.
    pub fn hosts(&self) -> Result<Vec<Arc<DbHost>>, SqlClusterError> {
        Ok(self.topology()?.distinct_hosts().cloned().collect())
    }

    pub(crate) fn master(&self) -> Result<Arc<DbHost>, SqlClusterError> {
        self.topology()?.master()
    }

    /// Run a read on the read pool with failover.
    ///
    /// # Errors
    /// Returns `SqlClusterError::NoAvailableDatabase` when no host could
    /// answer, or the host's error.
    pub async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        self.topology()?
            .read(|host| async move { host.query(sql, params).await })
            .await
    }

    /// Run a single-row read on the read pool. Errors surface from
    /// [`Row::scan`].
    pub async fn query_row(&self, sql: &str, params: &[RowValues]) -> Row {
        Row::from(self.query(sql, params).await)
    }

    /// Run a statement on a random master, once.
    ///
    /// # Errors
    /// Returns the host's error unchanged.
    pub async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        self.master()?.exec(sql, params).await
    }

    /// Run `f` in a transaction on a random master.
    ///
    /// # Errors
    /// See [`DbHost::transaction`].
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, SqlClusterError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<T, SqlClusterError>> + Send,
    {
        self.master()?.transaction(f).await
    }
}

fn labels(hosts: &[Arc<DbHost>]) -> Vec<String> {
    hosts.iter().map(|h| h.host().to_string()).collect()
}

async fn close_hosts<'a>(hosts: impl Iterator<Item = &'a Arc<DbHost>>) -> Result<(), SqlClusterError> {
    let mut first_error = None;
    for host in hosts {
        if let Err(err) = host.close().await {
            warn!(host = %host.host(), error = %err, "closing host failed");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
