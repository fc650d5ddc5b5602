use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::error::SqlClusterError;
use crate::host::DbHost;

/// Write and read pools of an initialized client.
#[derive(Debug)]
pub(crate) struct Topology {
    masters: Vec<Arc<DbHost>>,
    replicas: Vec<Arc<DbHost>>,
    /// The read pool is the write pool (no replicas configured).
    aliased: bool,
}

impl Topology {
    /// With no replicas the read pool shares the master hosts.
    pub(crate) fn new(masters: Vec<Arc<DbHost>>, replicas: Vec<Arc<DbHost>>) -> Self {
        if replicas.is_empty() {
            Self {
                replicas: masters.clone(),
                masters,
                aliased: true,
            }
        } else {
            Self {
                masters,
                replicas,
                aliased: false,
            }
        }
    }

    pub(crate) fn masters(&self) -> &[Arc<DbHost>] {
        &self.masters
    }

    pub(crate) fn replicas(&self) -> &[Arc<DbHost>] {
        &self.replicas
    }

    /// Every distinct host, each listed once.
    pub(crate) fn distinct_hosts(&self) -> impl Iterator<Item = &Arc<DbHost>> {
        let replicas: &[Arc<DbHost>] = if self.aliased { &[] } else { &self.replicas };
        self.masters.iter().chain(replicas)
    }

    /// A uniformly random master. There is no write failover.
    pub(crate) fn master(&self) -> Result<Arc<DbHost>, SqlClusterError> {
        match self.masters.len() {
            0 => Err(SqlClusterError::NoAvailableDatabase),
            1 => Ok(self.masters[0].clone()),
            n => Ok(self.masters[rand::thread_rng().gen_range(0..n)].clone()),
        }
    }

    fn read_order(&self) -> Vec<Arc<DbHost>> {
        let mut order = self.replicas.clone();
        order.shuffle(&mut rand::thread_rng());
        order
    }

    /// Run a read against the read pool in random order.
    ///
    /// One retryable failure moves the call to another host; the outcome of
    /// that second host is final, so a call touches at most two hosts.
    pub(crate) async fn read<T, F, Fut>(&self, mut op: F) -> Result<T, SqlClusterError>
    where
        F: FnMut(Arc<DbHost>) -> Fut,
        Fut: Future<Output = Result<T, SqlClusterError>>,
    {
        let mut attempts_remaining: u32 = 1;
        for host in self.read_order() {
            let label = host.host().to_string();
            debug!(host = %label, "read");
            match op(host).await {
                Ok(value) => return Ok(value),
                Err(err) if attempts_remaining > 0 && err.is_retryable() => {
                    attempts_remaining -= 1;
                    warn!(host = %label, error = %err, "read failed, trying another host");
                }
                Err(err) => return Err(err),
            }
        }
        Err(SqlClusterError::NoAvailableDatabase)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_utils::{MockConnection, MockReply};

    fn hosts(names: &[&str]) -> (Vec<MockConnection>, Vec<Arc<DbHost>>) {
        let conns: Vec<MockConnection> = names.iter().map(|n| MockConnection::new(*n)).collect();
        let hosts = conns
            .iter()
            .map(|c| {
                Arc::new(DbHost::new(
                    c.name(),
                    Arc::new(c.clone()),
                    Duration::from_secs(1),
                    0,
                ))
            })
            .collect();
        (conns, hosts)
    }

    async fn read(topology: &Topology) -> Result<usize, SqlClusterError> {
        topology
            .read(|host| async move { host.query("SELECT 1", &[]).await.map(|rs| rs.len()) })
            .await
    }

    #[tokio::test]
    async fn reads_use_masters_without_replicas() {
        let (conns, masters) = hosts(&["m1:3306"]);
        let topology = Topology::new(masters, Vec::new());
        assert_eq!(topology.distinct_hosts().count(), 1);

        read(&topology).await.unwrap();
        assert_eq!(conns[0].query_count(), 1);
    }

    #[tokio::test]
    async fn empty_read_pool_reports_no_database() {
        let topology = Topology::new(Vec::new(), Vec::new());
        assert!(matches!(read(&topology).await, Err(SqlClusterError::NoAvailableDatabase)));
        assert!(matches!(topology.master(), Err(SqlClusterError::NoAvailableDatabase)));
    }

    #[tokio::test]
    async fn failover_touches_at_most_two_hosts() {
        let (conns, replicas) = hosts(&["r1:3306", "r2:3306", "r3:3306"]);
        for conn in &conns {
            conn.set_default(MockReply::Error(SqlClusterError::ConnectionError("down".into())));
        }
        let (_, masters) = hosts(&["m1:3306"]);
        let topology = Topology::new(masters, replicas);

        let err = read(&topology).await.unwrap_err();
        assert!(err.is_retryable());
        let touched: usize = conns.iter().map(MockConnection::query_count).sum();
        assert_eq!(touched, 2);
    }

    #[tokio::test]
    async fn single_unreachable_replica_reports_no_database() {
        let (conns, replicas) = hosts(&["r1:3306"]);
        conns[0].set_default(MockReply::Error(SqlClusterError::ConnectionError("down".into())));
        let (_, masters) = hosts(&["m1:3306"]);
        let topology = Topology::new(masters, replicas);

        assert!(matches!(read(&topology).await, Err(SqlClusterError::NoAvailableDatabase)));
    }
}
