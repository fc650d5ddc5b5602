use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sql_cluster::prelude::*;
use sql_cluster::test_utils::{MockConnection, MockConnector, MockReply};

const REPLICAS: [&str; 3] = ["10.0.0.11:3306", "10.0.0.12:3306", "10.0.0.13:3306"];

async fn cluster(replicas: &[&str]) -> Result<(Arc<MockConnector>, Client), SqlClusterError> {
    let connector = Arc::new(MockConnector::new());
    let client = Client::with_connector(connector.clone());
    client
        .init(
            ClusterConfig::new("app")
                .with_master(["10.0.0.1:3306"])
                .with_replicas(replicas.iter().copied())
                .with_credentials("app", "secret")
                .with_retry(0),
        )
        .await?;
    Ok((connector, client))
}

fn replica_conns(connector: &MockConnector, names: &[&str]) -> Vec<MockConnection> {
    names.iter().map(|n| connector.host(n)).collect()
}

fn total_queries(conns: &[MockConnection]) -> usize {
    conns.iter().map(MockConnection::query_count).sum()
}

#[tokio::test]
async fn healthy_read_touches_one_host() -> Result<(), SqlClusterError> {
    let (connector, client) = cluster(&REPLICAS).await?;
    let replicas = replica_conns(&connector, &REPLICAS);
    for conn in &replicas {
        conn.set_default(MockReply::rows(&["one"], vec![vec![RowValues::Int(1)]]));
    }

    let rs = client.query("SELECT 1 AS `one`", &[]).await?;
    assert_eq!(rs.len(), 1);
    assert_eq!(total_queries(&replicas), 1);
    assert_eq!(connector.host("10.0.0.1:3306").query_count(), 0);
    Ok(())
}

#[tokio::test]
async fn failover_gives_up_after_two_hosts() -> Result<(), SqlClusterError> {
    let (connector, client) = cluster(&REPLICAS).await?;
    let replicas = replica_conns(&connector, &REPLICAS);
    for conn in &replicas {
        conn.set_default(MockReply::Error(SqlClusterError::ConnectionError(
            "connection refused".into(),
        )));
    }

    let err = client.query("SELECT 1", &[]).await.unwrap_err();
    assert!(err.is_retryable(), "unexpected error: {err}");
    assert_eq!(total_queries(&replicas), 2);
    Ok(())
}

#[tokio::test]
async fn second_host_answers_after_first_fails() -> Result<(), SqlClusterError> {
    let names = ["10.0.0.11:3306", "10.0.0.12:3306"];
    let (connector, client) = cluster(&names).await?;
    let replicas = replica_conns(&connector, &names);
    // Only the first host asked fails, whichever one the shuffle picks.
    let failed_once = Arc::new(AtomicBool::new(false));
    for conn in &replicas {
        let failed_once = failed_once.clone();
        conn.set_handler(move |_, _| {
            if failed_once.swap(true, Ordering::SeqCst) {
                MockReply::rows(&["one"], vec![vec![RowValues::Int(1)]])
            } else {
                MockReply::Error(SqlClusterError::ExecutionError("write: broken pipe".into()))
            }
        });
    }

    let rs = client.query("SELECT 1", &[]).await?;
    assert_eq!(rs.len(), 1);
    assert!(failed_once.load(Ordering::SeqCst));
    assert_eq!(total_queries(&replicas), 2);
    assert!(replicas.iter().all(|c| c.query_count() == 1));
    Ok(())
}

#[tokio::test]
async fn non_retryable_error_stops_failover() -> Result<(), SqlClusterError> {
    let (connector, client) = cluster(&REPLICAS).await?;
    let replicas = replica_conns(&connector, &REPLICAS);
    for conn in &replicas {
        conn.set_default(MockReply::Error(SqlClusterError::ExecutionError(
            "Unknown column 'nope' in 'field list'".into(),
        )));
    }

    let err = client.query("SELECT `nope` FROM `t`", &[]).await.unwrap_err();
    assert!(matches!(err, SqlClusterError::ExecutionError(_)));
    assert_eq!(total_queries(&replicas), 1);
    Ok(())
}

#[tokio::test]
async fn lone_unreachable_replica_reports_no_database() -> Result<(), SqlClusterError> {
    let names = ["10.0.0.11:3306"];
    let (connector, client) = cluster(&names).await?;
    connector
        .host(names[0])
        .set_default(MockReply::Error(SqlClusterError::ConnectionError("down".into())));

    let err = client.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, SqlClusterError::NoAvailableDatabase));
    Ok(())
}

#[tokio::test]
async fn row_errors_surface_on_scan() -> Result<(), SqlClusterError> {
    let names = ["10.0.0.11:3306"];
    let (connector, client) = cluster(&names).await?;
    connector.host(names[0]).set_default(MockReply::rows(&["n"], Vec::new()));

    let mut n: i64 = 0;
    let err = client
        .query_row("SELECT `n` FROM `t` WHERE `id`=?", &[RowValues::Int(9)])
        .await
        .scan(&mut [&mut n])
        .unwrap_err();
    assert!(matches!(err, SqlClusterError::NoRows));
    Ok(())
}

#[tokio::test]
async fn writes_never_reach_replicas() -> Result<(), SqlClusterError> {
    let connector = Arc::new(MockConnector::new());
    let client = Client::with_connector(connector.clone());
    client
        .init(
            ClusterConfig::new("app")
                .with_master(["10.0.0.1:3306", "10.0.0.2:3306"])
                .with_replicas(["10.0.0.11:3306"]),
        )
        .await?;

    for i in 0..20 {
        client
            .exec("UPDATE `t` SET `n`=? WHERE `id`=?", &[RowValues::Int(i), RowValues::Int(1)])
            .await?;
    }

    let m1 = connector.host("10.0.0.1:3306").exec_count();
    let m2 = connector.host("10.0.0.2:3306").exec_count();
    assert_eq!(m1 + m2, 20);
    assert_eq!(connector.host("10.0.0.11:3306").calls(), 0);
    Ok(())
}
