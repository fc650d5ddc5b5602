use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use sql_cluster::prelude::*;
use sql_cluster::test_utils::MockConnector;

const CLUSTER_INI: &str = "\
# shared settings
database = app
timeout = 3s
retry = 2
client_found_rows = true

[master]
hosts = 10.0.0.1:3306, 10.0.0.2
user = app
password = \"s3cret\"

[slave]
hosts = 10.0.0.3:3307
timeout = 500ms
";

#[tokio::test]
async fn init_from_file_path() -> Result<(), SqlClusterError> {
    let mut file = tempfile::NamedTempFile::new().map_err(|e| SqlClusterError::Other(e.to_string()))?;
    file.write_all(CLUSTER_INI.as_bytes())
        .map_err(|e| SqlClusterError::Other(e.to_string()))?;

    let client = Client::with_connector(Arc::new(MockConnector::new()));
    client.init(file.path()).await?;

    assert_eq!(client.masters()?, ["10.0.0.1:3306", "10.0.0.2:3306"]);
    assert_eq!(client.replicas()?, ["10.0.0.3:3307"]);

    let hosts = client.hosts()?;
    assert_eq!(hosts.len(), 3);
    assert_eq!(hosts[0].timeout(), Duration::from_secs(3));
    assert_eq!(hosts[0].retry(), 2);
    assert_eq!(hosts[2].timeout(), Duration::from_millis(500));
    Ok(())
}

#[tokio::test]
async fn init_from_loaded_document() -> Result<(), SqlClusterError> {
    let doc = IniDocument::parse(CLUSTER_INI)?;
    let config = ClusterConfig::from_ini(&doc)?;
    assert_eq!(config.slave.user, None);

    let (_, replicas) = config.targets()?;
    assert_eq!(replicas[0].user, "app");
    assert_eq!(replicas[0].password, "s3cret");
    assert!(replicas[0].client_found_rows);

    let client = Client::with_connector(Arc::new(MockConnector::new()));
    client.init(doc).await?;
    assert_eq!(client.state(), LifecycleState::Ready);
    Ok(())
}

#[tokio::test]
async fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let client = Client::with_connector(Arc::new(MockConnector::new()));
    let err = client
        .init(dir.path().join("absent.ini").as_path())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlClusterError::ConfigError(_)));
}

#[tokio::test]
async fn file_without_master_is_rejected() -> Result<(), SqlClusterError> {
    let mut file = tempfile::NamedTempFile::new().map_err(|e| SqlClusterError::Other(e.to_string()))?;
    file.write_all(b"database = app\n[slave]\nhosts = 10.0.0.3\n")
        .map_err(|e| SqlClusterError::Other(e.to_string()))?;

    let client = Client::with_connector(Arc::new(MockConnector::new()));
    let err = client.init(file.path()).await.unwrap_err();
    assert!(matches!(err, SqlClusterError::ConfigError(_)));
    Ok(())
}
