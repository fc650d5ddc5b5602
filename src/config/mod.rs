//! Cluster configuration.
//!
//! A client can be initialized from exactly one of three equivalent forms,
//! see [`ConfigSource`]. All of them normalize into per-host
//! [`HostTarget`]s before any connection is made.

mod duration;
mod ini;
mod target;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use duration::parse_duration;
pub use ini::IniDocument;
pub use target::{DEFAULT_PORT, HostRole, HostTarget, parse_host_entry};

use crate::error::SqlClusterError;

/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Extra in-host attempts for reads when none is configured.
pub const DEFAULT_RETRY: u32 = 1;

/// Where a client's configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A programmatic configuration
    Config(ClusterConfig),
    /// An already-parsed INI document
    Loaded(IniDocument),
    /// Path to an INI file
    File(PathBuf),
}

impl From<ClusterConfig> for ConfigSource {
    fn from(config: ClusterConfig) -> Self {
        Self::Config(config)
    }
}

impl From<IniDocument> for ConfigSource {
    fn from(doc: IniDocument) -> Self {
        Self::Loaded(doc)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl ConfigSource {
    /// Resolve into a [`ClusterConfig`].
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` if the file cannot be read or a
    /// value cannot be parsed.
    pub fn resolve(self) -> Result<ClusterConfig, SqlClusterError> {
        match self {
            Self::Config(config) => Ok(config),
            Self::Loaded(doc) => ClusterConfig::from_ini(&doc),
            Self::File(path) => ClusterConfig::from_file(path),
        }
    }
}

/// Connectivity for one role (masters or replicas).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// `host[:port]` entries
    pub hosts: Vec<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(with = "duration::opt_duration")]
    pub timeout: Option<Duration>,
}

/// Programmatic cluster configuration.
///
/// ```rust
/// use sql_cluster::prelude::*;
///
/// let config = ClusterConfig::new("app")
///     .with_master(["10.0.0.1:3306"])
///     .with_replicas(["10.0.0.2:3306", "10.0.0.3"])
///     .with_credentials("app", "secret");
/// # let _ = config;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub database: String,
    pub charset: Option<String>,
    pub master: RoleConfig,
    pub slave: RoleConfig,
    #[serde(with = "duration::opt_duration")]
    pub timeout: Option<Duration>,
    pub retry: Option<u32>,
    pub max_open_conns: Option<usize>,
    pub max_idle_conns: Option<usize>,
    #[serde(with = "duration::opt_duration")]
    pub conn_max_lifetime: Option<Duration>,
    /// Report matched rather than changed rows for UPDATE
    pub client_found_rows: bool,
    /// The hosts sit behind a SQL proxy; no server-side statement cache
    pub proxy: bool,
    /// Enable `sql_safe_updates` on every session
    pub safe_updates: bool,
}

impl ClusterConfig {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_master<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.master.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_replicas<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slave.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.master.user = Some(user.into());
        self.master.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_pool_size(mut self, max_open: usize, max_idle: usize) -> Self {
        self.max_open_conns = Some(max_open);
        self.max_idle_conns = Some(max_idle);
        self
    }

    #[must_use]
    pub fn with_client_found_rows(mut self, enabled: bool) -> Self {
        self.client_found_rows = enabled;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, enabled: bool) -> Self {
        self.proxy = enabled;
        self
    }

    #[must_use]
    pub fn with_safe_updates(mut self, enabled: bool) -> Self {
        self.safe_updates = enabled;
        self
    }

    /// Read an INI file.
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlClusterError> {
        Self::from_ini(&IniDocument::load(path)?)
    }

    /// Build from a parsed INI document.
    ///
    /// Root keys: `database`, `charset`, `timeout`, `retry`, `max_open_conns`,
    /// `max_idle_conns`, `conn_max_lifetime`, `client_found_rows`, `proxy`,
    /// `safe_updates`. Sections `[master]` and `[slave]` (or `[replica]`):
    /// `hosts`, `user`, `password`, `timeout`.
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` for unparsable numbers, flags, or
    /// durations.
    pub fn from_ini(doc: &IniDocument) -> Result<Self, SqlClusterError> {
        let replica_section = if doc.has_section("slave") { "slave" } else { "replica" };

        Ok(Self {
            database: doc
                .get("", "database")
                .or_else(|| doc.get("master", "database"))
                .unwrap_or_default()
                .to_string(),
            charset: doc.get("", "charset").map(str::to_string),
            master: role_from_ini(doc, "master")?,
            slave: role_from_ini(doc, replica_section)?,
            timeout: ini_duration(doc, "", "timeout")?,
            retry: ini_number(doc, "retry")?,
            max_open_conns: ini_number(doc, "max_open_conns")?,
            max_idle_conns: ini_number(doc, "max_idle_conns")?,
            conn_max_lifetime: ini_duration(doc, "", "conn_max_lifetime")?,
            client_found_rows: ini_flag(doc, "client_found_rows")?,
            proxy: ini_flag(doc, "proxy")?,
            safe_updates: ini_flag(doc, "safe_updates")?,
        })
    }

    /// Validate and expand into per-host targets: `(masters, replicas)`.
    ///
    /// Replica credentials default to the master's; role timeouts default to
    /// the cluster timeout, then to [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` when no master is configured, the
    /// database name is missing, or a host entry is malformed.
    pub fn targets(&self) -> Result<(Vec<HostTarget>, Vec<HostTarget>), SqlClusterError> {
        if self.master.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(SqlClusterError::ConfigError(
                "at least one master host is required".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(SqlClusterError::ConfigError(
                "database is required".to_string(),
            ));
        }

        let masters = self.role_targets(HostRole::Master, &self.master, None)?;
        let replicas = self.role_targets(HostRole::Replica, &self.slave, Some(&self.master))?;
        Ok((masters, replicas))
    }

    fn role_targets(
        &self,
        role: HostRole,
        cfg: &RoleConfig,
        fallback: Option<&RoleConfig>,
    ) -> Result<Vec<HostTarget>, SqlClusterError> {
        let user = cfg
            .user
            .clone()
            .or_else(|| fallback.and_then(|f| f.user.clone()))
            .unwrap_or_default();
        let password = cfg
            .password
            .clone()
            .or_else(|| fallback.and_then(|f| f.password.clone()))
            .unwrap_or_default();
        let timeout = cfg
            .timeout
            .or(self.timeout)
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT);

        cfg.hosts
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| {
                let (host, port) = parse_host_entry(entry)?;
                Ok(HostTarget {
                    role,
                    host,
                    port,
                    user: user.clone(),
                    password: password.clone(),
                    database: self.database.trim().to_string(),
                    charset: self.charset.clone(),
                    timeout,
                    retry: self.retry.unwrap_or(DEFAULT_RETRY),
                    max_open_conns: self.max_open_conns,
                    max_idle_conns: self.max_idle_conns,
                    conn_max_lifetime: self.conn_max_lifetime,
                    client_found_rows: self.client_found_rows,
                    proxy: self.proxy,
                    safe_updates: self.safe_updates,
                })
            })
            .collect()
    }
}

fn role_from_ini(doc: &IniDocument, section: &str) -> Result<RoleConfig, SqlClusterError> {
    Ok(RoleConfig {
        hosts: doc
            .get(section, "hosts")
            .or_else(|| doc.get(section, "host"))
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        user: doc.get(section, "user").map(str::to_string),
        password: doc.get(section, "password").map(str::to_string),
        timeout: ini_duration(doc, section, "timeout")?,
    })
}

fn ini_duration(
    doc: &IniDocument,
    section: &str,
    key: &str,
) -> Result<Option<Duration>, SqlClusterError> {
    doc.get(section, key)
        .map(|v| parse_duration(v).map_err(SqlClusterError::ConfigError))
        .transpose()
}

fn ini_number<T: std::str::FromStr>(doc: &IniDocument, key: &str) -> Result<Option<T>, SqlClusterError> {
    doc.get("", key)
        .map(|v| {
            v.trim().parse::<T>().map_err(|_| {
                SqlClusterError::ConfigError(format!("`{key}` must be a number, got `{v}`"))
            })
        })
        .transpose()
}

fn ini_flag(doc: &IniDocument, key: &str) -> Result<bool, SqlClusterError> {
    match doc.get("", key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(SqlClusterError::ConfigError(format!(
                "`{key}` must be a boolean, got `{v}`"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
database = app
timeout = 2s
retry = 2
max_open_conns = 32
client_found_rows = true

[master]
hosts = 10.0.0.1:3306, 10.0.0.2
user = writer
password = secret

[slave]
hosts = 10.0.0.3:3307
timeout = 500
";

    #[test]
    fn ini_normalizes_into_targets() {
        let config = ClusterConfig::from_ini(&IniDocument::parse(SAMPLE).unwrap()).unwrap();
        let (masters, replicas) = config.targets().unwrap();

        assert_eq!(masters.len(), 2);
        assert_eq!(masters[1].address(), "10.0.0.2:3306");
        assert_eq!(masters[0].timeout, Duration::from_secs(2));
        assert_eq!(masters[0].retry, 2);
        assert!(masters[0].client_found_rows);

        assert_eq!(replicas.len(), 1);
        assert_eq!(replicas[0].port, 3307);
        assert_eq!(replicas[0].user, "writer");
        assert_eq!(replicas[0].password, "secret");
        assert_eq!(replicas[0].timeout, Duration::from_millis(500));
        assert_eq!(replicas[0].role, HostRole::Replica);
    }

    #[test]
    fn missing_master_or_database_is_fatal() {
        let no_master = ClusterConfig::new("app");
        assert!(matches!(no_master.targets(), Err(SqlClusterError::ConfigError(_))));

        let no_db = ClusterConfig::new(" ").with_master(["db1"]);
        assert!(matches!(no_db.targets(), Err(SqlClusterError::ConfigError(_))));

        let bad_host = ClusterConfig::new("app").with_master(["db1:port"]);
        assert!(matches!(bad_host.targets(), Err(SqlClusterError::ConfigError(_))));
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let config = ClusterConfig::new("app")
            .with_master(["db1"])
            .with_timeout(Duration::ZERO);
        let (masters, _) = config.targets().unwrap();
        assert_eq!(masters[0].timeout, DEFAULT_TIMEOUT);
        assert_eq!(masters[0].retry, DEFAULT_RETRY);
    }

    #[test]
    fn bad_flag_is_rejected() {
        let doc = IniDocument::parse("database = app\nproxy = maybe\n[master]\nhosts = db1").unwrap();
        assert!(ClusterConfig::from_ini(&doc).is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let config: ClusterConfig = serde_json::from_str(
            r#"{"database":"app","timeout":"750ms","master":{"hosts":["db1"],"timeout":1200}}"#,
        )
        .unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(750)));
        assert_eq!(config.master.timeout, Some(Duration::from_millis(1200)));
    }
}
