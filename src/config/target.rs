use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SqlClusterError;

pub const DEFAULT_PORT: u16 = 3306;

lazy_static! {
    static ref HOST_ENTRY: Regex = Regex::new(
        r"^(?:\[(?P<v6>[0-9A-Fa-f:.]+)\]|(?P<host>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?))(?::(?P<port>[0-9]{1,5}))?$"
    )
    .expect("host entry pattern is valid");
}

/// Which pool a host belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostRole {
    Master,
    Replica,
}

impl std::fmt::Display for HostRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostRole::Master => f.write_str("master"),
            HostRole::Replica => f.write_str("replica"),
        }
    }
}

/// Fully normalized connection parameters for one host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTarget {
    pub role: HostRole,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: Option<String>,
    pub timeout: Duration,
    pub retry: u32,
    pub max_open_conns: Option<usize>,
    pub max_idle_conns: Option<usize>,
    pub conn_max_lifetime: Option<Duration>,
    pub client_found_rows: bool,
    pub proxy: bool,
    pub safe_updates: bool,
}

impl HostTarget {
    /// `host:port`, used as the host label in logs.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Split a `host[:port]` entry (IPv6 as `[addr]:port`).
///
/// # Returns
///
/// The host and the port, 3306 when the entry has none.
///
/// # Errors
/// Returns `SqlClusterError::ConfigError` for a malformed host fragment or an
/// out-of-range port.
pub fn parse_host_entry(entry: &str) -> Result<(String, u16), SqlClusterError> {
    let entry = entry.trim();
    let caps = HOST_ENTRY.captures(entry).ok_or_else(|| {
        SqlClusterError::ConfigError(format!("malformed host entry `{entry}`"))
    })?;

    let host = caps
        .name("v6")
        .or_else(|| caps.name("host"))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SqlClusterError::ConfigError(format!("malformed host entry `{entry}`")))?;

    let port = match caps.name("port") {
        Some(port) => port
            .as_str()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                SqlClusterError::ConfigError(format!("invalid port in host entry `{entry}`"))
            })?,
        None => DEFAULT_PORT,
    };

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_forms() {
        assert_eq!(parse_host_entry("db1").unwrap(), ("db1".into(), 3306));
        assert_eq!(parse_host_entry(" 10.0.0.2:3307 ").unwrap(), ("10.0.0.2".into(), 3307));
        assert_eq!(parse_host_entry("[::1]:3310").unwrap(), ("::1".into(), 3310));
    }

    #[test]
    fn rejects_malformed_fragments() {
        for bad in ["", "db1:", "db1:abc", "db1:70000", "db1:0", "user@db1", "db1/app", "db 1"] {
            assert!(parse_host_entry(bad).is_err(), "{bad} should be rejected");
        }
    }
}
