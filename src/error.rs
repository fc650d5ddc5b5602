use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[cfg(feature = "mysql")]
use mysql_async;

lazy_static! {
    // Low-level socket failures that surface as plain driver messages.
    static ref SOCKET_FAILURE: Regex = Regex::new(
        r"(?i)(broken pipe|connection reset|connection refused|connection aborted|i/o timeout|unexpected eof|bad connection|invalid connection)"
    )
    .expect("socket failure pattern is valid");
}

/// MySQL server error codes treated as duplicate-key violations.
const DUPLICATE_KEY_CODES: [u16; 3] = [1022, 1062, 1586];

#[derive(Debug, Error)]
pub enum SqlClusterError {
    #[cfg(feature = "mysql")]
    #[error(transparent)]
    MysqlError(#[from] mysql_async::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout after {elapsed:?} on {host}")]
    Timeout { host: String, elapsed: Duration },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Mapping error: {0}")]
    MappingError(String),

    #[error("Mapping panicked: {message}\n{backtrace}")]
    MappingPanic { message: String, backtrace: String },

    #[error("Programming error: {0}")]
    ProgrammingError(String),

    #[error("Unsafe statement: {0}")]
    UnsafeStatement(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("no rows in result set")]
    NoRows,

    #[error("no available database")]
    NoAvailableDatabase,

    #[error("client is not initialized")]
    NotInitialized,

    #[error("client is closed")]
    Closed,

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlClusterError {
    /// Whether the failure is connection-class, timeout-class, or a transient
    /// socket failure that another attempt (same or different host) may fix.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout { .. } => true,
            #[cfg(feature = "mysql")]
            Self::MysqlError(err) => mysql_is_retryable(err),
            Self::ExecutionError(msg) | Self::Other(msg) => SOCKET_FAILURE.is_match(msg),
            _ => false,
        }
    }

    /// Whether the failure is a unique/primary key collision.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::DuplicateKey(_) => true,
            #[cfg(feature = "mysql")]
            Self::MysqlError(mysql_async::Error::Server(server)) => {
                DUPLICATE_KEY_CODES.contains(&server.code)
            }
            _ => false,
        }
    }

    /// Whether a server error code belongs to the duplicate-key family.
    #[must_use]
    pub fn is_duplicate_key_code(code: u16) -> bool {
        DUPLICATE_KEY_CODES.contains(&code)
    }

    /// An owned copy of this error that keeps its variant.
    ///
    /// Driver errors cannot be cloned; they come back as the closest
    /// string-carrying class: `DuplicateKey` for key collisions,
    /// `ConnectionError` when retryable, `ExecutionError` otherwise.
    #[must_use]
    pub fn replay(&self) -> Self {
        match self {
            #[cfg(feature = "mysql")]
            Self::MysqlError(err) => {
                let msg = err.to_string();
                if self.is_duplicate_key() {
                    Self::DuplicateKey(msg)
                } else if self.is_retryable() {
                    Self::ConnectionError(msg)
                } else {
                    Self::ExecutionError(msg)
                }
            }
            Self::ConfigError(msg) => Self::ConfigError(msg.clone()),
            Self::ConnectionError(msg) => Self::ConnectionError(msg.clone()),
            Self::Timeout { host, elapsed } => Self::Timeout {
                host: host.clone(),
                elapsed: *elapsed,
            },
            Self::DuplicateKey(msg) => Self::DuplicateKey(msg.clone()),
            Self::ParameterError(msg) => Self::ParameterError(msg.clone()),
            Self::ExecutionError(msg) => Self::ExecutionError(msg.clone()),
            Self::MappingError(msg) => Self::MappingError(msg.clone()),
            Self::MappingPanic { message, backtrace } => Self::MappingPanic {
                message: message.clone(),
                backtrace: backtrace.clone(),
            },
            Self::ProgrammingError(msg) => Self::ProgrammingError(msg.clone()),
            Self::UnsafeStatement(msg) => Self::UnsafeStatement(msg.clone()),
            Self::Unsupported(msg) => Self::Unsupported(msg.clone()),
            Self::NoRows => Self::NoRows,
            Self::NoAvailableDatabase => Self::NoAvailableDatabase,
            Self::NotInitialized => Self::NotInitialized,
            Self::Closed => Self::Closed,
            Self::Other(msg) => Self::Other(msg.clone()),
        }
    }
}

#[cfg(feature = "mysql")]
fn mysql_is_retryable(err: &mysql_async::Error) -> bool {
    use mysql_async::{DriverError, Error};

    match err {
        Error::Io(_) => true,
        Error::Driver(DriverError::ConnectionClosed | DriverError::PoolDisconnected) => true,
        Error::Server(_) | Error::Url(_) => false,
        other => SOCKET_FAILURE.is_match(&other.to_string()),
    }
}
