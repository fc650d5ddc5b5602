//! Async access layer for a MySQL master/replica cluster.
//!
//! Reads are spread over replicas with bounded failover, writes go to a
//! master, and records map to SQL through per-type field tables declared with
//! [`sql_record!`].

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod mapper;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod prelude;
pub mod results;
pub mod row;
pub mod sql_builder;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

pub use client::{Client, InsertOptions, LifecycleState, UpsertMode};
pub use config::{ClusterConfig, ConfigSource, IniDocument};
pub use error::SqlClusterError;
pub use host::DbHost;
pub use results::{CustomDbRow, ResultSet};
pub use row::Row;
pub use types::{ConditionValue, ExecResult, QueryAndParams, RowValues};
