//! Convenient imports for common functionality.

pub use crate::client::{Client, InsertOptions, LifecycleState, UpsertMode};
pub use crate::config::{ClusterConfig, ConfigSource, HostRole, HostTarget, IniDocument, RoleConfig};
pub use crate::error::SqlClusterError;
pub use crate::host::{DbHost, HostConnection, HostConnector, HostTransaction, Tx};
pub use crate::mapper::{FromSqlValue, MappingMode, RecordMapping, SqlRecord, ToSqlValue};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::row::{RawBytes, Row, ScanTarget};
pub use crate::sql_builder::{BuildKind, BuiltCondition, Direction, SqlCondition, build_where};
pub use crate::sql_record;
pub use crate::types::{ConditionValue, ExecResult, QueryAndParams, RowValues};

#[cfg(feature = "mysql")]
pub use crate::mysql::MysqlConnector;
