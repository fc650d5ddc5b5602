//! `mysql_async` driver: one pool per host.

mod connection;
mod value;

pub use connection::{MysqlConnector, MysqlHost};
pub use value::{from_mysql_value, to_mysql_params, to_mysql_value};
