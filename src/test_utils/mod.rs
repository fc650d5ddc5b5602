//! Scripted in-memory hosts for exercising the client without a server.
//!
//! A [`MockConnection`] answers each call from a FIFO of queued replies,
//! then from an optional handler closure, then from a default reply, and
//! records every statement it sees.

mod connection;

pub use connection::{MockConnection, MockConnector, MockReply};

use crate::results::ResultSet;
use crate::types::RowValues;

/// Build a result set from column names and rows.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut rs = ResultSet::with_columns(columns.iter().map(|c| (*c).to_string()).collect());
    for row in rows {
        rs.add_row_values(row);
    }
    rs
}
