//! SQL text assembly: escaping, WHERE fragments, the fluent condition
//! builder, and the statement shapes used by the client.

mod condition;
mod escape;
pub mod statement;
mod where_clause;

pub use condition::{BuildKind, BuiltCondition, DEFAULT_LIMIT, Direction, SqlCondition};
pub use escape::{escape_string, quote_column, quote_table};
pub use where_clause::{build_where, placeholders};
