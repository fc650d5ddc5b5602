use crate::types::{ConditionValue, RowValues};

use super::escape::quote_column;

/// Build an AND-joined WHERE fragment (without the `WHERE` keyword) from
/// column/value pairs.
///
/// Scalars become `` `col`=? ``; lists become `` `col` IN (?,?) ``. Terms
/// follow the iteration order of `filter`, which for a `HashMap` is
/// unspecified: the generated SQL is equivalent either way, but pass a
/// `BTreeMap` or a `Vec` when the exact text matters (logs, tests).
///
/// An empty list yields `1=0` so the statement matches nothing rather than
/// becoming invalid SQL.
pub fn build_where<I, K, V>(filter: I) -> (String, Vec<RowValues>)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<ConditionValue>,
{
    let mut terms = Vec::new();
    let mut values = Vec::new();

    for (column, value) in filter {
        let column = quote_column(column.as_ref());
        match value.into() {
            ConditionValue::Single(value) => {
                terms.push(format!("{column}=?"));
                values.push(value);
            }
            ConditionValue::List(list) if list.is_empty() => terms.push("1=0".to_string()),
            ConditionValue::List(list) => {
                terms.push(format!("{column} IN ({})", placeholders(list.len())));
                values.extend(list);
            }
        }
    }

    (terms.join(" AND "), values)
}

/// `n` comma-separated `?` placeholders.
#[must_use]
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
