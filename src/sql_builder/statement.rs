//! Statement text for the typed client operations.
//!
//! Shapes are stable, since callers match them in logs and tests:
//! - ``INSERT INTO `t`(`c1`,`c2`) VALUES (?,?)`` optionally followed by
//!   `` ON DUPLICATE KEY UPDATE `c1`=?,...``
//! - ``UPDATE `t` SET `c1`=? WHERE `pk`=? AND ...``
//! - ``DELETE FROM `t` WHERE <fragment>``
//! - ``SELECT `c1`,`c2` FROM `t`<clause>``

use crate::types::{QueryAndParams, RowValues};

use super::condition::BuiltCondition;
use super::escape::{quote_column, quote_table};
use super::where_clause::placeholders;

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_column(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn assignments<S: AsRef<str>>(columns: &[S], sep: &str) -> String {
    columns
        .iter()
        .map(|c| format!("{}=?", quote_column(c.as_ref())))
        .collect::<Vec<_>>()
        .join(sep)
}

/// `INSERT INTO` with an optional `ON DUPLICATE KEY UPDATE` tail.
#[must_use]
pub fn insert<S: AsRef<str>>(
    table: &str,
    columns: &[S],
    values: Vec<RowValues>,
    on_duplicate: &[(String, RowValues)],
) -> QueryAndParams {
    let mut sql = format!(
        "INSERT INTO {}({}) VALUES ({})",
        quote_table(table),
        column_list(columns),
        placeholders(columns.len())
    );
    let mut params = values;

    if !on_duplicate.is_empty() {
        let names: Vec<&str> = on_duplicate.iter().map(|(c, _)| c.as_str()).collect();
        sql.push_str(" ON DUPLICATE KEY UPDATE ");
        sql.push_str(&assignments(&names, ","));
        params.extend(on_duplicate.iter().map(|(_, v)| v.clone()));
    }

    QueryAndParams::new(sql, params)
}

/// `UPDATE ... SET ... WHERE <fragment>`; `fragment` must be non-empty.
#[must_use]
pub fn update(
    table: &str,
    set: &[(String, RowValues)],
    fragment: &str,
    filter_values: Vec<RowValues>,
) -> QueryAndParams {
    let names: Vec<&str> = set.iter().map(|(c, _)| c.as_str()).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {fragment}",
        quote_table(table),
        assignments(&names, ",")
    );
    let mut params: Vec<RowValues> = set.iter().map(|(_, v)| v.clone()).collect();
    params.extend(filter_values);
    QueryAndParams::new(sql, params)
}

/// `DELETE FROM ... WHERE <fragment>`.
#[must_use]
pub fn delete(table: &str, fragment: &str, values: Vec<RowValues>) -> QueryAndParams {
    QueryAndParams::new(
        format!("DELETE FROM {} WHERE {fragment}", quote_table(table)),
        values,
    )
}

/// `DELETE FROM <table><clause>` for a built condition.
#[must_use]
pub fn delete_where(built: &BuiltCondition) -> QueryAndParams {
    QueryAndParams::new(
        format!("DELETE FROM {}{}", built.quoted_table(), built.clause),
        built.values.clone(),
    )
}

/// `SELECT <columns> FROM <table><clause>` for a built condition.
#[must_use]
pub fn select<S: AsRef<str>>(columns: &[S], built: &BuiltCondition) -> QueryAndParams {
    QueryAndParams::new(
        format!(
            "SELECT {} FROM {}{}",
            column_list(columns),
            built.quoted_table(),
            built.clause
        ),
        built.values.clone(),
    )
}

/// `SELECT COUNT(*) FROM <table><clause>` for a built condition.
#[must_use]
pub fn count(built: &BuiltCondition) -> QueryAndParams {
    QueryAndParams::new(
        format!("SELECT COUNT(*) FROM {}{}", built.quoted_table(), built.clause),
        built.values.clone(),
    )
}
