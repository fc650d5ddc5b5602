use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_index};
use crate::types::RowValues;

/// A result set from a database query
///
/// Rows are fully materialized while the host deadline is still running, so a
/// `ResultSet` never holds a live driver cursor.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            column_names: None,
            column_index: None,
        }
    }

    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>) -> ResultSet {
        let mut rs = ResultSet::default();
        rs.set_column_names(Arc::new(column_names));
        rs
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(build_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set.
    ///
    /// Rows added before any column names are set get an empty header.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let column_names = self
            .column_names
            .get_or_insert_with(|| Arc::new(Vec::new()))
            .clone();
        let cache = self
            .column_index
            .get_or_insert_with(|| Arc::new(build_index(&column_names)))
            .clone();

        self.results.push(CustomDbRow {
            column_names,
            rows: row_values,
            column_index_cache: cache,
        });
    }

    /// Number of rows in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = CustomDbRow;
    type IntoIter = std::vec::IntoIter<CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_lookup() {
        let mut rs = ResultSet::with_columns(vec!["id".into(), "name".into()]);
        rs.add_row_values(vec![RowValues::Int(1), RowValues::Text("a".into())]);
        rs.add_row_values(vec![RowValues::Int(2), RowValues::Text("b".into())]);

        assert_eq!(rs.len(), 2);
        assert_eq!(rs.results[1].get("name"), Some(&RowValues::Text("b".into())));
        assert!(Arc::ptr_eq(
            &rs.results[0].column_index_cache,
            &rs.results[1].column_index_cache
        ));
    }
}
