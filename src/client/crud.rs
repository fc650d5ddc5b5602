use crate::error::SqlClusterError;
use crate::host::DbHost;
use crate::mapper::{MappingMode, RecordMapping, SqlRecord, field_pairs};
use crate::sql_builder::{BuildKind, BuiltCondition, SqlCondition, build_where, statement};
use crate::types::{ConditionValue, QueryAndParams, RowValues};

use super::Client;

/// Options for [`Client::insert`].
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    skip_column: Option<String>,
    on_duplicate_update: Vec<String>,
}

impl InsertOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave `column` out of the insert, typically an auto-increment key.
    #[must_use]
    pub fn with_skip_column(mut self, column: impl Into<String>) -> Self {
        self.skip_column = Some(column.into());
        self
    }

    /// Append `ON DUPLICATE KEY UPDATE` for these columns, using the record's
    /// values.
    #[must_use]
    pub fn with_on_duplicate_update<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_duplicate_update = columns.into_iter().map(Into::into).collect();
        self
    }
}

impl Client {
    /// First row matching `built`, decoded with the strict policy.
    ///
    /// The statement carries whatever LIMIT `built` was rendered with, so a
    /// condition left at the default limit may transfer up to 300 rows to
    /// keep one. [`Client::find_one`] reads a single row.
    ///
    /// # Errors
    /// Mapping failures and host errors; no matching row is `Ok(None)`.
    pub async fn fetch_one<T: SqlRecord>(&self, built: &BuiltCondition) -> Result<Option<T>, SqlClusterError> {
        let mapping = RecordMapping::<T>::of(MappingMode::Strict)?;
        let stmt = statement::select(mapping.column_names(), built);
        match self.query_row(&stmt.query, &stmt.params).await.scan_mapped(&mapping) {
            Ok(record) => Ok(Some(record)),
            Err(SqlClusterError::NoRows) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Every row matching `built`, decoded with the strict policy.
    ///
    /// # Errors
    /// Mapping failures and host errors; no matching row is an empty list.
    pub async fn fetch_list<T: SqlRecord>(&self, built: &BuiltCondition) -> Result<Vec<T>, SqlClusterError> {
        let mapping = RecordMapping::<T>::of(MappingMode::Strict)?;
        let stmt = statement::select(mapping.column_names(), built);
        let rs = self.query(&stmt.query, &stmt.params).await?;
        rs.into_iter().map(|row| mapping.decode(row)).collect()
    }

    /// Validate `condition` as a read and fetch the matching rows of
    /// `table + suffix`.
    ///
    /// # Errors
    /// `SqlClusterError::UnsafeStatement` for an unbounded read, otherwise as
    /// [`Client::fetch_list`].
    pub async fn find<T: SqlRecord>(
        &self,
        condition: &SqlCondition,
        suffix: &str,
    ) -> Result<Vec<T>, SqlClusterError> {
        condition.validate(BuildKind::Read)?;
        self.fetch_list(&condition.build(suffix)).await
    }

    /// Validate `condition` as a read and fetch the first matching row of
    /// `table + suffix` with `LIMIT 1`.
    ///
    /// # Arguments
    /// * `condition` - filter, ordering and offset; its own limit is replaced
    /// * `suffix` - appended to the table name, for sharded tables
    ///
    /// # Returns
    /// The decoded record, or `None` when nothing matches.
    ///
    /// # Errors
    /// As [`Client::find`] and [`Client::fetch_one`].
    pub async fn find_one<T: SqlRecord>(
        &self,
        condition: &SqlCondition,
        suffix: &str,
    ) -> Result<Option<T>, SqlClusterError> {
        condition.validate(BuildKind::Read)?;
        let single = condition.clone().with_limit(1);
        self.fetch_one(&single.build(suffix)).await
    }

    /// `COUNT(*)` of the rows matching `built`.
    ///
    /// # Errors
    /// Host errors; an empty result counts as zero.
    pub async fn count(&self, built: &BuiltCondition) -> Result<i64, SqlClusterError> {
        let stmt = statement::count(built);
        let mut total: i64 = 0;
        match self.query_row(&stmt.query, &stmt.params).await.scan(&mut [&mut total]) {
            Ok(()) => Ok(total),
            Err(SqlClusterError::NoRows) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Insert `record` and return the generated auto-increment id (0 if none).
    ///
    /// Columns and values come from one lenient pass over the record's
    /// descriptor, so they always line up.
    ///
    /// # Errors
    /// `SqlClusterError::ProgrammingError` if an `on_duplicate_update` column
    /// is not mapped; host errors (including duplicate keys) unchanged.
    pub async fn insert<T: SqlRecord>(
        &self,
        table: &str,
        record: &T,
        options: &InsertOptions,
    ) -> Result<u64, SqlClusterError> {
        let stmt = insert_statement(table, record, options)?;
        let res = self.master()?.exec(&stmt.query, &stmt.params).await?;
        Ok(res.last_insert_id.unwrap_or(0))
    }

    /// `UPDATE table SET fields WHERE pk`; returns affected rows.
    ///
    /// # Errors
    /// `SqlClusterError::ProgrammingError` when `pk` or `fields` is empty.
    pub async fn update<K: AsRef<str>>(
        &self,
        table: &str,
        pk: &[(K, RowValues)],
        fields: &[(K, RowValues)],
    ) -> Result<u64, SqlClusterError> {
        let stmt = update_statement(table, pk, fields)?;
        run(&*self.master()?, &stmt).await
    }

    /// Update the row of `record` identified by its `pk_columns`, setting
    /// every other mapped field.
    ///
    /// # Errors
    /// `SqlClusterError::ProgrammingError` when `pk_columns` is empty or names
    /// a column the record does not map.
    pub async fn update_record<T: SqlRecord>(
        &self,
        table: &str,
        pk_columns: &[&str],
        record: &T,
    ) -> Result<u64, SqlClusterError> {
        let (pk, fields): (Vec<_>, Vec<_>) = field_pairs(record)?
            .into_iter()
            .partition(|(column, _)| pk_columns.contains(column));
        if let Some(missing) = pk_columns.iter().find(|c| !pk.iter().any(|(p, _)| p == *c)) {
            return Err(SqlClusterError::ProgrammingError(format!(
                "primary key column `{missing}` is not mapped"
            )));
        }
        self.update(table, &pk, &fields).await
    }

    /// `DELETE FROM table WHERE filter`; returns affected rows.
    ///
    /// # Errors
    /// `SqlClusterError::UnsafeStatement` for an empty filter.
    pub async fn delete<I, K, V>(&self, table: &str, filter: I) -> Result<u64, SqlClusterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ConditionValue>,
    {
        let (fragment, values) = build_where(filter);
        if fragment.is_empty() {
            return Err(SqlClusterError::UnsafeStatement(format!(
                "refusing to delete every row of `{table}`"
            )));
        }
        let stmt = statement::delete(table, &fragment, values);
        run(&*self.master()?, &stmt).await
    }

    /// Delete the rows of `table + suffix` matching `condition`. Its ORDER BY
    /// and LIMIT apply; an offset cannot.
    ///
    /// # Errors
    /// `SqlClusterError::UnsafeStatement` without conditions,
    /// `SqlClusterError::ProgrammingError` with an offset.
    pub async fn delete_where(&self, condition: &SqlCondition, suffix: &str) -> Result<u64, SqlClusterError> {
        condition.validate(BuildKind::Mutating)?;
        if condition.offset() > 0 && condition.limit() > 0 {
            return Err(SqlClusterError::ProgrammingError(
                "DELETE does not accept an offset".to_string(),
            ));
        }
        let stmt = statement::delete_where(&condition.build(suffix));
        run(&*self.master()?, &stmt).await
    }
}

pub(super) async fn run(host: &DbHost, stmt: &QueryAndParams) -> Result<u64, SqlClusterError> {
    Ok(host.exec(&stmt.query, &stmt.params).await?.rows_affected)
}

fn insert_statement<T: SqlRecord>(
    table: &str,
    record: &T,
    options: &InsertOptions,
) -> Result<QueryAndParams, SqlClusterError> {
    let mut mapping = RecordMapping::<T>::of(MappingMode::Lenient)?;
    if let Some(skip) = &options.skip_column {
        mapping = mapping.without(skip);
    }
    let values = mapping.values(record)?;

    let mut on_duplicate = Vec::with_capacity(options.on_duplicate_update.len());
    for column in &options.on_duplicate_update {
        let pos = mapping
            .column_names()
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| {
                SqlClusterError::ProgrammingError(format!(
                    "on-duplicate column `{column}` is not an inserted column"
                ))
            })?;
        on_duplicate.push((column.clone(), values[pos].clone()));
    }

    Ok(statement::insert(table, mapping.column_names(), values, &on_duplicate))
}

pub(super) fn update_statement<K: AsRef<str>>(
    table: &str,
    pk: &[(K, RowValues)],
    fields: &[(K, RowValues)],
) -> Result<QueryAndParams, SqlClusterError> {
    if pk.is_empty() {
        return Err(SqlClusterError::ProgrammingError(format!(
            "update of `{table}` needs a primary key"
        )));
    }
    if fields.is_empty() {
        return Err(SqlClusterError::ProgrammingError(format!(
            "update of `{table}` has no fields to set"
        )));
    }
    let (fragment, filter_values) = build_where(pk.iter().map(|(c, v)| (c.as_ref(), v.clone())));
    let set: Vec<(String, RowValues)> = fields
        .iter()
        .map(|(c, v)| (c.as_ref().to_string(), v.clone()))
        .collect();
    Ok(statement::update(table, &set, &fragment, filter_values))
}
