use tracing::debug;

use crate::error::SqlClusterError;
use crate::sql_builder::statement;
use crate::types::RowValues;

use super::Client;
use super::crud::{run, update_statement};

/// How [`Client::upsert`] reconciles an existing row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpsertMode {
    /// One `INSERT ... ON DUPLICATE KEY UPDATE` statement.
    Native,
    /// UPDATE, then INSERT when nothing matched, then UPDATE again if the
    /// INSERT lost a race to another writer.
    #[default]
    Portable,
}

impl Client {
    /// Insert the row keyed by `pk`, or update its `fields` if it exists.
    ///
    /// Every statement of one call runs on the same master. The portable
    /// mode reports the affected-row count of the last statement it ran, so
    /// repeating an identical upsert returns 0 once the row is in place
    /// (unless the session reports found rows).
    ///
    /// # Arguments
    ///
    /// * `table` - Target table
    /// * `pk` - Key columns and values identifying the row; must not be empty
    /// * `fields` - Columns to write besides the key
    /// * `mode` - [`UpsertMode::Native`] or [`UpsertMode::Portable`]
    ///
    /// # Returns
    ///
    /// The affected-row count reported for the last statement run
    ///
    /// # Errors
    /// `SqlClusterError::ProgrammingError` for an empty `pk`; host errors
    /// other than the duplicate-key conflict the portable mode absorbs.
    pub async fn upsert<K: AsRef<str>>(
        &self,
        table: &str,
        pk: &[(K, RowValues)],
        fields: &[(K, RowValues)],
        mode: UpsertMode,
    ) -> Result<u64, SqlClusterError> {
        if pk.is_empty() {
            return Err(SqlClusterError::ProgrammingError(format!(
                "upsert into `{table}` needs a primary key"
            )));
        }

        let host = self.master()?;
        let columns: Vec<&str> = pk.iter().chain(fields).map(|(c, _)| c.as_ref()).collect();
        let values: Vec<RowValues> = pk.iter().chain(fields).map(|(_, v)| v.clone()).collect();

        match mode {
            UpsertMode::Native => {
                // With nothing to update, re-assign the key to itself so the
                // statement still tolerates an existing row.
                let source = if fields.is_empty() { pk } else { fields };
                let on_duplicate: Vec<(String, RowValues)> = source
                    .iter()
                    .map(|(c, v)| (c.as_ref().to_string(), v.clone()))
                    .collect();
                let stmt = statement::insert(table, &columns, values, &on_duplicate);
                run(&host, &stmt).await
            }
            UpsertMode::Portable => {
                let update = if fields.is_empty() {
                    None
                } else {
                    Some(update_statement(table, pk, fields)?)
                };

                if let Some(update) = &update {
                    let affected = run(&host, update).await?;
                    if affected > 0 {
                        return Ok(affected);
                    }
                }

                let insert = statement::insert(table, &columns, values, &[]);
                match run(&host, &insert).await {
                    Ok(affected) => Ok(affected),
                    Err(err) if err.is_duplicate_key() => {
                        debug!(table, host = %host.host(), "upsert insert conflicted, updating");
                        match &update {
                            Some(update) => run(&host, update).await,
                            None => Ok(0),
                        }
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }
}
