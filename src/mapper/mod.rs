//! Descriptor-driven mapping between record types and SQL columns.
//!
//! Two extraction policies coexist:
//! - [`MappingMode::Strict`] (typed fetches): every declared field must carry
//!   a `db` tag, otherwise the whole mapping fails.
//! - [`MappingMode::Lenient`] (generic name/value helpers): untagged fields
//!   fall back to their `json` name, or are skipped.
//!
//! Columns, encoded values, and decode targets all come from the same ordered
//! field list, so a generated column list always lines up with its values.

mod convert;
mod descriptor;

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};

pub use convert::{FromSqlValue, ToSqlValue};
pub use descriptor::{FieldColumn, FieldDescriptor, Getter, RecordDescriptor, Setter, SqlRecord};

use crate::error::SqlClusterError;
use crate::results::CustomDbRow;
use crate::sql_builder::quote_column;
use crate::types::RowValues;

/// Field extraction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMode {
    Strict,
    Lenient,
}

/// The mapped view of a record type under one policy.
pub struct RecordMapping<T: 'static> {
    type_name: &'static str,
    names: Vec<&'static str>,
    columns: Vec<String>,
    fields: Vec<&'static FieldDescriptor<T>>,
}

impl<T: SqlRecord> RecordMapping<T> {
    /// Walk `T`'s field table once and keep the mapped fields in declared order.
    ///
    /// # Errors
    /// Returns `SqlClusterError::MappingError` when strict mode meets an
    /// untagged field.
    pub fn of(mode: MappingMode) -> Result<Self, SqlClusterError> {
        let descriptor = T::descriptor();
        let mut names = Vec::with_capacity(descriptor.fields().len());
        let mut fields = Vec::with_capacity(descriptor.fields().len());

        for field in descriptor.fields() {
            if let FieldColumn::Column(name) = field.resolve(mode, descriptor.type_name())? {
                names.push(name);
                fields.push(field);
            }
        }

        Ok(Self {
            type_name: descriptor.type_name(),
            columns: names.iter().map(|name| quote_column(name)).collect(),
            names,
            fields,
        })
    }

    /// Drop one column (typically the auto-increment key) from the mapping.
    #[must_use]
    pub fn without(mut self, column: &str) -> Self {
        if let Some(pos) = self.names.iter().position(|name| *name == column) {
            self.names.remove(pos);
            self.columns.remove(pos);
            self.fields.remove(pos);
        }
        self
    }

    /// Backtick-quoted column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw column names, as declared in the tags.
    #[must_use]
    pub fn column_names(&self) -> &[&'static str] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode the mapped fields of `record` as statement parameters.
    ///
    /// # Errors
    /// Returns `SqlClusterError::MappingPanic` if a field getter panics.
    pub fn values(&self, record: &T) -> Result<Vec<RowValues>, SqlClusterError> {
        recover(self.type_name, || {
            Ok(self.fields.iter().map(|field| field.get(record)).collect())
        })
    }

    /// Decode a row whose columns were selected in this mapping's order.
    ///
    /// # Errors
    /// Returns `SqlClusterError::MappingError` if the row is narrower than the
    /// mapping or a value does not fit its field, and
    /// `SqlClusterError::MappingPanic` if a setter panics.
    pub fn decode(&self, row: CustomDbRow) -> Result<T, SqlClusterError> {
        if row.rows.len() < self.fields.len() {
            return Err(SqlClusterError::MappingError(format!(
                "row has {} columns, `{}` maps {}",
                row.rows.len(),
                self.type_name,
                self.fields.len()
            )));
        }

        recover(self.type_name, || {
            let mut record = T::default();
            for (field, value) in self.fields.iter().zip(row.rows) {
                field.set(&mut record, value).map_err(|err| match err {
                    SqlClusterError::MappingError(msg) => SqlClusterError::MappingError(format!(
                        "{}.{}: {msg}",
                        self.type_name,
                        field.name()
                    )),
                    other => other,
                })?;
            }
            Ok(record)
        })
    }
}

/// Column names of `T` under the lenient policy.
///
/// # Errors
/// Propagates mapping failures; the lenient policy itself never rejects a field.
pub fn field_names<T: SqlRecord>() -> Result<Vec<&'static str>, SqlClusterError> {
    Ok(RecordMapping::<T>::of(MappingMode::Lenient)?.names)
}

/// Values of `record` under the lenient policy, aligned with [`field_names`].
///
/// # Errors
/// Returns `SqlClusterError::MappingPanic` if a getter panics.
pub fn field_values<T: SqlRecord>(record: &T) -> Result<Vec<RowValues>, SqlClusterError> {
    RecordMapping::<T>::of(MappingMode::Lenient)?.values(record)
}

/// `(column, value)` pairs of `record` under the lenient policy.
///
/// # Errors
/// Returns `SqlClusterError::MappingPanic` if a getter panics.
pub fn field_pairs<T: SqlRecord>(
    record: &T,
) -> Result<Vec<(&'static str, RowValues)>, SqlClusterError> {
    let mapping = RecordMapping::<T>::of(MappingMode::Lenient)?;
    let values = mapping.values(record)?;
    Ok(mapping.names.into_iter().zip(values).collect())
}

/// Run mapping code, turning a panic into an ordinary error with a backtrace.
pub(crate) fn recover<R>(
    type_name: &str,
    f: impl FnOnce() -> Result<R, SqlClusterError>,
) -> Result<R, SqlClusterError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(SqlClusterError::MappingPanic {
            message: format!("mapping `{type_name}`: {}", panic_message(payload.as_ref())),
            backtrace: Backtrace::force_capture().to_string(),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sql_record;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Account {
        id: i64,
        email: String,
        nickname: Option<String>,
        scratch: u32,
    }

    sql_record!(Account {
        id(db = "id"),
        email(db = "email", json = "email"),
        nickname(json = "nick,omitempty"),
        scratch,
    });

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Tagged {
        id: u64,
        name: String,
        cache: Vec<u8>,
    }

    sql_record!(Tagged {
        id(db = "id"),
        name(db = "name"),
        cache(db = "-"),
    });

    #[derive(Debug, Default)]
    struct Fragile {
        value: i64,
    }

    sql_record!(Fragile { value(db = "value") });

    #[test]
    fn strict_rejects_untagged_fields() {
        let err = RecordMapping::<Account>::of(MappingMode::Strict).err().unwrap();
        assert!(matches!(err, SqlClusterError::MappingError(msg) if msg.contains("nickname")));
    }

    #[test]
    fn strict_honors_explicit_skip() {
        let mapping = RecordMapping::<Tagged>::of(MappingMode::Strict).unwrap();
        assert_eq!(mapping.columns(), ["`id`", "`name`"]);
    }

    #[test]
    fn lenient_falls_back_to_json_name() {
        assert_eq!(field_names::<Account>().unwrap(), ["id", "email", "nick"]);

        let account = Account {
            id: 9,
            email: "a@b.c".into(),
            nickname: None,
            scratch: 4,
        };
        assert_eq!(
            field_values(&account).unwrap(),
            [RowValues::Int(9), RowValues::Text("a@b.c".into()), RowValues::Null]
        );
    }

    #[test]
    fn decode_is_positional() {
        let mapping = RecordMapping::<Tagged>::of(MappingMode::Strict).unwrap();
        let row = CustomDbRow::new(
            Arc::new(vec!["id".into(), "name".into()]),
            vec![RowValues::Int(3), RowValues::Text("x".into())],
        );
        let decoded = mapping.decode(row).unwrap();
        assert_eq!(
            decoded,
            Tagged {
                id: 3,
                name: "x".into(),
                cache: Vec::new(),
            }
        );
    }

    #[test]
    fn decode_reports_the_failing_field() {
        let mapping = RecordMapping::<Tagged>::of(MappingMode::Strict).unwrap();
        let row = CustomDbRow::new(
            Arc::new(vec!["id".into(), "name".into()]),
            vec![RowValues::Int(-1), RowValues::Text("x".into())],
        );
        let err = mapping.decode(row).unwrap_err();
        assert!(matches!(err, SqlClusterError::MappingError(msg) if msg.starts_with("Tagged.id")));
    }

    #[test]
    fn without_drops_the_auto_increment_column() {
        let mapping = RecordMapping::<Tagged>::of(MappingMode::Strict)
            .unwrap()
            .without("id");
        assert_eq!(mapping.column_names(), ["name"]);
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn panics_become_errors() {
        let err = recover::<()>("Fragile", || panic!("boom")).unwrap_err();
        match err {
            SqlClusterError::MappingPanic { message, backtrace } => {
                assert!(message.contains("boom"));
                assert!(!backtrace.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let _ = Fragile { value: 1 }.value;
    }
}
