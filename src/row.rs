//! Deferred-error single-row reads.

use crate::error::SqlClusterError;
use crate::mapper::{FromSqlValue, MappingMode, RecordMapping, SqlRecord};
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

/// A scan destination.
pub trait ScanTarget {
    /// Store one column value.
    ///
    /// # Errors
    /// Returns `SqlClusterError::MappingError` if the value does not fit.
    fn scan_value(&mut self, value: RowValues) -> Result<(), SqlClusterError>;

    /// Destinations that would alias driver-owned memory.
    fn is_raw(&self) -> bool {
        false
    }
}

impl<T: FromSqlValue> ScanTarget for T {
    fn scan_value(&mut self, value: RowValues) -> Result<(), SqlClusterError> {
        *self = T::from_sql_value(value)?;
        Ok(())
    }
}

/// A view into the driver's buffer for one column.
///
/// Not supported by [`Row::scan`]: the row is released before `scan`
/// returns, so the bytes could not outlive it. Scan into `Vec<u8>` instead.
#[derive(Debug, Default)]
pub struct RawBytes<'a>(pub &'a [u8]);

impl ScanTarget for RawBytes<'_> {
    fn scan_value(&mut self, _value: RowValues) -> Result<(), SqlClusterError> {
        Err(raw_bytes_unsupported())
    }

    fn is_raw(&self) -> bool {
        true
    }
}

fn raw_bytes_unsupported() -> SqlClusterError {
    SqlClusterError::Unsupported("RawBytes cannot be scanned from a single-row read".to_string())
}

/// The result of a read meant to produce at most one row.
///
/// Holds either the error of the query itself or the rows it returned;
/// nothing is reported until [`scan`](Self::scan), so callers can tell a
/// failed query (`Err(e)`) from an empty one (`Err(NoRows)`).
#[derive(Debug)]
pub struct Row {
    inner: Result<std::vec::IntoIter<CustomDbRow>, SqlClusterError>,
}

impl From<Result<ResultSet, SqlClusterError>> for Row {
    fn from(result: Result<ResultSet, SqlClusterError>) -> Self {
        Self {
            inner: result.map(IntoIterator::into_iter),
        }
    }
}

impl Row {
    #[must_use]
    pub fn from_error(err: SqlClusterError) -> Self {
        Self { inner: Err(err) }
    }

    /// The captured query error, if any.
    #[must_use]
    pub fn err(&self) -> Option<&SqlClusterError> {
        self.inner.as_ref().err()
    }

    /// Take the first row, consuming the cursor.
    ///
    /// # Errors
    /// Returns the captured query error.
    pub fn into_first(self) -> Result<Option<CustomDbRow>, SqlClusterError> {
        let mut cursor = self.inner?;
        Ok(cursor.next())
    }

    /// Decode the first row positionally into `dest`.
    ///
    /// # Errors
    /// Returns the captured query error first; then `Unsupported` for a
    /// [`RawBytes`] destination, `NoRows` when the query matched nothing, and a
    /// `MappingError` when the destination count or a value does not fit.
    pub fn scan(self, dest: &mut [&mut dyn ScanTarget]) -> Result<(), SqlClusterError> {
        let mut cursor = self.inner?;
        if dest.iter().any(|d| d.is_raw()) {
            return Err(raw_bytes_unsupported());
        }
        let row = cursor.next().ok_or(SqlClusterError::NoRows)?;

        if row.len() != dest.len() {
            return Err(SqlClusterError::MappingError(format!(
                "expected {} destination arguments in scan, not {}",
                row.len(),
                dest.len()
            )));
        }
        for (target, value) in dest.iter_mut().zip(row.rows) {
            target.scan_value(value)?;
        }
        Ok(())
    }

    /// Decode the first row into a record whose columns were selected in
    /// `mapping` order.
    ///
    /// # Errors
    /// Same as [`scan`](Self::scan), plus mapping failures.
    pub fn scan_mapped<T: SqlRecord>(self, mapping: &RecordMapping<T>) -> Result<T, SqlClusterError> {
        let row = self.into_first()?.ok_or(SqlClusterError::NoRows)?;
        mapping.decode(row)
    }

    /// Decode the first row with the strict mapping of `T`.
    ///
    /// # Errors
    /// Same as [`scan_mapped`](Self::scan_mapped).
    pub fn scan_record<T: SqlRecord>(self) -> Result<T, SqlClusterError> {
        let mapping = RecordMapping::<T>::of(MappingMode::Strict)?;
        self.scan_mapped(&mapping)
    }
}
