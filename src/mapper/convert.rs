use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::SqlClusterError;
use crate::types::RowValues;

/// Encode a field into a statement parameter.
pub trait ToSqlValue {
    fn to_sql_value(&self) -> RowValues;
}

/// Decode a column value into a field.
///
/// # Errors
/// Implementations return `SqlClusterError::MappingError` when the column value
/// cannot represent the target type (including NULL into a non-`Option` field).
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError>;
}

fn mismatch<T>(value: &RowValues) -> SqlClusterError {
    SqlClusterError::MappingError(format!(
        "cannot decode {value:?} into {}",
        std::any::type_name::<T>()
    ))
}

macro_rules! impl_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(&self) -> RowValues {
                    match i64::try_from(*self) {
                        Ok(v) => RowValues::Int(v),
                        Err(_) => RowValues::Text(self.to_string()),
                    }
                }
            }

            impl FromSqlValue for $ty {
                fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
                    match &value {
                        RowValues::Int(i) => <$ty>::try_from(*i).map_err(|_| mismatch::<$ty>(&value)),
                        RowValues::Bool(b) => Ok(<$ty>::from(*b)),
                        RowValues::Text(s) => s.trim().parse::<$ty>().map_err(|_| mismatch::<$ty>(&value)),
                        _ => Err(mismatch::<$ty>(&value)),
                    }
                }
            }
        )*
    };
}

impl_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> RowValues {
        RowValues::Float(*self)
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        match &value {
            RowValues::Text(s) => s.trim().parse().map_err(|_| mismatch::<f64>(&value)),
            other => other.as_float().ok_or_else(|| mismatch::<f64>(&value)),
        }
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(&self) -> RowValues {
        RowValues::Float(f64::from(*self))
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        f64::from_sql_value(value).map(|v| v as f32)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> RowValues {
        RowValues::Bool(*self)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        match &value {
            RowValues::Bool(b) => Ok(*b),
            RowValues::Int(i) => Ok(*i != 0),
            RowValues::Text(s) => match s.trim() {
                "1" | "true" | "TRUE" => Ok(true),
                "0" | "false" | "FALSE" => Ok(false),
                _ => Err(mismatch::<bool>(&value)),
            },
            _ => Err(mismatch::<bool>(&value)),
        }
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> RowValues {
        RowValues::Text(self.clone())
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(&self) -> RowValues {
        RowValues::Text((*self).to_string())
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        match value {
            RowValues::Text(s) => Ok(s),
            RowValues::Blob(bytes) => String::from_utf8(bytes)
                .map_err(|e| SqlClusterError::MappingError(format!("invalid utf-8 text: {e}"))),
            RowValues::Int(i) => Ok(i.to_string()),
            RowValues::Float(f) => Ok(f.to_string()),
            RowValues::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
            RowValues::Timestamp(ts) => Ok(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            RowValues::JSON(json) => Ok(json.to_string()),
            RowValues::Null => Err(mismatch::<String>(&RowValues::Null)),
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> RowValues {
        RowValues::Blob(self.clone())
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        match value {
            RowValues::Blob(bytes) => Ok(bytes),
            RowValues::Text(s) => Ok(s.into_bytes()),
            other => Err(mismatch::<Vec<u8>>(&other)),
        }
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(&self) -> RowValues {
        RowValues::Timestamp(*self)
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        value
            .as_timestamp()
            .ok_or_else(|| mismatch::<NaiveDateTime>(&value))
    }
}

impl ToSqlValue for JsonValue {
    fn to_sql_value(&self) -> RowValues {
        RowValues::JSON(self.clone())
    }
}

impl FromSqlValue for JsonValue {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        match value {
            RowValues::JSON(json) => Ok(json),
            RowValues::Null => Ok(JsonValue::Null),
            RowValues::Text(s) => serde_json::from_str(&s)
                .map_err(|e| SqlClusterError::MappingError(format!("invalid json: {e}"))),
            RowValues::Blob(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SqlClusterError::MappingError(format!("invalid json: {e}"))),
            other => Err(mismatch::<JsonValue>(&other)),
        }
    }
}

impl ToSqlValue for RowValues {
    fn to_sql_value(&self) -> RowValues {
        self.clone()
    }
}

impl FromSqlValue for RowValues {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        Ok(value)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> RowValues {
        match self {
            Some(inner) => inner.to_sql_value(),
            None => RowValues::Null,
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: RowValues) -> Result<Self, SqlClusterError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value).map(Some)
        }
    }
}
