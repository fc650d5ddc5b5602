use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or used as query parameters.
///
/// Every statement the crate builds carries its arguments as `RowValues`, so
/// nothing is ever interpolated into SQL text:
/// ```rust
/// use sql_cluster::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // MySQL DATETIME text form, with and without fractional seconds
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            RowValues::Blob(bytes) => Some(bytes),
            RowValues::Text(text) => Some(text.as_bytes()),
            _ => None,
        }
    }
}

/// A value on the right-hand side of a WHERE term.
///
/// Scalars produce `` `col`=? ``; lists produce `` `col` IN (?,?,?) `` with
/// one placeholder per element.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Single(RowValues),
    List(Vec<RowValues>),
}

impl ConditionValue {
    /// Number of placeholders this value binds.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::List(values) => values.len(),
        }
    }
}

impl From<RowValues> for ConditionValue {
    fn from(value: RowValues) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<RowValues>> for ConditionValue {
    fn from(values: Vec<RowValues>) -> Self {
        Self::List(values)
    }
}

macro_rules! impl_condition_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ConditionValue {
                fn from(value: $ty) -> Self {
                    Self::Single(crate::mapper::ToSqlValue::to_sql_value(&value))
                }
            }

            impl From<Vec<$ty>> for ConditionValue {
                fn from(values: Vec<$ty>) -> Self {
                    Self::List(
                        values
                            .iter()
                            .map(crate::mapper::ToSqlValue::to_sql_value)
                            .collect(),
                    )
                }
            }
        )*
    };
}

impl_condition_value!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, NaiveDateTime);

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::Single(RowValues::Text(value.to_string()))
    }
}

impl From<Vec<&str>> for ConditionValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(
            values
                .into_iter()
                .map(|v| RowValues::Text(v.to_string()))
                .collect(),
        )
    }
}

/// A statement and its positional parameters bundled together.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAndParams {
    /// The SQL text, using `?` placeholders
    pub query: String,
    /// The parameters to be bound to the placeholders, in order
    pub params: Vec<RowValues>,
}

impl QueryAndParams {
    pub fn new(query: impl Into<String>, params: Vec<RowValues>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    pub fn new_without_params(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows affected (or matched, when the session uses `CLIENT_FOUND_ROWS`)
    pub rows_affected: u64,
    /// Auto-increment id generated by the statement, if any
    pub last_insert_id: Option<u64>,
}
