use chrono::{NaiveDate, NaiveDateTime};
use mysql_async::{Params, Value};

use crate::types::RowValues;

/// Convert a driver value into a [`RowValues`].
///
/// Text protocol results arrive as bytes; they become `Text` when they are
/// valid UTF-8 and `Blob` otherwise. Unsigned values beyond `i64` keep their
/// decimal text.
#[must_use]
pub fn from_mysql_value(value: Value) -> RowValues {
    match value {
        Value::NULL => RowValues::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => RowValues::Text(text),
            Err(err) => RowValues::Blob(err.into_bytes()),
        },
        Value::Int(v) => RowValues::Int(v),
        Value::UInt(v) => i64::try_from(v).map_or_else(|_| RowValues::Text(v.to_string()), RowValues::Int),
        Value::Float(v) => RowValues::Float(f64::from(v)),
        Value::Double(v) => RowValues::Float(v),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|d| {
                    d.and_hms_micro_opt(u32::from(hour), u32::from(minute), u32::from(second), micros)
                })
                .map_or_else(
                    || {
                        RowValues::Text(format!(
                            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                        ))
                    },
                    RowValues::Timestamp,
                )
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            if micros == 0 {
                RowValues::Text(format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}"))
            } else {
                RowValues::Text(format!(
                    "{sign}{total_hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
                ))
            }
        }
    }
}

/// Convert a parameter into a driver value.
#[must_use]
pub fn to_mysql_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(v) => Value::Int(*v),
        RowValues::Float(v) => Value::Double(*v),
        RowValues::Text(v) => Value::Bytes(v.clone().into_bytes()),
        RowValues::Bool(v) => Value::Int(i64::from(*v)),
        RowValues::Timestamp(ts) => timestamp_value(ts),
        RowValues::Null => Value::NULL,
        RowValues::JSON(v) => Value::Bytes(v.to_string().into_bytes()),
        RowValues::Blob(v) => Value::Bytes(v.clone()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp_value(ts: &NaiveDateTime) -> Value {
    use chrono::{Datelike, Timelike};

    // Years outside 0..=9999 are not representable in DATETIME anyway.
    let year = u16::try_from(ts.year()).unwrap_or(0);
    Value::Date(
        year,
        ts.month() as u8,
        ts.day() as u8,
        ts.hour() as u8,
        ts.minute() as u8,
        ts.second() as u8,
        ts.nanosecond() / 1_000,
    )
}

/// Positional parameters for a statement.
#[must_use]
pub fn to_mysql_params(params: &[RowValues]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(to_mysql_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_blob_bytes() {
        assert_eq!(
            from_mysql_value(Value::Bytes(b"alice".to_vec())),
            RowValues::Text("alice".into())
        );
        assert_eq!(
            from_mysql_value(Value::Bytes(vec![0xff, 0xfe])),
            RowValues::Blob(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn large_unsigned_keeps_digits() {
        assert_eq!(from_mysql_value(Value::UInt(7)), RowValues::Int(7));
        assert_eq!(
            from_mysql_value(Value::UInt(u64::MAX)),
            RowValues::Text(u64::MAX.to_string())
        );
    }

    #[test]
    fn datetime_both_ways() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(12, 30, 0, 250_000)
            .unwrap();
        let value = to_mysql_value(&RowValues::Timestamp(ts));
        assert_eq!(value, Value::Date(2024, 3, 1, 12, 30, 0, 250_000));
        assert_eq!(from_mysql_value(value), RowValues::Timestamp(ts));
    }

    #[test]
    fn bools_bind_as_integers() {
        assert_eq!(to_mysql_value(&RowValues::Bool(true)), Value::Int(1));
        assert!(matches!(to_mysql_params(&[]), Params::Empty));
    }
}
