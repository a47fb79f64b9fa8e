use rusqlite::types::Value;

use crate::types::{ParamKind, SqlValue};

/// Convert a coerced value to a rusqlite `Value`, honoring the parameter kind.
///
/// Big integers bind as `INTEGER` when they fit in 64 bits and as text otherwise.
#[must_use]
pub fn to_sqlite_value(value: &SqlValue, kind: ParamKind) -> Value {
    match (kind, value) {
        (ParamKind::Null, _) | (_, SqlValue::Null) => Value::Null,
        (ParamKind::BigInt, SqlValue::Text(digits)) => digits
            .parse::<i64>()
            .map_or_else(|_| Value::Text(digits.clone()), Value::Integer),
        (ParamKind::Lob, SqlValue::Text(s)) => Value::Blob(s.clone().into_bytes()),
        (_, SqlValue::Int(i)) => Value::Integer(*i),
        (_, SqlValue::Float(f)) => Value::Real(*f),
        (_, SqlValue::Text(s)) => Value::Text(s.clone()),
        (_, SqlValue::Bool(b)) => Value::Integer(i64::from(*b)),
        (_, SqlValue::Timestamp(dt)) => Value::Text(dt.format("%F %T%.f").to_string()),
        (_, SqlValue::Json(json)) => Value::Text(json.to_string()),
        (_, SqlValue::Blob(bytes)) => Value::Blob(bytes.clone()),
    }
}
