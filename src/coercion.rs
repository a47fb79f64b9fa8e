//! Casting of raw caller values to a semantic type, and inline literal rendering.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::backend::Connection;
use crate::error::{BackendError, ValidationError};
use crate::types::{ParamKind, SemanticType, SqlValue};

lazy_static! {
    static ref LEADING_INT: Regex = Regex::new(r"^\s*[+-]?\d+").unwrap();
    static ref LEADING_FLOAT: Regex =
        Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").unwrap();
    static ref BIGINT: Regex = Regex::new(r"^-?\d+$").unwrap();
}

/// A value cast to its semantic type, with the parameter kind the backend binds it as.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: SqlValue,
    pub kind: ParamKind,
    pub ty: SemanticType,
}

impl Coerced {
    fn null(ty: SemanticType) -> Self {
        Self {
            value: SqlValue::Null,
            kind: ParamKind::Null,
            ty,
        }
    }
}

/// Cast `raw` to `ty`.
///
/// ```rust
/// use sql_bindery::coercion::coerce;
/// use sql_bindery::prelude::*;
///
/// let c = coerce(&SqlValue::from("12abc"), SemanticType::Int, false)?;
/// assert_eq!(c.value, SqlValue::Int(12));
/// assert_eq!(c.kind, ParamKind::Int);
///
/// let c = coerce(&SqlValue::Null, SemanticType::Int, true)?;
/// assert_eq!(c.kind, ParamKind::Null);
/// # Ok::<(), sql_bindery::error::ValidationError>(())
/// ```
///
/// # Errors
/// `InvalidValue` for aggregates and values that cannot be cast; `NotNullable` for a
/// null value without the nullable flag.
pub fn coerce(raw: &SqlValue, ty: SemanticType, nullable: bool) -> Result<Coerced, ValidationError> {
    if !raw.is_scalar() {
        return Err(ValidationError::InvalidValue(
            "scalar value expected, got an aggregate that cannot be converted to a string".into(),
        ));
    }
    if raw.is_null() {
        return if nullable || ty == SemanticType::Null {
            Ok(Coerced::null(ty))
        } else {
            Err(ValidationError::NotNullable)
        };
    }

    let (value, kind) = match ty {
        SemanticType::Null => return Ok(Coerced::null(ty)),
        SemanticType::Int => (SqlValue::Int(to_int(raw)?), ParamKind::Int),
        SemanticType::Bool => (SqlValue::Bool(to_bool(raw)), ParamKind::Bool),
        SemanticType::Float => {
            let f = to_float(raw)?;
            if !f.is_finite() {
                return Err(ValidationError::InvalidValue(format!(
                    "non-finite float {f}"
                )));
            }
            (SqlValue::Text(format!("{f}")), ParamKind::Str)
        }
        SemanticType::Binary => (SqlValue::Blob(to_bytes(raw)), ParamKind::Lob),
        SemanticType::BigInt => (SqlValue::Text(to_bigint(raw)?), ParamKind::BigInt),
        SemanticType::Str => (SqlValue::Text(to_text(raw)?), ParamKind::Str),
    };
    Ok(Coerced { value, kind, ty })
}

fn leading_int(s: &str) -> Result<i64, ValidationError> {
    match LEADING_INT.find(s) {
        Some(m) => m
            .as_str()
            .trim()
            .parse::<i64>()
            .map_err(|e| ValidationError::InvalidValue(format!("{s:?} is out of integer range: {e}"))),
        None => Ok(0),
    }
}

fn leading_float(s: &str) -> f64 {
    LEADING_FLOAT
        .find(s)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn utf8(bytes: &[u8]) -> Result<&str, ValidationError> {
    std::str::from_utf8(bytes)
        .map_err(|e| ValidationError::InvalidValue(format!("binary value is not valid UTF-8: {e}")))
}

fn float_to_int(f: f64) -> Result<i64, ValidationError> {
    #[allow(clippy::cast_precision_loss)]
    let (lo, hi) = (i64::MIN as f64, i64::MAX as f64);
    if !f.is_finite() || f >= hi || f < lo {
        return Err(ValidationError::InvalidValue(format!(
            "{f} cannot be cast to an integer"
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    let truncated = f.trunc() as i64;
    Ok(truncated)
}

fn flag(b: bool) -> String {
    String::from(if b { "1" } else { "0" })
}

fn to_int(raw: &SqlValue) -> Result<i64, ValidationError> {
    match raw {
        SqlValue::Int(i) => Ok(*i),
        SqlValue::Float(f) => float_to_int(*f),
        SqlValue::Bool(b) => Ok(i64::from(*b)),
        SqlValue::Text(s) => leading_int(s),
        SqlValue::Timestamp(dt) => Ok(dt.and_utc().timestamp()),
        SqlValue::Blob(bytes) => leading_int(utf8(bytes)?),
        SqlValue::Json(JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => Ok(i),
            None => float_to_int(n.as_f64().unwrap_or(f64::NAN)),
        },
        SqlValue::Json(JsonValue::Bool(b)) => Ok(i64::from(*b)),
        SqlValue::Json(JsonValue::String(s)) => leading_int(s),
        SqlValue::Null | SqlValue::Json(_) => Ok(0),
    }
}

fn to_float(raw: &SqlValue) -> Result<f64, ValidationError> {
    #[allow(clippy::cast_precision_loss)]
    let f = match raw {
        SqlValue::Int(i) => *i as f64,
        SqlValue::Float(f) => *f,
        SqlValue::Bool(b) => f64::from(u8::from(*b)),
        SqlValue::Text(s) => leading_float(s),
        SqlValue::Timestamp(dt) => dt.and_utc().timestamp() as f64,
        SqlValue::Blob(bytes) => leading_float(utf8(bytes)?),
        SqlValue::Json(JsonValue::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        SqlValue::Json(JsonValue::Bool(b)) => f64::from(u8::from(*b)),
        SqlValue::Json(JsonValue::String(s)) => leading_float(s),
        SqlValue::Null | SqlValue::Json(_) => 0.0,
    };
    Ok(f)
}

fn to_bool(raw: &SqlValue) -> bool {
    match raw {
        SqlValue::Int(i) => *i != 0,
        SqlValue::Float(f) => *f != 0.0,
        SqlValue::Bool(b) => *b,
        SqlValue::Text(s) => !(s.is_empty() || s == "0"),
        SqlValue::Timestamp(_) => true,
        SqlValue::Blob(bytes) => !(bytes.is_empty() || bytes == b"0"),
        SqlValue::Json(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        SqlValue::Json(JsonValue::Bool(b)) => *b,
        SqlValue::Json(JsonValue::String(s)) => !(s.is_empty() || s == "0"),
        SqlValue::Null | SqlValue::Json(_) => false,
    }
}

fn to_text(raw: &SqlValue) -> Result<String, ValidationError> {
    let text = match raw {
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => format!("{f}"),
        SqlValue::Bool(b) => flag(*b),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Timestamp(dt) => dt.format("%F %T%.f").to_string(),
        SqlValue::Blob(bytes) => utf8(bytes)?.to_string(),
        SqlValue::Json(JsonValue::String(s)) => s.clone(),
        SqlValue::Json(JsonValue::Bool(b)) => flag(*b),
        SqlValue::Json(JsonValue::Number(n)) => n.to_string(),
        SqlValue::Null | SqlValue::Json(_) => String::new(),
    };
    Ok(text)
}

fn to_bytes(raw: &SqlValue) -> Vec<u8> {
    match raw {
        SqlValue::Blob(bytes) => bytes.clone(),
        other => to_text(other).unwrap_or_default().into_bytes(),
    }
}

fn to_bigint(raw: &SqlValue) -> Result<String, ValidationError> {
    let text = match raw {
        SqlValue::Int(i) => return Ok(i.to_string()),
        SqlValue::Json(JsonValue::Number(n)) if n.is_i64() || n.is_u64() => return Ok(n.to_string()),
        SqlValue::Text(s) | SqlValue::Json(JsonValue::String(s)) => s.as_str(),
        SqlValue::Blob(bytes) => utf8(bytes)?,
        other => {
            return Err(ValidationError::InvalidValue(format!(
                "{other:?} is not a decimal integer"
            )));
        }
    };
    if BIGINT.is_match(text) {
        Ok(text.to_string())
    } else {
        Err(ValidationError::InvalidValue(format!(
            "{text:?} is not a decimal integer"
        )))
    }
}

/// Render a coerced value as a SQL literal for inline substitution.
///
/// Null renders as `NULL` without consulting the connection; numbers and booleans render
/// bare; strings and bytes go through the connection's quoting.
///
/// # Errors
/// Propagates the connection's quoting failure.
pub fn render_literal(coerced: &Coerced, conn: &dyn Connection) -> Result<String, BackendError> {
    match (&coerced.value, coerced.kind) {
        (SqlValue::Null, _) | (_, ParamKind::Null) => Ok("NULL".to_string()),
        (SqlValue::Int(i), _) => Ok(i.to_string()),
        (SqlValue::Bool(b), _) => Ok(flag(*b)),
        (SqlValue::Blob(bytes), _) => conn.quote_blob(bytes),
        (SqlValue::Text(s), ParamKind::BigInt) => Ok(s.clone()),
        (SqlValue::Text(s), _) if coerced.ty == SemanticType::Float => Ok(s.clone()),
        (SqlValue::Text(s), _) => conn.quote(s),
        (SqlValue::Float(f), _) => Ok(format!("{f}")),
        (SqlValue::Timestamp(dt), _) => conn.quote(&dt.format("%F %T%.f").to_string()),
        (SqlValue::Json(json), _) => conn.quote(&json.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeConnection;
    use chrono::NaiveDate;

    fn c(raw: impl Into<SqlValue>, ty: SemanticType) -> Coerced {
        coerce(&raw.into(), ty, false).unwrap()
    }

    #[test]
    fn int_takes_leading_digits_and_truncates() {
        assert_eq!(c("12abc", SemanticType::Int).value, SqlValue::Int(12));
        assert_eq!(c("abc", SemanticType::Int).value, SqlValue::Int(0));
        assert_eq!(c(" -7", SemanticType::Int).value, SqlValue::Int(-7));
        assert_eq!(c(3.9, SemanticType::Int).value, SqlValue::Int(3));
        assert_eq!(c(-3.9, SemanticType::Int).value, SqlValue::Int(-3));
        assert_eq!(c(true, SemanticType::Int).value, SqlValue::Int(1));

        let dt = NaiveDate::from_ymd_opt(1970, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(c(dt, SemanticType::Int).value, SqlValue::Int(86_400));
        assert_eq!(c(5, SemanticType::Int).kind, ParamKind::Int);
    }

    #[test]
    fn bool_truthiness() {
        for falsy in [SqlValue::from(""), SqlValue::from("0"), SqlValue::from(0), SqlValue::from(0.0)] {
            assert_eq!(c(falsy, SemanticType::Bool).value, SqlValue::Bool(false));
        }
        assert_eq!(c("no", SemanticType::Bool).value, SqlValue::Bool(true));
        assert_eq!(c(2, SemanticType::Bool).kind, ParamKind::Bool);
    }

    #[test]
    fn float_is_stringified() {
        let f = c("1.50xyz", SemanticType::Float);
        assert_eq!(f.value, SqlValue::Text("1.5".into()));
        assert_eq!(f.kind, ParamKind::Str);
        assert_eq!(c(10, SemanticType::Float).value, SqlValue::Text("10".into()));
        assert!(matches!(
            coerce(&SqlValue::Float(f64::NAN), SemanticType::Float, false),
            Err(ValidationError::InvalidValue(_))
        ));
    }

    #[test]
    fn bigint_accepts_only_decimal_strings() {
        let big = c("123456789012345678901234567890", SemanticType::BigInt);
        assert_eq!(big.value, SqlValue::Text("123456789012345678901234567890".into()));
        assert_eq!(big.kind, ParamKind::BigInt);
        assert_eq!(c(-5, SemanticType::BigInt).value, SqlValue::Text("-5".into()));
        assert!(coerce(&SqlValue::from("12a"), SemanticType::BigInt, false).is_err());
        assert!(coerce(&SqlValue::from(1.5), SemanticType::BigInt, false).is_err());
    }

    #[test]
    fn strings_binary_and_null() {
        assert_eq!(c(true, SemanticType::Str).value, SqlValue::Text("1".into()));
        assert_eq!(c(42, SemanticType::Str).value, SqlValue::Text("42".into()));
        assert_eq!(c("abc", SemanticType::Binary).value, SqlValue::Blob(b"abc".to_vec()));
        assert_eq!(c(vec![0_u8, 255], SemanticType::Binary).kind, ParamKind::Lob);
        assert!(coerce(&SqlValue::Blob(vec![0xff, 0xfe]), SemanticType::Str, false).is_err());

        assert_eq!(
            coerce(&SqlValue::Null, SemanticType::Str, false),
            Err(ValidationError::NotNullable)
        );
        assert_eq!(c("x", SemanticType::Null).kind, ParamKind::Null);
        assert_eq!(
            coerce(&SqlValue::Json(JsonValue::Null), SemanticType::Int, true)
                .unwrap()
                .kind,
            ParamKind::Null
        );
    }

    #[test]
    fn aggregates_are_rejected_before_null_checks() {
        let err = coerce(&SqlValue::Json(serde_json::json!({"a": 1})), SemanticType::Str, true);
        assert!(matches!(err, Err(ValidationError::InvalidValue(_))));
    }

    #[test]
    fn literals_render_by_kind() {
        let conn = FakeConnection::new();
        let lit = |raw: SqlValue, ty| render_literal(&coerce(&raw, ty, true).unwrap(), &conn).unwrap();

        assert_eq!(lit(SqlValue::Null, SemanticType::Str), "NULL");
        assert_eq!(lit(SqlValue::from("10"), SemanticType::Int), "10");
        assert_eq!(lit(SqlValue::from(true), SemanticType::Bool), "1");
        assert_eq!(lit(SqlValue::from(2.5), SemanticType::Float), "2.5");
        assert_eq!(lit(SqlValue::from("99"), SemanticType::BigInt), "99");
        assert_eq!(lit(SqlValue::from("O'Brien"), SemanticType::Str), "'O''Brien'");
        assert_eq!(lit(SqlValue::from(vec![0xab_u8]), SemanticType::Binary), "0xab");
        // null never reaches the quoting function
        assert_eq!(conn.quote_count(), 1);
    }

    #[test]
    fn uncoerced_values_still_render() {
        let conn = FakeConnection::new();
        let render = |value: SqlValue| {
            let coerced = Coerced {
                value,
                kind: ParamKind::Str,
                ty: SemanticType::Str,
            };
            render_literal(&coerced, &conn).unwrap()
        };
        assert_eq!(render(SqlValue::Float(0.5)), "0.5");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(render(SqlValue::Timestamp(dt)), "'2024-03-01 08:30:00'");
        assert_eq!(render(SqlValue::Json(serde_json::json!("x"))), "'\"x\"'");
    }
}
