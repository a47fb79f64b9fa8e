use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Values handed to injectors, stored in live cells and returned in rows.
///
/// The same enum carries raw caller input, coerced bind values and fetched column
/// values, so helper code never has to branch on driver types:
/// ```rust
/// use sql_bindery::prelude::*;
///
/// let values = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
///     SqlValue::from(None::<i64>),
/// ];
/// assert!(values[3].is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
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
    /// JSON value; only scalars are accepted as bind input
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null) || matches!(self, Self::Json(JsonValue::Null))
    }

    /// Whether the value can be bound as a single scalar.
    ///
    /// JSON arrays and objects are aggregates and cannot.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Json(JsonValue::Array(_) | JsonValue::Object(_)))
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let SqlValue::Bool(value) = self {
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
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
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
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Render the value as JSON. Blobs become lowercase hex strings.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Float(f) => JsonValue::from(*f),
            SqlValue::Text(s) => JsonValue::String(s.clone()),
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Timestamp(dt) => JsonValue::String(dt.format("%F %T%.f").to_string()),
            SqlValue::Null => JsonValue::Null,
            SqlValue::Json(v) => v.clone(),
            SqlValue::Blob(bytes) => JsonValue::String(hex(bytes)),
        }
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

macro_rules! sql_value_from {
    ($($t:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl From<$t> for SqlValue {
                fn from(value: $t) -> Self {
                    SqlValue::$variant($conv(value))
                }
            }
        )*
    };
}

sql_value_from! {
    i64 => Int via std::convert::identity,
    i32 => Int via i64::from,
    i16 => Int via i64::from,
    u32 => Int via i64::from,
    u16 => Int via i64::from,
    u8 => Int via i64::from,
    f64 => Float via std::convert::identity,
    f32 => Float via f64::from,
    bool => Bool via std::convert::identity,
    String => Text via std::convert::identity,
    &str => Text via str::to_string,
    Vec<u8> => Blob via std::convert::identity,
    &[u8] => Blob via <[u8]>::to_vec,
    NaiveDateTime => Timestamp via std::convert::identity,
    JsonValue => Json via std::convert::identity,
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// Semantic type of an injected value; decides casting and the backend parameter kind.
///
/// Names parse case-insensitively, with `double`, `num` and `numeric` as aliases of
/// `float`. Unrecognized names fall back to `str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum SemanticType {
    Int,
    #[default]
    Str,
    #[value(alias = "double", alias = "num", alias = "numeric")]
    Float,
    Bool,
    Binary,
    #[value(name = "bigint", alias = "big-int")]
    BigInt,
    Null,
}

impl SemanticType {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        <Self as ValueEnum>::from_str(name.trim(), true).unwrap_or(Self::Str)
    }
}

/// Parameter kind handed to the backend binding API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Null,
    Int,
    Bool,
    Str,
    /// Uninterpreted bytes.
    Lob,
    /// Arbitrary-precision integer carried as decimal text.
    BigInt,
}

/// How an IN or INOUT value reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindMode {
    /// Escaped and substituted into the SQL text.
    Inline,
    /// Copied into the prepared handle once.
    ByValue,
    /// Bound as a live alias the handle re-reads at execute time.
    ByReference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_type_names_and_aliases() {
        assert_eq!(SemanticType::from_name("int"), SemanticType::Int);
        assert_eq!(SemanticType::from_name("DOUBLE"), SemanticType::Float);
        assert_eq!(SemanticType::from_name("numeric"), SemanticType::Float);
        assert_eq!(SemanticType::from_name("bigint"), SemanticType::BigInt);
        assert_eq!(SemanticType::from_name("binary"), SemanticType::Binary);
        assert_eq!(SemanticType::from_name("varchar"), SemanticType::Str);
    }

    #[test]
    fn scalar_detection() {
        assert!(SqlValue::from("x").is_scalar());
        assert!(SqlValue::Json(serde_json::json!(3)).is_scalar());
        assert!(!SqlValue::Json(serde_json::json!([1, 2])).is_scalar());
        assert!(!SqlValue::Json(serde_json::json!({"a": 1})).is_scalar());
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(5_i32)), SqlValue::Int(5));
    }
}
