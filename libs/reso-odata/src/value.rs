//! `OData` literal values
//!
//! [`ODataValue`] is the closed set of host values a condition can carry.
//! [`format_value`] renders one as `OData` literal syntax:
//!
//! | value | literal |
//! |---|---|
//! | string | `'O''Brien'` (single-quoted, quotes doubled) |
//! | integer / float | `500000`, `99.5` |
//! | bool | `true` / `false` |
//! | null | `null` |
//! | date | `2026-02-04` |
//! | date-time | `2026-02-04T12:30:00Z` (always UTC) |
//! | raw | verbatim |

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

#[derive(Clone, Debug, PartialEq)]
pub enum ODataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Emitted as-is. Used for numbers outside `i64` and for values that are
    /// already in literal form.
    Raw(String),
}

impl ODataValue {
    /// Wrap text that must be emitted without quoting.
    pub fn raw(text: impl Into<String>) -> Self {
        ODataValue::Raw(text.into())
    }

    /// Render as an `OData` literal. Same as [`format_value`].
    #[must_use]
    pub fn to_literal(&self) -> String {
        format_value(self)
    }

    /// The string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ODataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ODataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_value(self))
    }
}

/// Render a value as an `OData` literal.
#[must_use]
pub fn format_value(value: &ODataValue) -> String {
    match value {
        ODataValue::Null => "null".to_owned(),
        ODataValue::Bool(b) => b.to_string(),
        ODataValue::Int(i) => i.to_string(),
        ODataValue::Float(f) => format_float(*f),
        ODataValue::String(s) => quote(s),
        ODataValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        ODataValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ODataValue::Raw(s) => s.clone(),
    }
}

/// Single-quote a string literal, doubling embedded quotes.
#[must_use]
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_owned()
    } else if f.is_infinite() {
        let keyword = if f.is_sign_positive() { "INF" } else { "-INF" };
        keyword.to_owned()
    } else {
        ryu::Buffer::new().format_finite(f).to_owned()
    }
}

impl From<&str> for ODataValue {
    fn from(s: &str) -> Self {
        ODataValue::String(s.to_owned())
    }
}

impl From<String> for ODataValue {
    fn from(s: String) -> Self {
        ODataValue::String(s)
    }
}

impl From<&String> for ODataValue {
    fn from(s: &String) -> Self {
        ODataValue::String(s.clone())
    }
}

impl From<bool> for ODataValue {
    fn from(b: bool) -> Self {
        ODataValue::Bool(b)
    }
}

macro_rules! from_lossless_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ODataValue {
                fn from(v: $t) -> Self {
                    ODataValue::Int(i64::from(v))
                }
            }
        )*
    };
}

from_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for ODataValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or_else(|_| ODataValue::Raw(v.to_string()), ODataValue::Int)
    }
}

impl From<usize> for ODataValue {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or_else(|_| ODataValue::Raw(v.to_string()), ODataValue::Int)
    }
}

impl From<f64> for ODataValue {
    fn from(v: f64) -> Self {
        ODataValue::Float(v)
    }
}

impl From<f32> for ODataValue {
    // Widening to f64 would print the binary expansion (0.1 -> 0.10000000149011612).
    fn from(v: f32) -> Self {
        if v.is_finite() {
            ODataValue::Raw(ryu::Buffer::new().format_finite(v).to_owned())
        } else {
            ODataValue::Float(f64::from(v))
        }
    }
}

impl From<NaiveDate> for ODataValue {
    fn from(d: NaiveDate) -> Self {
        ODataValue::Date(d)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for ODataValue {
    fn from(dt: DateTime<Tz>) -> Self {
        ODataValue::DateTime(dt.with_timezone(&Utc))
    }
}

/// Naive timestamps are taken to be UTC.
impl From<NaiveDateTime> for ODataValue {
    fn from(dt: NaiveDateTime) -> Self {
        ODataValue::DateTime(dt.and_utc())
    }
}

impl<T: Into<ODataValue>> From<Option<T>> for ODataValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ODataValue::Null, Into::into)
    }
}

impl From<&serde_json::Value> for ODataValue {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => ODataValue::Null,
            Value::Bool(b) => ODataValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ODataValue::Int(i)
                } else if let Some(f) = n.as_f64()
                    && n.is_f64()
                {
                    ODataValue::Float(f)
                } else {
                    ODataValue::Raw(n.to_string())
                }
            }
            Value::String(s) => ODataValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => ODataValue::Raw(v.to_string()),
        }
    }
}

impl From<serde_json::Value> for ODataValue {
    fn from(v: serde_json::Value) -> Self {
        ODataValue::from(&v)
    }
}
