//! Typed values exchanged with the caller.
//!
//! A [`Value`] is what a constant in a predicate serializes from, and what a
//! bound literal or URI in a result row converts into.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;

/// A typed scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    /// A string with a language tag, e.g. `"Hallo"@de`.
    LangString {
        text: String,
        lang: String,
    },
    DateTime(DateTime<Utc>),
    Duration(TimeDelta),
    /// Binary data, serialized as `xsd:hexBinary`.
    Bytes(Vec<u8>),
    /// A URI or a blank node identifier (`_:` prefix).
    Uri(String),
    /// A literal whose datatype has no native counterpart.
    Typed {
        lexical: String,
        datatype: String,
    },
}

impl Value {
    pub fn string(text: &str) -> Self {
        Value::String(text.to_string())
    }

    pub fn uri(uri: &str) -> Self {
        Value::Uri(uri.to_string())
    }

    pub fn lang_string(text: &str, lang: &str) -> Self {
        Value::LangString {
            text: text.to_string(),
            lang: lang.to_string(),
        }
    }

    /// Whether this value names a resource rather than a literal.
    pub fn is_resource(&self) -> bool {
        matches!(self, Value::Uri(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::LangString { text, lang } => write!(f, "\"{text}\"@{lang}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{d}"),
            Value::Bytes(b) => write!(f, "{} bytes", b.len()),
            Value::Uri(u) => write!(f, "<{u}>"),
            Value::Typed { lexical, datatype } => write!(f, "\"{lexical}\"^^<{datatype}>"),
        }
    }
}

/// Conversion from a result value into a native type.
///
/// Returns `None` when the value has a different type; the executor skips
/// such values the same way a type filter over a heterogeneous sequence would.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::LangString { text, .. } => Some(text.clone()),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::UInt(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Decimal(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Decimal(d) => Some(*d),
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::UInt(u) => Some(Decimal::from(*u)),
            _ => None,
        }
    }
}

impl FromValue for TimeDelta {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_value_matches_type() {
        assert_eq!(String::from_value(&Value::string("a")), Some("a".into()));
        assert_eq!(
            String::from_value(&Value::lang_string("Hallo", "de")),
            Some("Hallo".into())
        );
        assert_eq!(String::from_value(&Value::Int(1)), None);
        assert_eq!(bool::from_value(&Value::Bool(true)), Some(true));
        assert_eq!(i64::from_value(&Value::Int(-4)), Some(-4));
        assert_eq!(i64::from_value(&Value::UInt(u64::MAX)), None);
        assert_eq!(i32::from_value(&Value::Int(69)), Some(69));
        assert_eq!(u64::from_value(&Value::Int(-1)), None);
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(f64::from_value(&Value::Int(3)), Some(3.0));
        assert_eq!(
            f64::from_value(&Value::Decimal(Decimal::new(105, 1))),
            Some(10.5)
        );
        assert_eq!(Decimal::from_value(&Value::Int(7)), Some(Decimal::from(7)));
        assert_eq!(Decimal::from_value(&Value::Float(1.5)), None);
    }

    #[test]
    fn test_datetime_from_value() {
        let dt = Utc.with_ymd_and_hms(1948, 2, 4, 0, 0, 0).unwrap();
        assert_eq!(DateTime::<Utc>::from_value(&Value::DateTime(dt)), Some(dt));
        assert_eq!(DateTime::<Utc>::from_value(&Value::string("x")), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::uri("http://ex.org/a").to_string(), "<http://ex.org/a>");
        assert_eq!(Value::lang_string("a", "en").to_string(), "\"a\"@en");
        assert!(Value::uri("_:b0").is_resource());
        assert!(!Value::Int(0).is_resource());
    }
}
