//! XML Schema datatype mapping.
//!
//! Maps native [`Value`]s to XSD datatype URIs and lexical forms, and parses
//! `(lexical, datatype)` pairs from result sets back into values. Unknown
//! datatypes and lexical forms that do not parse are kept as
//! [`Value::Typed`] so nothing the store returns is lost.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use rust_decimal::Decimal;

use crate::value::Value;

pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const UNSIGNED_LONG: &str = "http://www.w3.org/2001/XMLSchema#unsignedLong";
pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const DURATION: &str = "http://www.w3.org/2001/XMLSchema#duration";
pub const HEX_BINARY: &str = "http://www.w3.org/2001/XMLSchema#hexBinary";
pub const ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";

/// The datatype URI a value is written with, or `None` for values that are
/// not typed literals (plain and language-tagged strings, URIs).
pub fn datatype_of(value: &Value) -> Option<&str> {
    match value {
        Value::Bool(_) => Some(BOOLEAN),
        Value::Int(_) => Some(LONG),
        Value::UInt(_) => Some(UNSIGNED_LONG),
        Value::Float(_) => Some(DOUBLE),
        Value::Decimal(_) => Some(DECIMAL),
        Value::DateTime(_) => Some(DATE_TIME),
        Value::Duration(_) => Some(DURATION),
        Value::Bytes(_) => Some(HEX_BINARY),
        Value::Typed { datatype, .. } => Some(datatype),
        Value::String(_) | Value::LangString { .. } | Value::Uri(_) => None,
    }
}

/// The XSD lexical form of a value.
pub fn lexical_form(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(x) => format_double(*x),
        Value::Decimal(d) => d.normalize().to_string(),
        Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::Duration(d) => format_duration(*d),
        Value::Bytes(b) => b.iter().map(|byte| format!("{byte:02X}")).collect(),
        Value::String(s) | Value::Uri(s) => s.clone(),
        Value::LangString { text, .. } => text.clone(),
        Value::Typed { lexical, .. } => lexical.clone(),
    }
}

/// Parse a typed literal into a value.
pub fn parse_literal(lexical: &str, datatype: &str) -> Value {
    let parsed = match datatype.strip_prefix(XSD_NAMESPACE) {
        Some("string") | Some("normalizedString") | Some("token") => {
            Some(Value::String(lexical.to_string()))
        }
        Some("boolean") => parse_bool(lexical).map(Value::Bool),
        Some("byte" | "short" | "int" | "long" | "integer" | "negativeInteger")
        | Some("nonPositiveInteger") => lexical.trim().parse().ok().map(Value::Int),
        Some("unsignedByte" | "unsignedShort" | "unsignedInt" | "unsignedLong")
        | Some("nonNegativeInteger" | "positiveInteger") => {
            lexical.trim().parse().ok().map(Value::UInt)
        }
        Some("double" | "float") => parse_double(lexical).map(Value::Float),
        Some("decimal") => lexical.trim().parse::<Decimal>().ok().map(Value::Decimal),
        Some("dateTime" | "date") => parse_datetime(lexical).map(Value::DateTime),
        Some("duration" | "dayTimeDuration") => parse_duration(lexical).map(Value::Duration),
        Some("hexBinary") => parse_hex(lexical).map(Value::Bytes),
        Some("anyURI") => Some(Value::Uri(lexical.to_string())),
        _ => None,
    };

    parsed.unwrap_or_else(|| Value::Typed {
        lexical: lexical.to_string(),
        datatype: datatype.to_string(),
    })
}

fn parse_bool(lexical: &str) -> Option<bool> {
    match lexical.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn format_double(x: f64) -> String {
    if x.is_nan() {
        "NaN".into()
    } else if x == f64::INFINITY {
        "INF".into()
    } else if x == f64::NEG_INFINITY {
        "-INF".into()
    } else {
        x.to_string()
    }
}

fn parse_double(lexical: &str) -> Option<f64> {
    match lexical.trim() {
        "NaN" => Some(f64::NAN),
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Parses `xsd:dateTime` with or without a timezone (assumed UTC when
/// absent) and `xsd:date` (midnight UTC).
fn parse_datetime(lexical: &str) -> Option<DateTime<Utc>> {
    let lexical = lexical.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(lexical) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    let date_part = lexical.strip_suffix('Z').unwrap_or(lexical);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_duration(d: TimeDelta) -> String {
    let negative = d < TimeDelta::zero();
    let d = d.abs();
    let total = d.num_seconds();
    let nanos = d.subsec_nanos();

    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 || nanos > 0 || (hours == 0 && minutes == 0) {
            if nanos > 0 {
                let fraction = format!("{nanos:09}");
                out.push_str(&format!("{seconds}.{}S", fraction.trim_end_matches('0')));
            } else {
                out.push_str(&format!("{seconds}S"));
            }
        }
    }
    out
}

/// Day-time durations only; year and month components have no fixed length.
fn parse_duration(lexical: &str) -> Option<TimeDelta> {
    let lexical = lexical.trim();
    let (negative, rest) = match lexical.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lexical),
    };
    let rest = rest.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total = TimeDelta::zero();
    let mut in_time = false;
    let mut number = String::new();
    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' | '.' => number.push(c),
            'D' if !in_time => total += TimeDelta::days(number.parse().ok()?),
            'H' if in_time => total += TimeDelta::hours(number.parse().ok()?),
            'M' if in_time => total += TimeDelta::minutes(number.parse().ok()?),
            'S' if in_time => {
                let secs: f64 = number.parse().ok()?;
                total += TimeDelta::milliseconds((secs * 1000.0).round() as i64);
            }
            _ => return None,
        }
        if c.is_ascii_alphabetic() && c != 'T' {
            number.clear();
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(if negative { -total } else { total })
}

fn parse_hex(lexical: &str) -> Option<Vec<u8>> {
    let lexical = lexical.trim();
    if lexical.len() % 2 != 0 {
        return None;
    }
    (0..lexical.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(lexical.get(i..i + 2)?, 16).ok())
        .collect()
}
