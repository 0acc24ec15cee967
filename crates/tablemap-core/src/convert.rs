//! Conversion between values, SQL literals and typed fields.
//!
//! [`to_sql_literal`] renders a value for inline embedding in SQL text. It
//! belongs to the legacy inline-literal path: text is wrapped in `N'...'`
//! without escaping embedded quotes. Parameterized statements never go
//! through it.
//!
//! [`from_wire_value`] coerces whatever a driver handed back for a column
//! into the value variant the target field expects.

use crate::Result;
use crate::error::MappingError;
use crate::field::{FieldKind, ScalarKind};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use uuid::Uuid;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Render a value as an inline SQL literal.
pub fn to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Text(s) => format!("N'{}'", s),
        Value::Char(c) => format!("N'{}'", c),
        Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
        Value::Byte(v) => v.to_string(),
        Value::SmallInt(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Decimal(s) => s.clone(),
        Value::DateTime(dt) => format_datetime_literal(dt),
        Value::Guid(g) => format!("'{}'", g),
    }
}

/// `'yyyy-MM-dd HH:mm:ss.ff'`, truncated to hundredths of a second.
fn format_datetime_literal(dt: &NaiveDateTime) -> String {
    let centis = (dt.nanosecond() / 10_000_000).min(99);
    format!("'{}.{:02}'", dt.format("%Y-%m-%d %H:%M:%S"), centis)
}

/// Truncate a datetime to the precision kept by [`to_sql_literal`].
pub fn truncate_to_literal_precision(dt: NaiveDateTime) -> NaiveDateTime {
    let centis = (dt.nanosecond() / 10_000_000).min(99);
    dt.with_nanosecond(centis * 10_000_000).unwrap_or(dt)
}

/// Coerce a raw column value into the variant `kind` expects.
///
/// A nullable target receives NULL for NULL or an empty string form. A
/// non-nullable text target receives `""` for NULL. Every other value that
/// does not parse fails with a [`MappingError`] naming `field`.
pub fn from_wire_value(raw: &Value, kind: FieldKind, field: &str) -> Result<Value> {
    let scalar = kind.scalar();
    let fail = || -> crate::Error {
        MappingError::new(scalar.name(), display_raw(raw))
            .for_field(field)
            .into()
    };

    if kind.is_nullable() && (raw.is_null() || raw.to_wire_string().is_empty()) {
        return Ok(Value::Null);
    }
    if raw.is_null() {
        return match scalar {
            ScalarKind::Text => Ok(Value::Text(String::new())),
            _ => Err(fail()),
        };
    }

    let coerced = match scalar {
        ScalarKind::Byte => integer(raw).and_then(|v| u8::try_from(v).ok()).map(Value::Byte),
        ScalarKind::Short => integer(raw)
            .and_then(|v| i16::try_from(v).ok())
            .map(Value::SmallInt),
        ScalarKind::Int | ScalarKind::Enum => {
            integer(raw).and_then(|v| i32::try_from(v).ok()).map(Value::Int)
        }
        ScalarKind::Long => integer(raw).map(Value::BigInt),
        ScalarKind::Float => match raw {
            Value::Float(v) => Some(Value::Float(*v)),
            Value::Double(v) => Some(Value::Float(*v as f32)),
            other => other
                .to_wire_string()
                .trim()
                .parse::<f32>()
                .ok()
                .map(Value::Float),
        },
        ScalarKind::Double => match raw {
            Value::Float(v) => Some(Value::Double(f64::from(*v))),
            Value::Double(v) => Some(Value::Double(*v)),
            other => other
                .to_wire_string()
                .trim()
                .parse::<f64>()
                .ok()
                .map(Value::Double),
        },
        ScalarKind::Decimal => decimal(raw).map(Value::Decimal),
        ScalarKind::Bool => boolean(raw).map(Value::Bool),
        ScalarKind::Text => Some(Value::Text(raw.to_wire_string())),
        ScalarKind::Char => match raw {
            Value::Char(c) => Some(Value::Char(*c)),
            other => {
                let s = other.to_wire_string();
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Value::Char(c)),
                    _ => None,
                }
            }
        },
        ScalarKind::DateTime => match raw {
            Value::DateTime(dt) => Some(Value::DateTime(*dt)),
            other => parse_datetime(other.to_wire_string().trim()).map(Value::DateTime),
        },
        ScalarKind::Guid => match raw {
            Value::Guid(g) => Some(Value::Guid(*g)),
            other => Uuid::parse_str(other.to_wire_string().trim())
                .ok()
                .map(Value::Guid),
        },
    };

    coerced.ok_or_else(fail)
}

/// Parse an inline SQL literal back into a value of `kind`.
///
/// Inverse of [`to_sql_literal`]: strips `N'...'` / `'...'` wrappers and
/// maps `null`, then applies [`from_wire_value`].
pub fn from_sql_literal(literal: &str, kind: FieldKind, field: &str) -> Result<Value> {
    let trimmed = literal.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return from_wire_value(&Value::Null, kind, field);
    }
    let inner = trimmed
        .strip_prefix("N'")
        .or_else(|| trimmed.strip_prefix('\''))
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(trimmed);
    from_wire_value(&Value::Text(inner.to_string()), kind, field)
}

fn display_raw(raw: &Value) -> String {
    if raw.is_null() {
        "NULL".to_string()
    } else {
        raw.to_wire_string()
    }
}

fn integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Byte(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => raw.as_i64(),
        Value::Text(s) | Value::Decimal(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn boolean(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Byte(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
            raw.as_i64().map(|v| v != 0)
        }
        Value::Text(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") || s == "1" {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") || s == "0" {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn decimal(raw: &Value) -> Option<String> {
    match raw {
        Value::Decimal(s) => Some(s.clone()),
        Value::Byte(_)
        | Value::SmallInt(_)
        | Value::Int(_)
        | Value::BigInt(_)
        | Value::Float(_)
        | Value::Double(_) => Some(raw.to_wire_string()),
        Value::Text(s) => {
            let s = s.trim();
            let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
            let mut parts = digits.splitn(2, '.');
            let whole = parts.next().unwrap_or_default();
            let frac = parts.next().unwrap_or_default();
            let valid = !(whole.is_empty() && frac.is_empty())
                && whole.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c.is_ascii_digit());
            valid.then(|| s.to_string())
        }
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
