//! Per-type value formatting.
//!
//! Formatting happens in two steps. [`classify`] looks at the column's
//! [`TypeKind`] and turns the raw [`Value`] into a [`Logical`] value; each
//! output grammar then has a renderer that maps every `Logical` variant to its
//! own syntax:
//!
//! | Renderer | Used by | Null |
//! |----------|---------|------|
//! | [`TextRenderer`] | csv, xml | empty |
//! | [`JsonRenderer`] | json, yaml | `null` |
//! | [`SqlRenderer`] | sql | `NULL` |
//!
//! A value that cannot be converted (say, a malformed numeric) is logged and
//! rendered as the grammar's null instead of failing the export.

mod json;
mod sql;
mod text;

use std::borrow::Cow;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{ConversionError, ExportResult};
use crate::options::ExportOptions;
use crate::time::{TimePattern, Zone};
use crate::value::{TypeKind, Value};

pub use json::JsonRenderer;
pub use sql::SqlRenderer;
pub use text::TextRenderer;

/// Time pattern and zone shared by the renderers of one export.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub pattern: TimePattern,
    pub date_pattern: TimePattern,
    pub zone: Zone,
    /// Non-fatal problems found while resolving the settings.
    pub warnings: Vec<String>,
}

impl RenderSettings {
    pub fn new(time_pattern: &str, timezone: &str) -> ExportResult<Self> {
        let pattern = TimePattern::parse(time_pattern)?;
        let date_pattern = pattern.date_portion();
        let (zone, warning) = Zone::resolve(timezone);
        let mut warnings = Vec::new();
        if let Some(msg) = warning {
            tracing::warn!("{}", msg);
            warnings.push(msg);
        }
        Ok(Self {
            pattern,
            date_pattern,
            zone,
            warnings,
        })
    }

    pub fn from_options(options: &ExportOptions) -> ExportResult<Self> {
        Self::new(&options.time_format, &options.time_zone)
    }
}

/// A value after dispatch on its column type.
#[derive(Debug, Clone, PartialEq)]
pub enum Logical<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(Cow<'a, str>),
    Bytes(&'a [u8]),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Interval(String),
    Uuid(Uuid),
    Array(&'a [Value]),
    Json {
        doc: Cow<'a, serde_json::Value>,
        binary: bool,
    },
}

/// Interpret `value` according to the column's type identifier.
///
/// Shapes that do not fit the kind fall back to generic text. Only values
/// that claim a type but cannot be read as it produce a [`ConversionError`].
pub fn classify(value: &Value, kind: TypeKind) -> Result<Logical<'_>, ConversionError> {
    if value.is_null() {
        return Ok(Logical::Null);
    }

    let logical = match (kind, value) {
        (TypeKind::Bool, Value::Bool(b)) => Logical::Bool(*b),
        (TypeKind::Bool, Value::Text(s)) => match s.as_str() {
            "t" | "true" => Logical::Bool(true),
            "f" | "false" => Logical::Bool(false),
            _ => return Err(ConversionError::new("bool", format!("unexpected literal {s:?}"))),
        },

        (TypeKind::Int2 | TypeKind::Int4 | TypeKind::Int8, Value::Int(i)) => Logical::Int(*i),

        (TypeKind::Float4 | TypeKind::Float8, Value::Float(f)) => Logical::Float(*f),
        (TypeKind::Float4 | TypeKind::Float8, Value::Int(i)) => Logical::Float(*i as f64),

        (TypeKind::Numeric, Value::Decimal(d)) => Logical::Decimal(*d),
        (TypeKind::Numeric, Value::Int(i)) => Logical::Decimal(Decimal::from(*i)),
        (TypeKind::Numeric, Value::Float(f)) => Logical::Float(*f),
        (TypeKind::Numeric, Value::Text(s)) => Logical::Decimal(parse_decimal(s)?),

        (TypeKind::Text, Value::Text(s)) => Logical::Text(Cow::Borrowed(s.as_str())),

        (TypeKind::Bytea, Value::Bytes(b)) => Logical::Bytes(b.as_slice()),
        (TypeKind::Bytea, Value::Text(s)) => Logical::Bytes(s.as_bytes()),

        (TypeKind::Date, Value::Date(d)) => Logical::Date(*d),
        (TypeKind::Date, Value::Timestamp(ts)) => Logical::Date(ts.date()),

        (TypeKind::Timestamp, Value::Timestamp(ts)) => Logical::Timestamp(*ts),
        (TypeKind::Timestamp, Value::Date(d)) => {
            Logical::Timestamp(d.and_time(chrono::NaiveTime::MIN))
        }

        (TypeKind::TimestampTz, Value::TimestampTz(ts)) => Logical::TimestampTz(*ts),
        (TypeKind::TimestampTz, Value::Timestamp(ts)) => Logical::TimestampTz(ts.and_utc()),

        (TypeKind::Interval, Value::Interval(iv)) => Logical::Interval(iv.to_string()),
        (TypeKind::Interval, Value::Text(s)) => Logical::Interval(s.clone()),

        (TypeKind::Uuid, Value::Uuid(u)) => Logical::Uuid(*u),
        (TypeKind::Uuid, Value::Bytes(b)) => Logical::Uuid(
            Uuid::from_slice(b).map_err(|e| ConversionError::new("uuid", e.to_string()))?,
        ),
        (TypeKind::Uuid, Value::Text(s)) => Logical::Uuid(
            Uuid::parse_str(s).map_err(|e| ConversionError::new("uuid", e.to_string()))?,
        ),

        (TypeKind::Json | TypeKind::Jsonb, Value::Json(doc)) => Logical::Json {
            doc: Cow::Borrowed(doc),
            binary: kind == TypeKind::Jsonb,
        },
        (TypeKind::Json | TypeKind::Jsonb, Value::Text(s)) => Logical::Json {
            doc: Cow::Owned(
                serde_json::from_str(s).map_err(|e| ConversionError::new("json", e.to_string()))?,
            ),
            binary: kind == TypeKind::Jsonb,
        },
        (TypeKind::Json | TypeKind::Jsonb, Value::Bytes(b)) => Logical::Json {
            doc: Cow::Owned(
                serde_json::from_slice(b)
                    .map_err(|e| ConversionError::new("json", e.to_string()))?,
            ),
            binary: kind == TypeKind::Jsonb,
        },

        (TypeKind::Array, Value::Array(items)) => Logical::Array(items.as_slice()),

        (_, Value::Text(s)) => Logical::Text(Cow::Borrowed(s.as_str())),
        (_, other) => Logical::Text(Cow::Owned(other.to_plain_string())),
    };

    Ok(logical)
}

fn parse_decimal(s: &str) -> Result<Decimal, ConversionError> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| ConversionError::new("numeric", format!("malformed decimal {s:?}: {e}")))
}

pub(crate) fn log_fallback(column: &str, err: &ConversionError) {
    tracing::warn!("column {:?}: {}, writing null", column, err);
}

/// Format a float with at most 15 significant digits, the way C's `%.15g`
/// does: fixed notation for exponents in `-4..15`, scientific otherwise.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.14e}", v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if !(-4..15).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (14 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, v)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// PostgreSQL array text: `{a,b,"c d"}`, `{}` when empty.
pub fn array_literal(items: &[Value]) -> String {
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            Value::Null => out.push_str("NULL"),
            Value::Array(inner) => out.push_str(&array_literal(inner)),
            other => push_array_element(&mut out, &other.to_plain_string()),
        }
    }
    out.push('}');
    out
}

fn push_array_element(out: &mut String, elem: &str) {
    let needs_quotes = elem.is_empty()
        || elem.eq_ignore_ascii_case("null")
        || elem
            .chars()
            .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\') || c.is_whitespace());
    if !needs_quotes {
        out.push_str(elem);
        return;
    }
    out.push('"');
    for c in elem.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}
