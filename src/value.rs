//! Row values and column type identifiers.
//!
//! A [`Value`] is the native shape a cell arrived in; the [`TypeKind`] reported
//! alongside its column decides how it is rendered. The same shape can stand for
//! different logical types (raw bytes may be a `bytea`, a `uuid` or something
//! the driver could not decode), so formatting always dispatches on the kind.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Interval(Interval),
    Uuid(Uuid),
    Array(Vec<Value>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Plain text form of the value, ignoring any column type.
    ///
    /// Used for unknown type identifiers and array elements.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => crate::formatter::format_float(*f),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::TimestampTz(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
            Value::Interval(iv) => iv.to_string(),
            Value::Uuid(u) => u.hyphenated().to_string(),
            Value::Array(items) => crate::formatter::array_literal(items),
            Value::Json(doc) => doc.to_string(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A PostgreSQL `interval`: months, days and microseconds are kept apart
/// because none of them converts exactly into the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

impl Interval {
    pub fn new(months: i32, days: i32, microseconds: i64) -> Self {
        Self {
            months,
            days,
            microseconds,
        }
    }
}

/// Renders the server's default `postgres` interval style,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let years = self.months / 12;
        let months = self.months % 12;
        if years != 0 {
            parts.push(plural(years as i64, "year", "years"));
        }
        if months != 0 {
            parts.push(plural(months as i64, "mon", "mons"));
        }
        if self.days != 0 {
            parts.push(plural(self.days as i64, "day", "days"));
        }
        if self.microseconds != 0 || parts.is_empty() {
            let sign = if self.microseconds < 0 { "-" } else { "" };
            let total = self.microseconds.unsigned_abs();
            let hours = total / 3_600_000_000;
            let minutes = (total / 60_000_000) % 60;
            let seconds = (total / 1_000_000) % 60;
            let micros = total % 1_000_000;
            let mut clock = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
            if micros != 0 {
                let frac = format!("{micros:06}");
                clock.push('.');
                clock.push_str(frac.trim_end_matches('0'));
            }
            parts.push(clock);
        }
        f.write_str(&parts.join(" "))
    }
}

fn plural(n: i64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Logical column type, as identified by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Bytea,
    Date,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    Json,
    Jsonb,
    Array,
    /// Anything else; rendered as generic text.
    Unknown,
}

impl TypeKind {
    /// Map a PostgreSQL type OID.
    pub fn from_oid(oid: u32) -> Self {
        match oid {
            16 => TypeKind::Bool,
            17 => TypeKind::Bytea,
            20 => TypeKind::Int8,
            21 => TypeKind::Int2,
            23 => TypeKind::Int4,
            18 | 19 | 25 | 1042 | 1043 => TypeKind::Text,
            114 => TypeKind::Json,
            700 => TypeKind::Float4,
            701 => TypeKind::Float8,
            1082 => TypeKind::Date,
            1114 => TypeKind::Timestamp,
            1184 => TypeKind::TimestampTz,
            1186 => TypeKind::Interval,
            1700 => TypeKind::Numeric,
            2950 => TypeKind::Uuid,
            3802 => TypeKind::Jsonb,
            1000 | 1001 | 1005 | 1007 | 1009 | 1014 | 1015 | 1016 | 1021 | 1022 | 1115
            | 1182 | 1185 | 1187 | 1231 | 2951 | 199 | 3807 => TypeKind::Array,
            _ => TypeKind::Unknown,
        }
    }

    /// Map a PostgreSQL type name as reported by sqlx (`INT4`, `TEXT[]`, ...).
    pub fn from_pg_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        if upper.ends_with("[]") || upper.starts_with('_') {
            return TypeKind::Array;
        }
        match upper.as_str() {
            "BOOL" | "BOOLEAN" => TypeKind::Bool,
            "INT2" | "SMALLINT" => TypeKind::Int2,
            "INT4" | "INT" | "INTEGER" => TypeKind::Int4,
            "INT8" | "BIGINT" => TypeKind::Int8,
            "FLOAT4" | "REAL" => TypeKind::Float4,
            "FLOAT8" | "DOUBLE PRECISION" => TypeKind::Float8,
            "NUMERIC" | "DECIMAL" => TypeKind::Numeric,
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => TypeKind::Text,
            "BYTEA" => TypeKind::Bytea,
            "DATE" => TypeKind::Date,
            "TIMESTAMP" => TypeKind::Timestamp,
            "TIMESTAMPTZ" => TypeKind::TimestampTz,
            "INTERVAL" => TypeKind::Interval,
            "UUID" => TypeKind::Uuid,
            "JSON" => TypeKind::Json,
            "JSONB" => TypeKind::Jsonb,
            _ => TypeKind::Unknown,
        }
    }

    /// Best-effort kind for a value without column metadata (array elements).
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null | Value::Text(_) => TypeKind::Text,
            Value::Bool(_) => TypeKind::Bool,
            Value::Int(_) => TypeKind::Int8,
            Value::Float(_) => TypeKind::Float8,
            Value::Decimal(_) => TypeKind::Numeric,
            Value::Bytes(_) => TypeKind::Bytea,
            Value::Date(_) => TypeKind::Date,
            Value::Timestamp(_) => TypeKind::Timestamp,
            Value::TimestampTz(_) => TypeKind::TimestampTz,
            Value::Interval(_) => TypeKind::Interval,
            Value::Uuid(_) => TypeKind::Uuid,
            Value::Array(_) => TypeKind::Array,
            Value::Json(_) => TypeKind::Jsonb,
        }
    }

    /// The PostgreSQL name used in logs and diagnostics.
    pub fn pg_name(self) -> &'static str {
        match self {
            TypeKind::Bool => "bool",
            TypeKind::Int2 => "int2",
            TypeKind::Int4 => "int4",
            TypeKind::Int8 => "int8",
            TypeKind::Float4 => "float4",
            TypeKind::Float8 => "float8",
            TypeKind::Numeric => "numeric",
            TypeKind::Text => "text",
            TypeKind::Bytea => "bytea",
            TypeKind::Date => "date",
            TypeKind::Timestamp => "timestamp",
            TypeKind::TimestampTz => "timestamptz",
            TypeKind::Interval => "interval",
            TypeKind::Uuid => "uuid",
            TypeKind::Json => "json",
            TypeKind::Jsonb => "jsonb",
            TypeKind::Array => "array",
            TypeKind::Unknown => "unknown",
        }
    }
}

/// Column metadata: name plus type identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: TypeKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_oid() {
        assert_eq!(TypeKind::from_oid(23), TypeKind::Int4);
        assert_eq!(TypeKind::from_oid(1184), TypeKind::TimestampTz);
        assert_eq!(TypeKind::from_oid(2950), TypeKind::Uuid);
        assert_eq!(TypeKind::from_oid(1009), TypeKind::Array);
        assert_eq!(TypeKind::from_oid(600), TypeKind::Unknown);
    }

    #[test]
    fn test_kind_from_pg_name() {
        assert_eq!(TypeKind::from_pg_name("INT8"), TypeKind::Int8);
        assert_eq!(TypeKind::from_pg_name("varchar"), TypeKind::Text);
        assert_eq!(TypeKind::from_pg_name("TEXT[]"), TypeKind::Array);
        assert_eq!(TypeKind::from_pg_name("JSONB"), TypeKind::Jsonb);
        assert_eq!(TypeKind::from_pg_name("POINT"), TypeKind::Unknown);
    }

    #[test]
    fn test_interval_display() {
        assert_eq!(
            Interval::new(14, 3, 14_706_500_000).to_string(),
            "1 year 2 mons 3 days 04:05:06.5"
        );
        assert_eq!(Interval::new(0, 1, 0).to_string(), "1 day");
        assert_eq!(Interval::new(0, 0, -90_000_000).to_string(), "-00:01:30");
        assert_eq!(Interval::default().to_string(), "00:00:00");
    }

    #[test]
    fn test_value_from_option() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
        let v: Value = Some("a").into();
        assert_eq!(v, Value::Text("a".into()));
    }
}
