//! SQL literal rendering for INSERT statements.

use super::{Logical, RenderSettings, array_literal, classify, format_float, log_fallback};
use crate::quote::quote_literal;
use crate::value::{Column, Value};

/// Renders values as PostgreSQL literals that read back to the same value.
#[derive(Debug, Clone, Copy)]
pub struct SqlRenderer<'a> {
    settings: &'a RenderSettings,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(settings: &'a RenderSettings) -> Self {
        Self { settings }
    }

    pub fn render(&self, column: &Column, value: &Value) -> String {
        match classify(value, column.kind) {
            Ok(logical) => self.render_logical(logical),
            Err(err) => {
                log_fallback(&column.name, &err);
                "NULL".to_string()
            }
        }
    }

    pub fn render_logical(&self, logical: Logical<'_>) -> String {
        match logical {
            Logical::Null => "NULL".to_string(),
            Logical::Bool(b) => b.to_string(),
            Logical::Int(i) => i.to_string(),
            Logical::Float(f) if f.is_finite() => format_float(f),
            Logical::Float(f) => format!("{}::float8", quote_literal(&format_float(f))),
            Logical::Decimal(d) => d.normalize().to_string(),
            Logical::Text(s) => quote_literal(&s),
            Logical::Bytes(b) => format!("{}::bytea", quote_literal(&String::from_utf8_lossy(b))),
            Logical::Date(d) => format!("'{}'::date", d.format("%Y-%m-%d")),
            Logical::Timestamp(ts) => {
                format!("'{}'::timestamp", ts.format("%Y-%m-%d %H:%M:%S%.f"))
            }
            Logical::TimestampTz(ts) => {
                format!("'{}'::timestamptz", self.settings.zone.iso_with_offset(&ts))
            }
            Logical::Interval(iv) => format!("{}::interval", quote_literal(&iv)),
            Logical::Uuid(u) => format!("'{}'::uuid", u.hyphenated()),
            Logical::Array(items) => quote_literal(&array_literal(items)),
            Logical::Json { doc, binary } => {
                let cast = if binary { "jsonb" } else { "json" };
                format!("{}::{}", quote_literal(&doc.to_string()), cast)
            }
        }
    }
}
