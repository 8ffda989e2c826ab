//! Structured-document rendering for the json and yaml writers.

use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value as JsonValue};

use super::{Logical, RenderSettings, classify, log_fallback};
use crate::value::{Column, TypeKind, Value};

/// Renders values as native JSON values.
#[derive(Debug, Clone, Copy)]
pub struct JsonRenderer<'a> {
    settings: &'a RenderSettings,
}

impl<'a> JsonRenderer<'a> {
    pub fn new(settings: &'a RenderSettings) -> Self {
        Self { settings }
    }

    pub fn render(&self, column: &Column, value: &Value) -> JsonValue {
        match classify(value, column.kind) {
            Ok(logical) => self.render_logical(logical),
            Err(err) => {
                log_fallback(&column.name, &err);
                JsonValue::Null
            }
        }
    }

    pub fn render_logical(&self, logical: Logical<'_>) -> JsonValue {
        match logical {
            Logical::Null => JsonValue::Null,
            Logical::Bool(b) => JsonValue::Bool(b),
            Logical::Int(i) => JsonValue::Number(i.into()),
            Logical::Float(f) => float(f),
            // Numbers that do not fit a finite f64 have no JSON form.
            Logical::Decimal(d) => d.to_f64().map_or(JsonValue::Null, float),
            Logical::Text(s) => JsonValue::String(s.into_owned()),
            Logical::Bytes(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
            Logical::Date(d) => JsonValue::String(self.settings.date_pattern.format_date(&d)),
            Logical::Timestamp(ts) => JsonValue::String(self.settings.pattern.format_datetime(&ts)),
            Logical::TimestampTz(ts) => {
                let local = self.settings.zone.localize(&ts);
                JsonValue::String(self.settings.pattern.format_datetime(&local))
            }
            Logical::Interval(iv) => JsonValue::String(iv),
            Logical::Uuid(u) => JsonValue::String(u.hyphenated().to_string()),
            Logical::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| match classify(item, TypeKind::of_value(item)) {
                        Ok(logical) => self.render_logical(logical),
                        Err(_) => JsonValue::Null,
                    })
                    .collect(),
            ),
            Logical::Json { doc, .. } => doc.into_owned(),
        }
    }
}

fn float(f: f64) -> JsonValue {
    Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}
