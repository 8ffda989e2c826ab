//! Plain text rendering shared by the csv and xml writers.

use super::{Logical, RenderSettings, array_literal, classify, format_float, log_fallback};
use crate::value::{Column, Value};

/// Renders values as bare text; null becomes the empty string.
///
/// Quoting is left to the caller: the csv encoder quotes fields itself and the
/// xml writer escapes element content.
#[derive(Debug, Clone, Copy)]
pub struct TextRenderer<'a> {
    settings: &'a RenderSettings,
}

impl<'a> TextRenderer<'a> {
    pub fn new(settings: &'a RenderSettings) -> Self {
        Self { settings }
    }

    pub fn render(&self, column: &Column, value: &Value) -> String {
        match classify(value, column.kind) {
            Ok(logical) => self.render_logical(logical),
            Err(err) => {
                log_fallback(&column.name, &err);
                String::new()
            }
        }
    }

    pub fn render_logical(&self, logical: Logical<'_>) -> String {
        match logical {
            Logical::Null => String::new(),
            Logical::Bool(b) => b.to_string(),
            Logical::Int(i) => i.to_string(),
            Logical::Float(f) => format_float(f),
            Logical::Decimal(d) => d.normalize().to_string(),
            Logical::Text(s) => s.into_owned(),
            Logical::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Logical::Date(d) => self.settings.date_pattern.format_date(&d),
            Logical::Timestamp(ts) => self.settings.pattern.format_datetime(&ts),
            Logical::TimestampTz(ts) => {
                let local = self.settings.zone.localize(&ts);
                self.settings.pattern.format_datetime(&local)
            }
            Logical::Interval(iv) => iv,
            Logical::Uuid(u) => u.hyphenated().to_string(),
            Logical::Array(items) => array_literal(items),
            Logical::Json { doc, .. } => doc.to_string(),
        }
    }
}
