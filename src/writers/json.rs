//! JSON array of row objects.

use std::io::Write;

use serde_json::Value as JsonValue;

use super::{ExportContext, FormatWriter, Progress};
use crate::cursor::RowCursor;
use crate::error::ExportResult;
use crate::formatter::JsonRenderer;
use crate::options::FORMAT_JSON;
use crate::value::{Column, Value};

const ROW_INDENT: &str = "  ";
const FIELD_INDENT: &str = "    ";

/// Pretty-printed array, one object per row with keys in column order.
///
/// ```text
/// [
///   {
///     "id": 1,
///     "name": "a"
///   }
/// ]
/// ```
///
/// Objects are assembled by hand rather than through a map so key order never
/// depends on the map type.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriter;

impl FormatWriter for JsonWriter {
    fn name(&self) -> &'static str {
        FORMAT_JSON
    }

    fn write(
        &self,
        cursor: &mut dyn RowCursor,
        out: &mut dyn Write,
        ctx: ExportContext<'_>,
        progress: &mut Progress,
    ) -> ExportResult<()> {
        let columns = cursor.columns().to_vec();
        let keys = columns
            .iter()
            .map(|c| serde_json::to_string(&c.name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(std::io::Error::from)?;
        let renderer = JsonRenderer::new(ctx.settings);

        out.write_all(b"[\n")?;
        let mut buf = String::new();
        while let Some(row) = ctx.next_row(cursor, progress)? {
            buf.clear();
            if progress.rows > 0 {
                buf.push_str(",\n");
            }
            push_object(&mut buf, &columns, &keys, &row, &renderer)
                .map_err(std::io::Error::from)?;
            out.write_all(buf.as_bytes())?;

            if progress.row_written() {
                out.flush()?;
                tracing::debug!("{} rows written", progress.rows);
            }
        }
        out.write_all(b"\n]\n")?;
        out.flush()?;

        progress.outcome()
    }
}

fn push_object(
    buf: &mut String,
    columns: &[Column],
    keys: &[String],
    row: &[Value],
    renderer: &JsonRenderer<'_>,
) -> serde_json::Result<()> {
    if columns.is_empty() {
        buf.push_str(ROW_INDENT);
        buf.push_str("{}");
        return Ok(());
    }

    buf.push_str(ROW_INDENT);
    buf.push_str("{\n");
    for (i, ((column, key), value)) in columns.iter().zip(keys).zip(row).enumerate() {
        if i > 0 {
            buf.push_str(",\n");
        }
        buf.push_str(FIELD_INDENT);
        buf.push_str(key);
        buf.push_str(": ");
        push_value(buf, &renderer.render(column, value))?;
    }
    buf.push('\n');
    buf.push_str(ROW_INDENT);
    buf.push('}');
    Ok(())
}

/// Scalars stay on one line; nested objects and arrays are pretty-printed at
/// the field's depth.
fn push_value(buf: &mut String, value: &JsonValue) -> serde_json::Result<()> {
    match value {
        JsonValue::Object(map) if !map.is_empty() => push_nested(buf, value),
        JsonValue::Array(items) if !items.is_empty() => push_nested(buf, value),
        other => {
            buf.push_str(&serde_json::to_string(other)?);
            Ok(())
        }
    }
}

fn push_nested(buf: &mut String, value: &JsonValue) -> serde_json::Result<()> {
    let pretty = serde_json::to_string_pretty(value)?;
    let mut lines = pretty.lines();
    if let Some(first) = lines.next() {
        buf.push_str(first);
    }
    for line in lines {
        buf.push('\n');
        buf.push_str(FIELD_INDENT);
        buf.push_str(line);
    }
    Ok(())
}
