//! YAML sequence of row mappings.

use std::collections::HashSet;
use std::io::{self, Write};

use serde_yaml::{Mapping, Value as YamlValue};

use super::{ExportContext, FormatWriter, Progress};
use crate::cursor::RowCursor;
use crate::error::ExportResult;
use crate::formatter::JsonRenderer;
use crate::options::FORMAT_YAML;
use crate::value::Column;

/// One `- ` sequence item per row, keys in column order. Values follow the
/// JSON rendering rules. A result without rows is written as `[]`.
///
/// Mapping keys must be unique, so a repeated column name gets a numeric
/// suffix: `a`, `a_2`, `a_3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlWriter;

fn yaml_error(err: serde_yaml::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn mapping_keys(columns: &[Column]) -> Vec<YamlValue> {
    let mut taken = HashSet::with_capacity(columns.len());
    columns
        .iter()
        .map(|column| {
            let mut key = column.name.clone();
            let mut n = 2;
            while taken.contains(&key) {
                key = format!("{}_{}", column.name, n);
                n += 1;
            }
            taken.insert(key.clone());
            YamlValue::String(key)
        })
        .collect()
}

impl FormatWriter for YamlWriter {
    fn name(&self) -> &'static str {
        FORMAT_YAML
    }

    fn extension(&self) -> &'static str {
        "yml"
    }

    fn write(
        &self,
        cursor: &mut dyn RowCursor,
        out: &mut dyn Write,
        ctx: ExportContext<'_>,
        progress: &mut Progress,
    ) -> ExportResult<()> {
        let columns = cursor.columns().to_vec();
        let keys = mapping_keys(&columns);
        let renderer = JsonRenderer::new(ctx.settings);

        let mut buf = String::new();
        while let Some(row) = ctx.next_row(cursor, progress)? {
            let mut mapping = Mapping::with_capacity(columns.len());
            for ((column, key), value) in columns.iter().zip(&keys).zip(&row) {
                let rendered =
                    serde_yaml::to_value(renderer.render(column, value)).map_err(yaml_error)?;
                mapping.insert(key.clone(), rendered);
            }
            let doc = serde_yaml::to_string(&mapping).map_err(yaml_error)?;

            buf.clear();
            for (i, line) in doc.lines().enumerate() {
                buf.push_str(if i == 0 { "- " } else { "  " });
                buf.push_str(line);
                buf.push('\n');
            }
            out.write_all(buf.as_bytes())?;

            if progress.row_written() {
                out.flush()?;
                tracing::debug!("{} rows written", progress.rows);
            }
        }

        if progress.rows == 0 {
            out.write_all(b"[]\n")?;
        }
        out.flush()?;
        progress.outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursor;
    use crate::options::ExportOptions;
    use crate::value::{TypeKind, Value};
    use crate::writers::test_support::{render, two_rows};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sequence_of_mappings() {
        let (out, progress, result) =
            render(&YamlWriter, &mut two_rows(), &ExportOptions::new("yaml"));
        result.unwrap();
        assert_eq!(progress.rows, 2);
        assert_eq!(out, "- id: 1\n  name: a\n- id: 2\n  name: null\n");

        let parsed: Vec<Mapping> = serde_yaml::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
        let keys: Vec<_> = parsed[0].keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "name"]);
    }

    #[test]
    fn test_nested_values_parse_back() {
        let mut cursor = MemoryCursor::new(
            vec![
                Column::new("tags", TypeKind::Array),
                Column::new("meta", TypeKind::Jsonb),
            ],
            vec![vec![
                Value::Array(vec!["x".into(), "y".into()]),
                Value::Json(serde_json::json!({"k": [1, 2]})),
            ]],
        );
        let (out, _, result) = render(&YamlWriter, &mut cursor, &ExportOptions::new("yaml"));
        result.unwrap();

        let parsed: serde_json::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{"tags": ["x", "y"], "meta": {"k": [1, 2]}}])
        );
    }

    #[test]
    fn test_repeated_column_names_keep_every_value() {
        let mut cursor = MemoryCursor::new(
            vec![
                Column::new("a", TypeKind::Int4),
                Column::new("a", TypeKind::Int4),
                Column::new("a_2", TypeKind::Int4),
            ],
            vec![vec![1.into(), 2.into(), 3.into()]],
        );
        let (out, _, result) = render(&YamlWriter, &mut cursor, &ExportOptions::new("yaml"));
        result.unwrap();
        assert_eq!(out, "- a: 1\n  a_2: 2\n  a_2_2: 3\n");

        let parsed: Vec<Mapping> = serde_yaml::from_str(&out).unwrap();
        assert_eq!(parsed[0].len(), 3);
    }

    #[test]
    fn test_empty_result() {
        let mut cursor = MemoryCursor::new(vec![Column::new("id", TypeKind::Int4)], vec![]);
        let (out, _, result) = render(&YamlWriter, &mut cursor, &ExportOptions::new("yaml"));
        result.unwrap();
        assert_eq!(out, "[]\n");
    }
}
