//! XML document with one element per row.

use std::io::Write;

use super::{ExportContext, FormatWriter, Progress};
use crate::cursor::RowCursor;
use crate::error::{ExportError, ExportResult};
use crate::formatter::TextRenderer;
use crate::options::{ExportOptions, FORMAT_XML};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// ```text
/// <?xml version="1.0" encoding="UTF-8"?>
/// <results>
///   <row>
///     <id>1</id>
///     <name></name>
///   </row>
/// </results>
/// ```
///
/// Every value, including JSON documents, goes through element-content
/// escaping. Column names that are not valid XML names are sanitized.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlWriter;

impl FormatWriter for XmlWriter {
    fn name(&self) -> &'static str {
        FORMAT_XML
    }

    fn validate(&self, options: &ExportOptions) -> ExportResult<()> {
        for (what, name) in [
            ("root", &options.xml_root_element),
            ("row", &options.xml_row_element),
        ] {
            if name.trim().is_empty() {
                return Err(ExportError::config(format!(
                    "XML {what} element name cannot be empty"
                )));
            }
            if !is_valid_name(name.trim()) {
                return Err(ExportError::config(format!(
                    "XML {what} element name {name:?} is not a valid element name"
                )));
            }
        }
        Ok(())
    }

    fn write(
        &self,
        cursor: &mut dyn RowCursor,
        out: &mut dyn Write,
        ctx: ExportContext<'_>,
        progress: &mut Progress,
    ) -> ExportResult<()> {
        let columns = cursor.columns().to_vec();
        let tags: Vec<String> = columns.iter().map(|c| element_name(&c.name)).collect();
        let root = ctx.options.xml_root_element.trim();
        let row_tag = ctx.options.xml_row_element.trim();
        let renderer = TextRenderer::new(ctx.settings);

        out.write_all(DECLARATION.as_bytes())?;
        writeln!(out, "<{root}>")?;

        let mut buf = String::new();
        while let Some(row) = ctx.next_row(cursor, progress)? {
            buf.clear();
            buf.push_str("  <");
            buf.push_str(row_tag);
            buf.push_str(">\n");
            for ((column, tag), value) in columns.iter().zip(&tags).zip(&row) {
                buf.push_str("    <");
                buf.push_str(tag);
                buf.push('>');
                if !value.is_null() {
                    escape_into(&mut buf, &renderer.render(column, value));
                }
                buf.push_str("</");
                buf.push_str(tag);
                buf.push_str(">\n");
            }
            buf.push_str("  </");
            buf.push_str(row_tag);
            buf.push_str(">\n");
            out.write_all(buf.as_bytes())?;

            if progress.row_written() {
                out.flush()?;
                tracing::debug!("{} rows written", progress.rows);
            }
        }

        writeln!(out, "</{root}>")?;
        out.flush()?;
        progress.outcome()
    }
}

/// Escape element content. Characters XML 1.0 cannot carry at all are
/// replaced with U+FFFD.
fn escape_into(buf: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '\t' | '\n' | '\r' => buf.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                buf.push(char::REPLACEMENT_CHARACTER)
            }
            c => buf.push(c),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c == '_' || c == ':' || c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_alphanumeric() || matches!(c, '-' | '.' | '\u{B7}')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start) && chars.all(is_name_char)
}

/// Turn a column name into an element name: invalid characters become `_`
/// and a name that cannot start an element gets a `_` prefix.
pub fn element_name(column: &str) -> String {
    let mut name: String = column
        .chars()
        .map(|c| if is_name_char(c) && c != ':' { c } else { '_' })
        .collect();
    match name.chars().next() {
        None => name.push('_'),
        Some(first) if !is_name_start(first) => name.insert(0, '_'),
        Some(_) => {}
    }
    name
}
