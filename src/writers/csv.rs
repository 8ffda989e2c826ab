//! Delimited text.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use ::csv::{Terminator, WriterBuilder};

use super::{BulkExport, ExportContext, ExportSummary, FormatWriter, Progress};
use crate::cancel::CancelToken;
use crate::cursor::{CopySource, RowCursor};
use crate::error::ExportResult;
use crate::formatter::TextRenderer;
use crate::options::{ExportOptions, FORMAT_CSV};

/// Header line plus one delimited line per row.
///
/// Quoting follows RFC 4180: fields holding the delimiter, a quote or a line
/// break are quoted and embedded quotes are doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriter;

const LINE_END: &str = if cfg!(windows) { "\r\n" } else { "\n" };

fn line_terminator() -> Terminator {
    if cfg!(windows) {
        Terminator::CRLF
    } else {
        Terminator::Any(b'\n')
    }
}

/// Byte buffer shared with the csv writer so it can be cleared between lines.
#[derive(Clone, Default)]
struct LineBuf(Rc<RefCell<Vec<u8>>>);

impl Write for LineBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encodes one record at a time so each line reaches the sink whole.
struct LineEncoder {
    csv: ::csv::Writer<LineBuf>,
    buf: LineBuf,
}

impl LineEncoder {
    fn new(delimiter: char) -> Self {
        let buf = LineBuf(Rc::new(RefCell::new(Vec::with_capacity(256))));
        // Validated ASCII before the sink is opened.
        let csv = WriterBuilder::new()
            .delimiter(delimiter as u8)
            .terminator(line_terminator())
            .from_writer(buf.clone());
        Self { csv, buf }
    }

    fn write_line<I, T>(&mut self, out: &mut dyn Write, fields: I) -> io::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.csv.write_record(fields).map_err(io::Error::from)?;
        self.csv.flush()?;
        let written = out.write_all(&self.buf.0.borrow());
        self.buf.0.borrow_mut().clear();
        written
    }
}

impl FormatWriter for CsvWriter {
    fn name(&self) -> &'static str {
        FORMAT_CSV
    }

    fn write(
        &self,
        cursor: &mut dyn RowCursor,
        out: &mut dyn Write,
        ctx: ExportContext<'_>,
        progress: &mut Progress,
    ) -> ExportResult<()> {
        let columns = cursor.columns().to_vec();
        let mut encoder = LineEncoder::new(ctx.options.delimiter);

        if !ctx.options.no_header {
            encoder.write_line(out, columns.iter().map(|c| c.name.as_str()))?;
            tracing::debug!("CSV header written ({} columns)", columns.len());
        }

        let renderer = TextRenderer::new(ctx.settings);
        let mut record = Vec::with_capacity(columns.len());
        while let Some(row) = ctx.next_row(cursor, progress)? {
            match row.as_slice() {
                // The encoder quotes a lone empty field; a null stays unquoted.
                [only] if only.is_null() => out.write_all(LINE_END.as_bytes())?,
                _ => {
                    record.clear();
                    record.extend(
                        columns.iter().zip(&row).map(|(col, v)| renderer.render(col, v)),
                    );
                    encoder.write_line(out, &record)?;
                }
            }

            if progress.row_written() {
                out.flush()?;
                tracing::debug!("{} rows written", progress.rows);
            }
        }

        out.flush()?;
        progress.outcome()
    }

    fn bulk(&self) -> Option<&dyn BulkExport> {
        Some(self)
    }
}

impl BulkExport for CsvWriter {
    fn export_copy(
        &self,
        source: &mut dyn CopySource,
        query: &str,
        path: &Path,
        options: &ExportOptions,
        cancel: &CancelToken,
    ) -> ExportResult<ExportSummary> {
        crate::bulk::export_copy(source, query, path, options, cancel)
    }
}
