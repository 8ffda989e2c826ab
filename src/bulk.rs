//! Bulk export through `COPY ... TO STDOUT`.
//!
//! The database formats every row itself; chunks are written to the sink as
//! they arrive. This is faster than the row path but ignores the time
//! pattern and timezone options, so values come out in the server's own text
//! form.

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::cursor::CopySource;
use crate::error::{ExportError, ExportResult};
use crate::options::{ExportOptions, FORMAT_CSV};
use crate::quote::quote_literal;
use crate::sink::OutputSink;
use crate::writers::ExportSummary;

/// Build the `COPY` statement for `query`.
///
/// ```
/// use qail_export::bulk::copy_statement;
///
/// assert_eq!(
///     copy_statement("SELECT * FROM users;", ',', true),
///     "COPY (SELECT * FROM users) TO STDOUT WITH (FORMAT csv, HEADER true, DELIMITER ',')"
/// );
/// ```
pub fn copy_statement(query: &str, delimiter: char, header: bool) -> String {
    let query = query.trim().trim_end_matches(';').trim_end();
    format!(
        "COPY ({}) TO STDOUT WITH (FORMAT csv, HEADER {}, DELIMITER {})",
        query,
        header,
        quote_literal(&delimiter.to_string())
    )
}

/// Counts CSV records in a byte stream split at arbitrary points. Newlines
/// inside quoted fields do not end a record.
#[derive(Debug, Default, Clone)]
pub struct RecordCounter {
    records: u64,
    in_quotes: bool,
    partial: bool,
}

impl RecordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        for &b in chunk {
            match b {
                b'"' => {
                    self.in_quotes = !self.in_quotes;
                    self.partial = true;
                }
                b'\n' if !self.in_quotes => {
                    self.records += 1;
                    self.partial = false;
                }
                _ => self.partial = true,
            }
        }
    }

    /// Records seen so far, counting an unterminated last line.
    pub fn records(&self) -> u64 {
        self.records + u64::from(self.partial)
    }
}

/// Stream `COPY (query) TO STDOUT` output into a new sink at `path`.
///
/// Cancellation is checked between chunks; a cancelled transfer still closes
/// the sink, leaving a truncated file.
pub fn export_copy(
    source: &mut dyn CopySource,
    query: &str,
    path: &Path,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> ExportResult<ExportSummary> {
    let start = Instant::now();
    options
        .validate()
        .map_err(|e| e.in_export(FORMAT_CSV, path, 0))?;

    let header = !options.no_header;
    let statement = copy_statement(query, options.delimiter, header);
    tracing::info!("Using COPY bulk export (delimiter={:?})", options.delimiter);
    tracing::debug!("{}", statement);

    let mut sink = OutputSink::create(path, options.compression, FORMAT_CSV)
        .map_err(|e| e.in_export(FORMAT_CSV, path, 0))?;
    let artifact = sink.path().to_path_buf();

    let mut counter = RecordCounter::new();
    let rows = |counter: &RecordCounter| {
        let records = counter.records();
        if header { records.saturating_sub(1) } else { records }
    };

    let copied = copy_chunks(source, &statement, &mut sink, &mut counter, cancel);
    let closed = sink.finish();
    if let Err(err) = copied.and(closed) {
        return Err(err.in_export(FORMAT_CSV, &artifact, rows(&counter)));
    }

    let rows = rows(&counter);
    let elapsed = start.elapsed();
    tracing::debug!(
        "COPY export completed: {} rows written to {} in {:?}",
        rows,
        artifact.display(),
        elapsed
    );

    Ok(ExportSummary {
        format: FORMAT_CSV.to_string(),
        path: artifact,
        rows,
        statements: 0,
        warnings: Vec::new(),
        elapsed,
    })
}

fn copy_chunks(
    source: &mut dyn CopySource,
    statement: &str,
    sink: &mut OutputSink,
    counter: &mut RecordCounter,
    cancel: &CancelToken,
) -> ExportResult<()> {
    let chunks = source.copy_out(statement)?;
    for chunk in chunks {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        let chunk = chunk?;
        sink.write_all(&chunk)?;
        counter.feed(&chunk);
    }
    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCopySource;

    #[test]
    fn test_copy_statement() {
        assert_eq!(
            copy_statement("select 1", '\t', false),
            "COPY (select 1) TO STDOUT WITH (FORMAT csv, HEADER false, DELIMITER '\t')"
        );
        assert_eq!(
            copy_statement("select 1 ;  ", '\'', true),
            "COPY (select 1) TO STDOUT WITH (FORMAT csv, HEADER true, DELIMITER '''')"
        );
    }

    #[test]
    fn test_record_counter_across_chunks() {
        let mut counter = RecordCounter::new();
        counter.feed(b"id,note\n1,\"multi");
        counter.feed(b"\nline\"\n2,plain\n");
        assert_eq!(counter.records(), 3);

        counter.feed(b"3,no newline");
        assert_eq!(counter.records(), 4);
    }

    #[test]
    fn test_export_copy_streams_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk.csv");
        let mut source = MemoryCopySource::new(vec![&b"id,name\n1,a\n"[..], &b"2,\n"[..]]);

        let summary = export_copy(
            &mut source,
            "SELECT id, name FROM users",
            &path,
            &ExportOptions::new("csv"),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,name\n1,a\n2,\n");
        assert_eq!(
            source.statements,
            vec![
                "COPY (SELECT id, name FROM users) TO STDOUT \
                 WITH (FORMAT csv, HEADER true, DELIMITER ',')"
            ]
        );
    }

    #[test]
    fn test_export_copy_cancelled_still_closes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk.csv");
        let mut source = MemoryCopySource::new(vec![&b"1\n"[..]]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = export_copy(
            &mut source,
            "select 1",
            &path,
            &ExportOptions::new("csv").without_header(),
            &cancel,
        )
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.rows_written(), Some(0));
        assert!(path.exists());
    }
}
