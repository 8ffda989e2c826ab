//! Streaming format writers and the export driver.
//!
//! Every writer drains a [`RowCursor`] one row at a time into an output
//! stream. [`run_export`] owns everything around that: validation, opening
//! the [`OutputSink`], closing it on every path, and attaching the format,
//! path and row count to errors.

mod csv;
mod json;
mod sql;
mod xml;
mod yaml;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::cursor::{CopySource, RowCursor};
use crate::error::{ExportError, ExportResult};
use crate::formatter::RenderSettings;
use crate::options::ExportOptions;
use crate::sink::OutputSink;
use crate::value::Value;

pub use self::csv::CsvWriter;
pub use self::json::JsonWriter;
pub use self::sql::SqlWriter;
pub use self::xml::XmlWriter;
pub use self::yaml::YamlWriter;

/// Row-oriented writers flush the sink every this many rows.
pub const FLUSH_EVERY_ROWS: u64 = 10_000;
/// The SQL writer flushes every this many statements.
pub const FLUSH_EVERY_STATEMENTS: u64 = 1_000;

/// A streaming writer for one output format.
pub trait FormatWriter: Send + Sync {
    /// Registry name, e.g. `csv`.
    fn name(&self) -> &'static str;

    /// File extension used for zip members.
    fn extension(&self) -> &'static str {
        self.name()
    }

    /// Format-specific option checks, run before the output is created.
    fn validate(&self, _options: &ExportOptions) -> ExportResult<()> {
        Ok(())
    }

    /// Drain `cursor` into `out`, recording progress as rows are written.
    fn write(
        &self,
        cursor: &mut dyn RowCursor,
        out: &mut dyn Write,
        ctx: ExportContext<'_>,
        progress: &mut Progress,
    ) -> ExportResult<()>;

    /// The native bulk-transfer path, for writers that have one.
    fn bulk(&self) -> Option<&dyn BulkExport> {
        None
    }
}

/// Export that hands row formatting to the database's `COPY` protocol.
pub trait BulkExport {
    fn export_copy(
        &self,
        source: &mut dyn CopySource,
        query: &str,
        path: &Path,
        options: &ExportOptions,
        cancel: &CancelToken,
    ) -> ExportResult<ExportSummary>;
}

/// Read-only inputs shared by a writer for one export.
#[derive(Clone, Copy)]
pub struct ExportContext<'a> {
    pub options: &'a ExportOptions,
    pub settings: &'a RenderSettings,
    pub cancel: &'a CancelToken,
}

impl ExportContext<'_> {
    /// Fetch the next row, or `None` at the end of the cursor or once the
    /// export has been cancelled.
    pub fn next_row(
        &self,
        cursor: &mut dyn RowCursor,
        progress: &mut Progress,
    ) -> ExportResult<Option<Vec<Value>>> {
        if self.cancel.is_cancelled() {
            progress.cancelled = true;
            return Ok(None);
        }
        cursor.next_row()
    }
}

/// Counters updated while a writer runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Rows fully handed to the sink. The sink buffers, so these are only
    /// durable once it has been closed without error.
    pub rows: u64,
    /// INSERT statements written (sql only).
    pub statements: u64,
    cancelled: bool,
}

impl Progress {
    /// Count one written row; returns `true` when it is time to flush.
    pub fn row_written(&mut self) -> bool {
        self.rows += 1;
        self.rows % FLUSH_EVERY_ROWS == 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// What a writer returns after closing its document.
    pub fn outcome(&self) -> ExportResult<()> {
        if self.cancelled {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub format: String,
    /// Artifact path, including any suffix added for compression.
    pub path: PathBuf,
    pub rows: u64,
    pub statements: u64,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Run `writer` over `cursor`, writing to `path`.
///
/// The sink is created only after validation passes and is closed on every
/// path. Fatal errors come back wrapped in [`ExportError::Export`].
pub fn run_export(
    writer: &dyn FormatWriter,
    cursor: &mut dyn RowCursor,
    path: &Path,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> ExportResult<ExportSummary> {
    let start = Instant::now();
    let format = writer.name();
    let fail = |err: ExportError, path: &Path, row: u64| err.in_export(format, path, row);

    options
        .validate()
        .and_then(|_| writer.validate(options))
        .map_err(|e| fail(e, path, 0))?;
    let settings = RenderSettings::from_options(options).map_err(|e| fail(e, path, 0))?;

    tracing::debug!(
        "Preparing {} export (compression={}, columns={})",
        format,
        options.compression,
        cursor.columns().len()
    );

    let mut sink = OutputSink::create(path, options.compression, writer.extension())
        .map_err(|e| fail(e, path, 0))?;
    let artifact = sink.path().to_path_buf();

    let ctx = ExportContext {
        options,
        settings: &settings,
        cancel,
    };
    let mut progress = Progress::default();
    let written = writer.write(cursor, &mut sink, ctx, &mut progress);
    let closed = sink.finish();

    if let Err(err) = written.and(closed) {
        return Err(fail(err, &artifact, progress.rows));
    }

    let elapsed = start.elapsed();
    tracing::debug!(
        "{} export completed: {} rows written to {} in {:?}",
        format,
        progress.rows,
        artifact.display(),
        elapsed
    );

    Ok(ExportSummary {
        format: format.to_string(),
        path: artifact,
        rows: progress.rows,
        statements: progress.statements,
        warnings: settings.warnings,
        elapsed,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cursor::MemoryCursor;
    use crate::value::{Column, TypeKind};

    pub fn two_rows() -> MemoryCursor {
        MemoryCursor::new(
            vec![Column::new("id", TypeKind::Int4), Column::new("name", TypeKind::Text)],
            vec![vec![1.into(), "a".into()], vec![2.into(), Value::Null]],
        )
    }

    /// Run a writer into memory with default settings for `options`.
    pub fn render(
        writer: &dyn FormatWriter,
        cursor: &mut dyn RowCursor,
        options: &ExportOptions,
    ) -> (String, Progress, ExportResult<()>) {
        let settings = RenderSettings::from_options(options).unwrap();
        let cancel = CancelToken::new();
        let ctx = ExportContext {
            options,
            settings: &settings,
            cancel: &cancel,
        };
        let mut out = Vec::new();
        let mut progress = Progress::default();
        let result = writer.write(cursor, &mut out, ctx, &mut progress);
        (String::from_utf8(out).unwrap(), progress, result)
    }
}
