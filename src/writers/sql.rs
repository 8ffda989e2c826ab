//! Batched INSERT statements.

use std::io::Write;

use super::{ExportContext, FLUSH_EVERY_STATEMENTS, FormatWriter, Progress};
use crate::batch::BatchBuilder;
use crate::cursor::RowCursor;
use crate::error::{ExportError, ExportResult};
use crate::formatter::SqlRenderer;
use crate::options::{ExportOptions, FORMAT_SQL};

/// `insert into` statements that recreate the result set, `rows_per_statement`
/// rows per statement. The last statement carries whatever is left.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlWriter;

impl SqlWriter {
    fn emit(
        batch: &mut BatchBuilder,
        out: &mut dyn Write,
        progress: &mut Progress,
    ) -> ExportResult<()> {
        let rows = batch.write_statement(out)?;
        if rows == 0 {
            return Ok(());
        }
        progress.rows += rows as u64;
        progress.statements += 1;
        if progress.statements % FLUSH_EVERY_STATEMENTS == 0 {
            out.flush()?;
            tracing::debug!(
                "{} statements ({} rows) written",
                progress.statements,
                progress.rows
            );
        }
        Ok(())
    }
}

impl FormatWriter for SqlWriter {
    fn name(&self) -> &'static str {
        FORMAT_SQL
    }

    fn validate(&self, options: &ExportOptions) -> ExportResult<()> {
        if options.table_name.trim().is_empty() {
            return Err(ExportError::config(
                "table name is required for SQL format (use --table)",
            ));
        }
        if options.rows_per_statement < 1 {
            return Err(ExportError::config("rows-per-statement must be at least 1"));
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
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let mut batch = BatchBuilder::new(
            &ctx.options.table_name,
            &names,
            ctx.options.rows_per_statement,
        )?;
        let renderer = SqlRenderer::new(ctx.settings);

        while let Some(row) = ctx.next_row(cursor, progress)? {
            let literals = columns
                .iter()
                .zip(&row)
                .map(|(col, v)| renderer.render(col, v))
                .collect();
            if batch.push(literals) {
                Self::emit(&mut batch, out, progress)?;
            }
        }
        // Short final batch, also on cancellation.
        Self::emit(&mut batch, out, progress)?;
        out.flush()?;

        progress.outcome()
    }
}
