//! Multi-row INSERT batching.

use std::io::{self, Write};

use crate::error::{ExportError, ExportResult};
use crate::quote::quote_ident;

/// Accumulates rendered rows and emits them as one
/// `insert into .. values (..),(..);` statement per batch.
///
/// The buffer holds at most `rows_per_statement` rows; callers drain it when
/// [`push`](Self::push) reports it full and once more at end of stream.
#[derive(Debug)]
pub struct BatchBuilder {
    header: String,
    capacity: usize,
    rows: Vec<Vec<String>>,
}

impl BatchBuilder {
    pub fn new<S: AsRef<str>>(
        table: &str,
        columns: &[S],
        rows_per_statement: usize,
    ) -> ExportResult<Self> {
        if table.trim().is_empty() {
            return Err(ExportError::config("table name is required for SQL inserts"));
        }
        if rows_per_statement < 1 {
            return Err(ExportError::config("rows-per-statement must be at least 1"));
        }

        let columns: Vec<String> = columns.iter().map(|c| quote_ident(c.as_ref())).collect();
        let header = format!(
            "insert into {} ({}) values\n",
            quote_ident(table.trim()),
            columns.join(", ")
        );

        Ok(Self {
            header,
            capacity: rows_per_statement,
            rows: Vec::new(),
        })
    }

    /// Buffer one row of rendered literals. Returns `true` once the batch
    /// is full.
    pub fn push(&mut self, row: Vec<String>) -> bool {
        debug_assert!(self.rows.len() < self.capacity, "batch overflow");
        self.rows.push(row);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the buffered rows as one statement and clear the buffer.
    /// Returns the number of rows written; an empty buffer writes nothing.
    pub fn write_statement<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<usize> {
        if self.rows.is_empty() {
            return Ok(0);
        }

        let mut stmt = String::with_capacity(self.header.len() + self.rows.len() * 32);
        stmt.push_str(&self.header);
        let last = self.rows.len() - 1;
        for (i, row) in self.rows.iter().enumerate() {
            stmt.push_str("\t(");
            stmt.push_str(&row.join(", "));
            stmt.push_str(if i == last { ");\n" } else { "),\n" });
        }

        out.write_all(stmt.as_bytes())?;
        let written = self.rows.len();
        self.rows.clear();
        Ok(written)
    }
}
