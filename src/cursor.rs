//! Row sources consumed by the writers.
//!
//! The caller owns the cursor; writers only read from it and never close it.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::{ExportError, ExportResult};
use crate::value::{Column, Value};

/// A forward-only iterator over query results.
pub trait RowCursor {
    /// Column metadata, available before the first row.
    fn columns(&self) -> &[Column];

    /// The next row, `Ok(None)` at the end, or the error that ended the
    /// result set.
    fn next_row(&mut self) -> ExportResult<Option<Vec<Value>>>;
}

impl<C: RowCursor + ?Sized> RowCursor for &mut C {
    fn columns(&self) -> &[Column] {
        (**self).columns()
    }

    fn next_row(&mut self) -> ExportResult<Option<Vec<Value>>> {
        (**self).next_row()
    }
}

/// Source of raw `COPY ... TO STDOUT` output for the bulk path.
pub trait CopySource {
    /// Run `statement` and return its output as a stream of chunks.
    fn copy_out<'a>(
        &'a mut self,
        statement: &str,
    ) -> ExportResult<Box<dyn Iterator<Item = ExportResult<Bytes>> + 'a>>;
}

/// A cursor over rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    columns: Vec<Column>,
    rows: VecDeque<Vec<Value>>,
    /// Error returned once the rows run out.
    fail_with: Option<String>,
}

impl MemoryCursor {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            fail_with: None,
        }
    }

    /// End the result set with an error instead of a clean finish.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowCursor for MemoryCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> ExportResult<Option<Vec<Value>>> {
        match self.rows.pop_front() {
            Some(row) => {
                if row.len() != self.columns.len() {
                    return Err(ExportError::cursor(format!(
                        "row has {} values but {} columns were described",
                        row.len(),
                        self.columns.len()
                    )));
                }
                Ok(Some(row))
            }
            None => match self.fail_with.take() {
                Some(msg) => Err(ExportError::Cursor(msg)),
                None => Ok(None),
            },
        }
    }
}

/// A copy source replaying fixed chunks, recording the statement it ran.
#[derive(Debug, Clone, Default)]
pub struct MemoryCopySource {
    chunks: Vec<Bytes>,
    pub statements: Vec<String>,
}

impl MemoryCopySource {
    pub fn new<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            statements: Vec::new(),
        }
    }
}

impl CopySource for MemoryCopySource {
    fn copy_out<'a>(
        &'a mut self,
        statement: &str,
    ) -> ExportResult<Box<dyn Iterator<Item = ExportResult<Bytes>> + 'a>> {
        self.statements.push(statement.to_string());
        Ok(Box::new(self.chunks.iter().cloned().map(Ok)))
    }
}
