//! # qail-export
//!
//! Stream PostgreSQL query results into CSV, JSON, XML, YAML or SQL `INSERT`
//! files, optionally gzip- or zip-compressed, one row at a time.
//!
//! ## Quick Example
//!
//! ```
//! use qail_export::prelude::*;
//!
//! let mut cursor = MemoryCursor::new(
//!     vec![Column::new("id", TypeKind::Int4), Column::new("name", TypeKind::Text)],
//!     vec![vec![1.into(), "a".into()], vec![2.into(), Value::Null]],
//! );
//!
//! let dir = std::env::temp_dir().join("qail-export-doc");
//! std::fs::create_dir_all(&dir).unwrap();
//! let options = ExportOptions::new("sql").with_table("users");
//! let summary = qail_export::export(&mut cursor, dir.join("users.sql"), &options).unwrap();
//! assert_eq!(summary.rows, 2);
//! ```
//!
//! ## Formats
//!
//! | Format | Null | Notes |
//! |--------|------|-------|
//! | `csv`  | empty field | header row, configurable delimiter, `COPY` fast path |
//! | `json` | `null` | array of objects, keys in column order |
//! | `xml`  | empty element | configurable root and row element names |
//! | `yaml` | `null` | sequence of mappings |
//! | `sql`  | `NULL` | batched `insert into` statements |

pub mod batch;
pub mod bulk;
pub mod cancel;
pub mod config;
pub mod cursor;
pub mod error;
pub mod formatter;
pub mod options;
pub mod postgres;
pub mod quote;
pub mod registry;
pub mod sink;
pub mod time;
pub mod value;
pub mod writers;

use std::path::Path;

pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::cursor::{CopySource, MemoryCopySource, MemoryCursor, RowCursor};
    pub use crate::error::*;
    pub use crate::options::{Compression, ExportOptions};
    pub use crate::registry::{FormatRegistry, registry};
    pub use crate::value::{Column, Interval, TypeKind, Value};
    pub use crate::writers::{ExportSummary, FormatWriter};
}

use crate::cancel::CancelToken;
use crate::cursor::{CopySource, RowCursor};
use crate::error::{ExportError, ExportResult};
use crate::options::ExportOptions;
use crate::writers::ExportSummary;

/// Export every row of `cursor` to `path` in `options.format`.
pub fn export(
    cursor: &mut dyn RowCursor,
    path: impl AsRef<Path>,
    options: &ExportOptions,
) -> ExportResult<ExportSummary> {
    export_with_cancel(cursor, path, options, &CancelToken::new())
}

/// Like [`export`], stopping early once `cancel` trips.
pub fn export_with_cancel(
    cursor: &mut dyn RowCursor,
    path: impl AsRef<Path>,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> ExportResult<ExportSummary> {
    let path = path.as_ref();
    let format = options.normalized_format();
    let writer = registry::registry()
        .get(&format)
        .map_err(|e| e.in_export(&format, path, 0))?;
    writers::run_export(writer.as_ref(), cursor, path, options, cancel)
}

/// Export through the database's `COPY` protocol. Only formats with a bulk
/// path (csv) support this.
pub fn export_copy(
    source: &mut dyn CopySource,
    query: &str,
    path: impl AsRef<Path>,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> ExportResult<ExportSummary> {
    let path = path.as_ref();
    let format = options.normalized_format();
    let writer = registry::registry()
        .get(&format)
        .map_err(|e| e.in_export(&format, path, 0))?;
    match writer.bulk() {
        Some(bulk) => bulk.export_copy(source, query, path, options, cancel),
        None => Err(ExportError::config(format!(
            "COPY export is only available for csv, not {format}"
        ))
        .in_export(&format, path, 0)),
    }
}
