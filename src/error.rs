//! Error types for qail-export.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which step of the compression layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStage {
    Open,
    Close,
}

impl fmt::Display for CompressionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionStage::Open => f.write_str("open"),
            CompressionStage::Close => f.write_str("close"),
        }
    }
}

/// The main error type for export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Invalid options, detected before any row is processed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sink creation, write or close failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The gzip/zip layer could not be opened or finalized.
    #[error("Compression error during {stage}: {source}")]
    Compression {
        stage: CompressionStage,
        #[source]
        source: std::io::Error,
    },

    /// The row cursor terminated with an error.
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// The export was cancelled or hit its deadline.
    #[error("Export was cancelled")]
    Cancelled,

    /// A fatal error with the export it happened in.
    #[error("{format} export to {} failed at row {row}: {source}", path.display())]
    Export {
        format: String,
        path: PathBuf,
        /// Rows successfully written before the failure.
        row: u64,
        #[source]
        source: Box<ExportError>,
    },
}

impl ExportError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a cursor error.
    pub fn cursor(message: impl Into<String>) -> Self {
        Self::Cursor(message.into())
    }

    /// Wrap this error with the export it belongs to.
    pub fn in_export(self, format: &str, path: impl Into<PathBuf>, row: u64) -> Self {
        Self::Export {
            format: format.to_string(),
            path: path.into(),
            row,
            source: Box::new(self),
        }
    }

    /// Rows written before the failure, when known.
    pub fn rows_written(&self) -> Option<u64> {
        match self {
            Self::Export { row, .. } => Some(*row),
            _ => None,
        }
    }

    /// The innermost error, skipping export context.
    pub fn root(&self) -> &ExportError {
        match self {
            Self::Export { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

/// A value could not be rendered; the field falls back to null.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot render {type_name} value: {message}")]
pub struct ConversionError {
    pub type_name: &'static str,
    pub message: String,
}

impl ConversionError {
    pub fn new(type_name: &'static str, message: impl Into<String>) -> Self {
        Self {
            type_name,
            message: message.into(),
        }
    }
}

/// Result type alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
