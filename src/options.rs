//! Export options.

use std::fmt;
use std::str::FromStr;

use crate::error::{ExportError, ExportResult};
use crate::time::{DEFAULT_TIME_PATTERN, TimePattern};

pub const FORMAT_CSV: &str = "csv";
pub const FORMAT_JSON: &str = "json";
pub const FORMAT_XML: &str = "xml";
pub const FORMAT_SQL: &str = "sql";
pub const FORMAT_YAML: &str = "yaml";

pub const DEFAULT_XML_ROOT: &str = "results";
pub const DEFAULT_XML_ROW: &str = "row";

/// Compression applied to the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    /// A single gzip stream; the output gets a `.gz` suffix.
    Gzip,
    /// A zip archive with one member named after the output.
    Zip,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zip => "zip",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Compression::None),
            "gzip" | "gz" | "stream" => Ok(Compression::Gzip),
            "zip" | "archive" => Ok(Compression::Zip),
            other => Err(ExportError::config(format!(
                "invalid compression '{other}'. Valid options are: none, gzip, zip"
            ))),
        }
    }
}

/// Parse a delimiter argument. `\t` stands for a tab; anything else must be
/// exactly one ASCII character.
pub fn parse_delimiter(raw: &str) -> ExportResult<char> {
    let delim = raw.trim();
    if delim.is_empty() {
        return Err(ExportError::config("delimiter cannot be empty"));
    }
    if delim == r"\t" {
        return Ok('\t');
    }

    let mut chars = delim.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        (Some(c), None) => Err(ExportError::config(format!(
            "delimiter {c:?} must be an ASCII character"
        ))),
        _ => Err(ExportError::config(
            r"delimiter must be a single character (use \t for tab)",
        )),
    }
}

/// Immutable configuration for one export call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: String,
    pub delimiter: char,
    /// Target of generated INSERTs, optionally schema-qualified.
    pub table_name: String,
    pub compression: Compression,
    pub time_format: String,
    /// IANA zone name; empty means local time.
    pub time_zone: String,
    pub no_header: bool,
    pub xml_root_element: String,
    pub xml_row_element: String,
    pub rows_per_statement: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: FORMAT_CSV.to_string(),
            delimiter: ',',
            table_name: String::new(),
            compression: Compression::None,
            time_format: DEFAULT_TIME_PATTERN.to_string(),
            time_zone: String::new(),
            no_header: false,
            xml_root_element: DEFAULT_XML_ROOT.to_string(),
            xml_row_element: DEFAULT_XML_ROW.to_string(),
            rows_per_statement: 1,
        }
    }
}

impl ExportOptions {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = table.into();
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_time_format(mut self, pattern: impl Into<String>) -> Self {
        self.time_format = pattern.into();
        self
    }

    pub fn with_time_zone(mut self, zone: impl Into<String>) -> Self {
        self.time_zone = zone.into();
        self
    }

    pub fn without_header(mut self) -> Self {
        self.no_header = true;
        self
    }

    pub fn with_xml_elements(mut self, root: impl Into<String>, row: impl Into<String>) -> Self {
        self.xml_root_element = root.into();
        self.xml_row_element = row.into();
        self
    }

    pub fn with_rows_per_statement(mut self, rows: usize) -> Self {
        self.rows_per_statement = rows;
        self
    }

    /// Lower-cased, trimmed format name used for registry lookups.
    pub fn normalized_format(&self) -> String {
        self.format.trim().to_ascii_lowercase()
    }

    /// Checks shared by every format. Format-specific checks live with the
    /// writers.
    pub fn validate(&self) -> ExportResult<()> {
        if self.normalized_format().is_empty() {
            return Err(ExportError::config("format cannot be empty"));
        }
        TimePattern::parse(&self.time_format)?;
        if !self.delimiter.is_ascii() {
            return Err(ExportError::config(format!(
                "delimiter {:?} must be an ASCII character",
                self.delimiter
            )));
        }
        if matches!(self.delimiter, '\n' | '\r' | '"') {
            return Err(ExportError::config(format!(
                "delimiter {:?} cannot be used",
                self.delimiter
            )));
        }
        Ok(())
    }
}
