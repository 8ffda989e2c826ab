//! Format name to writer lookup.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{ExportError, ExportResult};
use crate::writers::{CsvWriter, FormatWriter, JsonWriter, SqlWriter, XmlWriter, YamlWriter};

/// Creates a fresh writer for one export.
pub type WriterFactory = fn() -> Box<dyn FormatWriter>;

/// Table of available formats. Built once, read-only afterwards.
#[derive(Default)]
pub struct FormatRegistry {
    factories: HashMap<String, WriterFactory>,
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The formats this crate ships with.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("csv", || Box::new(CsvWriter));
        registry.register("json", || Box::new(JsonWriter));
        registry.register("xml", || Box::new(XmlWriter));
        registry.register("sql", || Box::new(SqlWriter));
        registry.register("yaml", || Box::new(YamlWriter));
        registry
    }

    /// Add a format, failing if the name is taken.
    pub fn try_register(&mut self, name: &str, factory: WriterFactory) -> ExportResult<()> {
        let key = normalize(name);
        if key.is_empty() {
            return Err(ExportError::config("format name cannot be empty"));
        }
        if self.factories.contains_key(&key) {
            return Err(ExportError::config(format!(
                "format {key:?} is already registered"
            )));
        }
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Add a format.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or already registered. Registration happens
    /// while building the table, so a clash is a programming error.
    pub fn register(&mut self, name: &str, factory: WriterFactory) {
        if let Err(err) = self.try_register(name, factory) {
            panic!("{err}");
        }
    }

    /// Writer for `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> ExportResult<Box<dyn FormatWriter>> {
        let key = normalize(name);
        match self.factories.get(&key) {
            Some(factory) => Ok(factory()),
            None => Err(ExportError::config(format!(
                "unsupported format {:?} (available: {})",
                name.trim(),
                self.formats().join(", ")
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize(name))
    }

    /// Registered names, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The process-wide registry of built-in formats.
pub fn registry() -> &'static FormatRegistry {
    static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FormatRegistry::builtin)
}
