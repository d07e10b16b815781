//! File format dispatch

use std::collections::HashMap;
use std::path::Path;

use super::{Parser, ParserKind};

/// Maps file names and extensions to parser kinds
///
/// Exact file names win over extensions.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    names: HashMap<String, ParserKind>,
    extensions: HashMap<String, ParserKind>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let extensions = [
            ("json", ParserKind::Json),
            ("tsv", ParserKind::TsvTable),
            ("csv", ParserKind::CsvTable),
            ("npz", ParserKind::Dataset),
        ]
        .into_iter()
        .map(|(ext, kind)| (ext.to_string(), kind))
        .collect();

        Self {
            names: HashMap::new(),
            extensions,
        }
    }
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `kind` for every file called `name`
    pub fn register_name(&mut self, name: impl Into<String>, kind: ParserKind) -> &mut Self {
        self.names.insert(name.into(), kind);
        self
    }

    /// Use `kind` for every file ending in `.{ext}`
    pub fn register_extension(&mut self, ext: impl Into<String>, kind: ParserKind) -> &mut Self {
        let ext = ext.into();
        self.extensions
            .insert(ext.trim_start_matches('.').to_string(), kind);
        self
    }

    pub fn parser_kind(&self, path: &Path) -> Option<ParserKind> {
        if let Some(kind) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.names.get(n))
        {
            return Some(*kind);
        }
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.extensions.get(e))
            .copied()
    }

    /// A parser for `path`, or `None` when the format is unknown
    pub fn get_parser(&self, path: &Path, cache: bool) -> Option<Parser> {
        self.parser_kind(path)
            .map(|kind| Parser::new(kind, path).with_cache(cache))
    }
}
