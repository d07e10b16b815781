//! Structured data parsers
//!
//! A [`Parser`] wraps a file path and knows how to read it and how to search
//! inside the parsed content with a path spec. Parsers compare by content:
//! two parsers over different files are equal when the files parse to equal
//! data.

pub mod dataset;
pub mod delimited;
pub mod factory;
pub mod json;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::common::files::glob_file;
use crate::common::Result;
use crate::value::{json_eq, Value};

use dataset::Group;
use delimited::{Delimiter, Table};

pub use factory::ParserRegistry;

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    /// Tab-separated two-column key-value file
    TsvKeyValue,
    /// Comma-separated two-column key-value file
    CsvKeyValue,
    /// Tab-separated table with a header row
    TsvTable,
    /// Comma-separated table with a header row
    CsvTable,
    Json,
    /// NPZ archive of arrays
    Dataset,
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParserKind::TsvKeyValue => "TsvKeyValueParser",
            ParserKind::CsvKeyValue => "CsvKeyValueParser",
            ParserKind::TsvTable => "TsvTableParser",
            ParserKind::CsvTable => "CsvTableParser",
            ParserKind::Json => "JsonParser",
            ParserKind::Dataset => "DatasetParser",
        };
        f.write_str(name)
    }
}

/// Parsed file content
#[derive(Debug, Clone)]
pub enum Parsed {
    KeyValue(IndexMap<String, String>),
    Table(Table),
    Json(JsonValue),
    Dataset(Group),
}

impl Parsed {
    /// The whole content as a value
    pub fn to_value(&self) -> Value {
        match self {
            Parsed::KeyValue(map) => Value::Json(key_values_json(map)),
            Parsed::Table(t) => Value::Table(t.clone()),
            Parsed::Json(v) => Value::Json(v.clone()),
            Parsed::Dataset(g) => Value::Group(g.clone()),
        }
    }

    /// Look up `spec` in the content
    ///
    /// Key-value and JSON content take a key, an index, or a list of them.
    /// Tables take filter criteria. Datasets take group names followed by
    /// array indices. An empty list selects everything.
    pub fn search(&self, spec: &JsonValue) -> Result<Value> {
        match self {
            Parsed::KeyValue(map) => {
                let obj = key_values_json(map);
                json::json_get(&obj, &json::as_path(spec)).map(|v| Value::Json(v.clone()))
            }
            Parsed::Json(v) => json::json_get(v, &json::as_path(spec)).map(|v| Value::Json(v.clone())),
            Parsed::Table(t) => t.filter(&delimited::parse_criteria(spec)?).map(Value::Table),
            Parsed::Dataset(g) => g.search(&json::as_path(spec)),
        }
    }
}

impl PartialEq for Parsed {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Parsed::KeyValue(a), Parsed::KeyValue(b)) => a == b,
            (Parsed::Table(a), Parsed::Table(b)) => a == b,
            (Parsed::Json(a), Parsed::Json(b)) => json_eq(a, b),
            (Parsed::Dataset(a), Parsed::Dataset(b)) => a == b,
            _ => false,
        }
    }
}

fn key_values_json(map: &IndexMap<String, String>) -> JsonValue {
    JsonValue::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
            .collect(),
    )
}

/// A file plus the format used to read it
///
/// Construction never touches the filesystem. With caching on, the first
/// successful parse is kept and every later [`Parser::parse`] returns the
/// same `Arc`.
#[derive(Debug, Clone)]
pub struct Parser {
    kind: ParserKind,
    path: PathBuf,
    cache: bool,
    column_names: Option<Vec<String>>,
    parsed: OnceLock<Arc<Parsed>>,
}

impl Parser {
    pub fn new(kind: ParserKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            cache: false,
            column_names: None,
            parsed: OnceLock::new(),
        }
    }

    /// Build a parser for the single file matching a wildcard pattern
    pub fn from_glob(kind: ParserKind, pattern: &str) -> Result<Self> {
        Ok(Self::new(kind, glob_file(pattern)?))
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the header row of a table
    pub fn with_column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = Some(names);
        self
    }

    pub fn kind(&self) -> ParserKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_cached(&self) -> bool {
        self.cache
    }

    /// Read and parse the file
    pub fn parse(&self) -> Result<Arc<Parsed>> {
        if let Some(parsed) = self.parsed.get() {
            return Ok(parsed.clone());
        }
        let parsed = Arc::new(self.read()?);
        if !self.cache {
            return Ok(parsed);
        }
        let _ = self.parsed.set(parsed.clone());
        Ok(self.parsed.get().cloned().unwrap_or(parsed))
    }

    /// Parse, then look up `spec` in the content
    pub fn search(&self, spec: &JsonValue) -> Result<Value> {
        self.parse()?.search(spec)
    }

    fn read(&self) -> Result<Parsed> {
        tracing::debug!(parser = %self.kind, path = %self.path.display(), "Parsing file");
        let names = self.column_names.as_deref();
        Ok(match self.kind {
            ParserKind::TsvKeyValue => {
                Parsed::KeyValue(delimited::read_key_values(&self.path, Delimiter::Tab)?)
            }
            ParserKind::CsvKeyValue => {
                Parsed::KeyValue(delimited::read_key_values(&self.path, Delimiter::Comma)?)
            }
            ParserKind::TsvTable => {
                Parsed::Table(delimited::read_table(&self.path, Delimiter::Tab, names)?)
            }
            ParserKind::CsvTable => {
                Parsed::Table(delimited::read_table(&self.path, Delimiter::Comma, names)?)
            }
            ParserKind::Json => Parsed::Json(json::json_load(&self.path)?),
            ParserKind::Dataset => Parsed::Dataset(dataset::read_npz(&self.path)?),
        })
    }
}

impl PartialEq for Parser {
    fn eq(&self, other: &Self) -> bool {
        if self.path == other.path {
            return true;
        }
        match (self.parse(), other.parse()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use serde_json::json;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_construction_does_not_check_existence() {
        let parser = Parser::new(ParserKind::Json, "/does/not/exist.json");
        assert!(matches!(parser.parse(), Err(Error::Io(_))));
    }

    #[test]
    fn test_cached_parse_is_same_object() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "a.json", r#"{"values": [{"1": 2}]}"#);

        let parser = Parser::new(ParserKind::Json, &path).with_cache(true);
        assert!(Arc::ptr_eq(&parser.parse().unwrap(), &parser.parse().unwrap()));
        assert_eq!(parser.search(&json!(["values", 0, "1"])).unwrap(), Value::Json(json!(2)));
        assert_eq!(parser.search(&json!(["values", 0, "1"])).unwrap(), Value::Json(json!(2)));
    }

    #[test]
    fn test_uncached_parse_is_new_object() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "a.json", r#"{"a": 1}"#);

        let parser = Parser::new(ParserKind::Json, &path);
        let first = parser.parse().unwrap();
        let second = parser.parse().unwrap();
        assert_eq!(first, second);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_equality_is_by_content() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a.json", r#"{"x": [1, 2]}"#);
        let b = write(tmp.path(), "b.json", r#"{"x": [1.0, 2.0]}"#);
        let c = write(tmp.path(), "c.json", r#"{"x": [3]}"#);

        let pa = Parser::new(ParserKind::Json, &a);
        assert_eq!(pa, Parser::new(ParserKind::Json, &b));
        assert_ne!(pa, Parser::new(ParserKind::Json, &c));
        assert_ne!(pa, Parser::new(ParserKind::Json, tmp.path().join("missing.json")));
    }

    #[test]
    fn test_key_value_search() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "kv.tsv", "key1\tvalue1\nkey2\tvalue2\n");
        let parser = Parser::new(ParserKind::TsvKeyValue, &path);

        assert_eq!(parser.search(&json!("key2")).unwrap(), Value::Json(json!("value2")));
        assert!(matches!(parser.search(&json!("key3")), Err(Error::KeyNotFound(_))));
        assert_eq!(
            parser.search(&json!([])).unwrap(),
            Value::Json(json!({"key1": "value1", "key2": "value2"}))
        );
    }

    #[test]
    fn test_table_search() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "t.csv", "col1,col2\na,4\nb,5\n");
        let parser = Parser::new(ParserKind::CsvTable, &path);

        let Value::Table(hits) = parser.search(&json!(["col2", 4])).unwrap() else {
            panic!("expected a table");
        };
        assert_eq!(hits.len(), 1);

        let Value::Table(all) = parser.search(&json!([])).unwrap() else {
            panic!("expected a table");
        };
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_table_column_names_override() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "t.tsv", "x\ty\n1\t2\n");
        let parser = Parser::new(ParserKind::TsvTable, &path)
            .with_column_names(vec!["a".into(), "b".into()]);

        let Parsed::Table(table) = &*parser.parse().unwrap() else {
            panic!("expected a table");
        };
        assert_eq!(table.columns(), ["a", "b"]);
    }

    #[test]
    fn test_from_glob() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "result_7.json", "[]");
        let parser =
            Parser::from_glob(ParserKind::Json, &format!("{}/result_*.json", tmp.path().display()))
                .unwrap();
        assert_eq!(parser.path(), path);

        assert!(matches!(
            Parser::from_glob(ParserKind::Json, &format!("{}/*.tsv", tmp.path().display())),
            Err(Error::InvalidWildcard { .. })
        ));
    }
}
