//! Delimiter-separated text: key-value files and tables
//!
//! Quoting follows the usual CSV rules, so quoted fields may hold the
//! delimiter and newlines.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::common::{Error, Result};
use crate::value::{cell_text, json_eq, type_string};

/// Field separator of a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }
}

fn reader(path: &Path, delimiter: Delimiter) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .from_path(path)?)
}

/// Read a two-column file into an ordered key to value mapping
pub fn read_key_values(path: &Path, delimiter: Delimiter) -> Result<IndexMap<String, String>> {
    let mut map = IndexMap::new();
    for (line, record) in reader(path, delimiter)?.records().enumerate() {
        let record = record?;
        match (record.get(0), record.get(1)) {
            (Some(key), Some(value)) => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(Error::parse(
                    path,
                    format!("record {} has {} fields, expected 2", line + 1, record.len()),
                ))
            }
        }
    }
    Ok(map)
}

/// Read a file whose first row is a header into a [`Table`]
///
/// Cell types are inferred with [`type_string`]. `column_names` replaces the
/// header row when given.
pub fn read_table(
    path: &Path,
    delimiter: Delimiter,
    column_names: Option<&[String]>,
) -> Result<Table> {
    let mut records = reader(path, delimiter)?.into_records();
    let header: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => Vec::new(),
    };
    let columns = match column_names {
        Some(names) => names.to_vec(),
        None => header,
    };

    let mut rows = Vec::new();
    for (line, record) in records.enumerate() {
        let record = record?;
        if record.len() > columns.len() {
            return Err(Error::parse(
                path,
                format!(
                    "row {} has {} fields, expected at most {}",
                    line + 2,
                    record.len(),
                    columns.len()
                ),
            ));
        }
        let mut row: Vec<JsonValue> = record.iter().map(type_string).collect();
        row.resize(columns.len(), JsonValue::Null);
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

/// Rows and named columns of typed cells
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<JsonValue>>,
}

/// One `column == value` constraint
pub type Criterion = (String, JsonValue);

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<JsonValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<JsonValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&JsonValue>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Rows matching every criterion
    ///
    /// No criteria returns the table unchanged. An unknown column raises
    /// `KeyNotFound`.
    pub fn filter(&self, criteria: &[Criterion]) -> Result<Table> {
        let mut resolved = Vec::with_capacity(criteria.len());
        for (column, wanted) in criteria {
            let idx = self
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| Error::KeyNotFound(column.clone()))?;
            resolved.push((idx, wanted));
        }
        let rows = self
            .rows
            .iter()
            .filter(|row| resolved.iter().all(|(idx, wanted)| cell_matches(&row[*idx], wanted)))
            .cloned()
            .collect();
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Render as JSON records, one object per row
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(
            self.rows
                .iter()
                .map(|row| {
                    JsonValue::Object(
                        self.columns
                            .iter()
                            .cloned()
                            .zip(row.iter().cloned())
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

/// Typed equality, or a string constraint equal to the cell's text
fn cell_matches(cell: &JsonValue, wanted: &JsonValue) -> bool {
    if json_eq(cell, wanted) {
        return true;
    }
    matches!(wanted, JsonValue::String(s) if *s == cell_text(cell))
}

/// Parse table search criteria
///
/// Accepts a single `[column, value]` pair, a list of such pairs, or an
/// empty list.
pub fn parse_criteria(spec: &JsonValue) -> Result<Vec<Criterion>> {
    let items = match spec {
        JsonValue::Array(items) => items,
        other => {
            return Err(Error::InvalidOperation(format!(
                "table criteria must be a [column, value] pair or a list of pairs, got {other}"
            )))
        }
    };
    if items.iter().all(JsonValue::is_array) {
        items.iter().map(pair).collect()
    } else {
        Ok(vec![pair(spec)?])
    }
}

fn pair(item: &JsonValue) -> Result<Criterion> {
    match item.as_array().map(Vec::as_slice) {
        Some([JsonValue::String(column), value]) => Ok((column.clone(), value.clone())),
        _ => Err(Error::InvalidOperation(format!(
            "table criterion must be a [column, value] pair, got {item}"
        ))),
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_eq(x, y))
            })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            write!(f, "\n{}", cells.join("\t"))?;
        }
        Ok(())
    }
}
