//! Hierarchical datasets stored as NPZ archives
//!
//! An archive is a zip file of `.npy` arrays. Directory components of the
//! entry names form nested groups, so `sub/group/dataset_3.npy` is the
//! dataset `dataset_3` inside group `group` inside group `sub`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde_json::{Number, Value as JsonValue};
use zip::write::SimpleFileOptions;

use super::json::normalize_index;
use crate::common::{Error, Result};
use crate::value::{json_eq, Value};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Flat element storage of a dataset
#[derive(Debug, Clone)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::UInt(v) => v.len(),
            ArrayData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element(&self, i: usize) -> JsonValue {
        match self {
            ArrayData::Bool(v) => JsonValue::Bool(v[i]),
            ArrayData::Int(v) => JsonValue::from(v[i]),
            ArrayData::UInt(v) => JsonValue::from(v[i]),
            ArrayData::Float(v) => Number::from_f64(v[i])
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
        }
    }

    fn slice(&self, start: usize, len: usize) -> ArrayData {
        let range = start..start + len;
        match self {
            ArrayData::Bool(v) => ArrayData::Bool(v[range].to_vec()),
            ArrayData::Int(v) => ArrayData::Int(v[range].to_vec()),
            ArrayData::UInt(v) => ArrayData::UInt(v[range].to_vec()),
            ArrayData::Float(v) => ArrayData::Float(v[range].to_vec()),
        }
    }
}

/// A multi-dimensional array in C order
#[derive(Debug, Clone)]
pub struct Dataset {
    shape: Vec<usize>,
    data: ArrayData,
}

impl Dataset {
    /// Fails when the element count doesn't match the shape
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self> {
        let expected = element_count(&shape).ok_or_else(|| {
            Error::InvalidOperation(format!("shape {shape:?} is too large"))
        })?;
        if expected != data.len() {
            return Err(Error::InvalidOperation(format!(
                "shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Index the first dimension
    ///
    /// One-dimensional datasets yield a scalar, higher ones a sub-dataset.
    pub fn index(&self, i: i64) -> Result<Value> {
        let Some((&rows, rest)) = self.shape.split_first() else {
            return Err(Error::IndexNotFound(i.to_string()));
        };
        let row = normalize_index(i, rows).ok_or_else(|| Error::IndexNotFound(i.to_string()))?;
        if rest.is_empty() {
            return Ok(Value::Json(self.data.element(row)));
        }
        let stride: usize = rest.iter().product();
        Ok(Value::Dataset(Dataset {
            shape: rest.to_vec(),
            data: self.data.slice(row * stride, stride),
        }))
    }

    /// Whether any element equals `item`
    pub fn contains(&self, item: &JsonValue) -> bool {
        (0..self.data.len()).any(|i| json_eq(&self.data.element(i), item))
    }

    /// Nested JSON arrays mirroring the shape
    pub fn to_json(&self) -> JsonValue {
        fn build(data: &ArrayData, shape: &[usize], offset: usize) -> JsonValue {
            match shape.split_first() {
                None => data.element(offset),
                Some((&n, rest)) => {
                    let stride: usize = rest.iter().product();
                    JsonValue::Array((0..n).map(|i| build(data, rest, offset + i * stride)).collect())
                }
            }
        }
        build(&self.data, &self.shape, 0)
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
            && (0..self.data.len()).all(|i| json_eq(&self.data.element(i), &other.data.element(i)))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A node of the dataset tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
}

/// Named children, either groups or datasets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    children: BTreeMap<String, Node>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &BTreeMap<String, Node> {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Insert a dataset at a `/`-separated path, creating groups on the way
    pub fn insert(&mut self, path: &str, dataset: Dataset) -> Result<()> {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some((name, parents)) = parts.split_last() else {
            return Err(Error::InvalidOperation(format!("empty dataset path '{path}'")));
        };
        let mut group = self;
        for part in parents {
            let node = group
                .children
                .entry(part.to_string())
                .or_insert_with(|| Node::Group(Group::new()));
            group = match node {
                Node::Group(g) => g,
                Node::Dataset(_) => {
                    return Err(Error::InvalidOperation(format!(
                        "'{part}' in '{path}' is a dataset, not a group"
                    )))
                }
            };
        }
        group.children.insert(name.to_string(), Node::Dataset(dataset));
        Ok(())
    }

    /// Descend through group names, then index into the dataset reached
    ///
    /// A name may itself be a `/`-separated path.
    pub fn search(&self, path: &[JsonValue]) -> Result<Value> {
        let mut group = self;
        let mut rest = path;
        while let Some((JsonValue::String(name), tail)) = rest.split_first() {
            rest = tail;
            let mut parts = name.split('/').filter(|p| !p.is_empty()).peekable();
            while let Some(part) = parts.next() {
                let last = parts.peek().is_none();
                match group.children.get(part) {
                    Some(Node::Group(g)) => group = g,
                    Some(Node::Dataset(d)) if last => return index_dataset(d, rest),
                    _ => return Err(Error::KeyNotFound(part.to_string())),
                }
            }
        }
        match rest.first() {
            None => Ok(Value::Group(group.clone())),
            Some(elem) => Err(Error::IndexNotFound(elem.to_string())),
        }
    }
}

fn index_dataset(dataset: &Dataset, indices: &[JsonValue]) -> Result<Value> {
    let mut current = Value::Dataset(dataset.clone());
    for elem in indices {
        let i = elem
            .as_i64()
            .ok_or_else(|| Error::KeyNotFound(elem.to_string()))?;
        current = match current {
            Value::Dataset(d) => d.index(i)?,
            _ => return Err(Error::IndexNotFound(i.to_string())),
        };
    }
    Ok(current)
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .children
            .iter()
            .map(|(name, node)| match node {
                Node::Group(_) => format!("{name}/"),
                Node::Dataset(_) => name.clone(),
            })
            .collect();
        write!(f, "Group({})", names.join(", "))
    }
}

/// Read an NPZ archive into its root group
pub fn read_npz(path: &Path) -> Result<Group> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut root = Group::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let Some(stem) = name.strip_suffix(".npy") else {
            tracing::debug!(entry = %name, "Skipping non-npy archive entry");
            continue;
        };
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        let dataset = parse_npy(&bytes).map_err(|reason| Error::parse(path, format!("{name}: {reason}")))?;
        root.insert(stem, dataset)?;
    }
    Ok(root)
}

/// Write a group as an NPZ archive
///
/// Integers are stored as `<i8`, unsigned as `<u8`, floats as `<f8`.
pub fn write_npz(path: &Path, group: &Group) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = || SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut pending = vec![(String::new(), group)];
    while let Some((prefix, group)) = pending.pop() {
        for (name, node) in &group.children {
            match node {
                Node::Group(g) => pending.push((format!("{prefix}{name}/"), g)),
                Node::Dataset(d) => {
                    writer.start_file(format!("{prefix}{name}.npy"), options())?;
                    writer.write_all(&npy_bytes(d))?;
                }
            }
        }
    }
    writer.finish()?;
    Ok(())
}

fn npy_bytes(dataset: &Dataset) -> Vec<u8> {
    let descr = match dataset.data {
        ArrayData::Bool(_) => "|b1",
        ArrayData::Int(_) => "<i8",
        ArrayData::UInt(_) => "<u8",
        ArrayData::Float(_) => "<f8",
    };
    let shape = match dataset.shape.as_slice() {
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape}, }}");
    // magic(6) + version(2) + length(2) + header + newline is a multiple of 64
    let unpadded = NPY_MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = NPY_MAGIC.to_vec();
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    match &dataset.data {
        ArrayData::Bool(v) => out.extend(v.iter().map(|b| u8::from(*b))),
        ArrayData::Int(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        ArrayData::UInt(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        ArrayData::Float(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
    }
    out
}

/// Decode a single `.npy` array
fn parse_npy(bytes: &[u8]) -> std::result::Result<Dataset, String> {
    if !bytes.starts_with(NPY_MAGIC) || bytes.len() < 10 {
        return Err("not an npy array".to_string());
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        v => return Err(format!("unsupported npy version {v}")),
    };
    let body_start = header_start + header_len;
    let header = bytes
        .get(header_start..body_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or("truncated header")?;

    if header.contains("'fortran_order': True") {
        return Err("Fortran-ordered arrays are not supported".to_string());
    }
    let descr = header_str(header, "descr").ok_or("missing descr")?;
    let shape = header_shape(header).ok_or("missing shape")?;
    let count = element_count(&shape).ok_or_else(|| format!("shape {shape:?} is too large"))?;

    let mut chars = descr.chars();
    let order = chars.next().ok_or("empty descr")?;
    let kind = chars.next().ok_or("empty descr")?;
    let size: usize = chars
        .as_str()
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("bad descr '{descr}'"))?;
    let big = order == '>' || (order == '=' && cfg!(target_endian = "big"));

    let body = &bytes[body_start..];
    let needed = count
        .checked_mul(size)
        .ok_or_else(|| format!("shape {shape:?} of '{descr}' is too large"))?;
    if body.len() < needed {
        return Err(format!("expected {needed} data bytes, got {}", body.len()));
    }
    let chunks = body.chunks_exact(size).take(count);

    let data = match (kind, size) {
        ('b', 1) => ArrayData::Bool(chunks.map(|c| c[0] != 0).collect()),
        ('i', 1) => ArrayData::Int(chunks.map(|c| i64::from(c[0] as i8)).collect()),
        ('i', 2) => ArrayData::Int(chunks.map(|c| i64::from(word::<i16>(c, big))).collect()),
        ('i', 4) => ArrayData::Int(chunks.map(|c| i64::from(word::<i32>(c, big))).collect()),
        ('i', 8) => ArrayData::Int(chunks.map(|c| word::<i64>(c, big)).collect()),
        ('u', 1) => ArrayData::UInt(chunks.map(|c| u64::from(c[0])).collect()),
        ('u', 2) => ArrayData::UInt(chunks.map(|c| u64::from(word::<u16>(c, big))).collect()),
        ('u', 4) => ArrayData::UInt(chunks.map(|c| u64::from(word::<u32>(c, big))).collect()),
        ('u', 8) => ArrayData::UInt(chunks.map(|c| word::<u64>(c, big)).collect()),
        ('f', 4) => ArrayData::Float(chunks.map(|c| f64::from(word::<f32>(c, big))).collect()),
        ('f', 8) => ArrayData::Float(chunks.map(|c| word::<f64>(c, big)).collect()),
        _ => return Err(format!("unsupported dtype '{descr}'")),
    };
    Dataset::new(shape, data).map_err(|e| e.to_string())
}

/// Product of the dimensions, `None` on overflow
fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |n, &dim| n.checked_mul(dim))
}

/// Decode one element of the chunk's width in the given byte order
fn word<W: Word>(chunk: &[u8], big: bool) -> W {
    W::read(chunk, big)
}

trait Word: Sized {
    fn read(chunk: &[u8], big: bool) -> Self;
}

macro_rules! word {
    ($($t:ty),*) => {
        $(impl Word for $t {
            fn read(chunk: &[u8], big: bool) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(chunk);
                if big { <$t>::from_be_bytes(buf) } else { <$t>::from_le_bytes(buf) }
            }
        })*
    };
}

word!(i16, i32, i64, u16, u32, u64, f32, f64);

fn header_str<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = &header[header.find(&format!("'{key}'"))? + key.len() + 2..];
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    let quote = rest.chars().next()?;
    let rest = &rest[1..];
    Some(&rest[..rest.find(quote)?])
}

fn header_shape(header: &str) -> Option<Vec<usize>> {
    let rest = &header[header.find("'shape'")?..];
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}
