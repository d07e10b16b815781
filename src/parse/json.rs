//! Path-based access into JSON documents
//!
//! A path is a list of keys (strings, applied to objects) and indices
//! (integers, applied to arrays; negative indices count from the end). The
//! container being descended decides the error: objects raise
//! `KeyNotFound`, arrays raise `IndexNotFound`.

use std::path::Path;

use serde_json::Value as JsonValue;

use crate::common::{Error, Result};

/// Follow `path` into `obj`
///
/// An empty path returns `obj` itself.
pub fn json_get<'a>(obj: &'a JsonValue, path: &[JsonValue]) -> Result<&'a JsonValue> {
    let mut current = obj;
    for elem in path {
        current = step(current, elem)?;
    }
    Ok(current)
}

fn step<'a>(current: &'a JsonValue, elem: &JsonValue) -> Result<&'a JsonValue> {
    match current {
        JsonValue::Object(map) => elem
            .as_str()
            .and_then(|k| map.get(k))
            .ok_or_else(|| key_error(elem)),
        JsonValue::Array(items) => elem
            .as_i64()
            .and_then(|i| normalize_index(i, items.len()))
            .map(|i| &items[i])
            .ok_or_else(|| index_error(elem)),
        _ => Err(scalar_error(elem)),
    }
}

fn step_mut<'a>(current: &'a mut JsonValue, elem: &JsonValue) -> Result<&'a mut JsonValue> {
    match current {
        JsonValue::Object(map) => match elem.as_str() {
            Some(k) => map.get_mut(k).ok_or_else(|| key_error(elem)),
            None => Err(key_error(elem)),
        },
        JsonValue::Array(items) => {
            match elem.as_i64().and_then(|i| normalize_index(i, items.len())) {
                Some(i) => Ok(&mut items[i]),
                None => Err(index_error(elem)),
            }
        }
        _ => Err(scalar_error(elem)),
    }
}

fn json_get_mut<'a>(obj: &'a mut JsonValue, path: &[JsonValue]) -> Result<&'a mut JsonValue> {
    let mut current = obj;
    for elem in path {
        current = step_mut(current, elem)?;
    }
    Ok(current)
}

/// Set the value at `path`
///
/// The last key is only created when `create_key` is set. Indices must
/// already exist.
pub fn json_set(
    obj: &mut JsonValue,
    path: &[JsonValue],
    value: JsonValue,
    create_key: bool,
) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        return Err(Error::InvalidOperation(
            "cannot set a value with an empty path".to_string(),
        ));
    };
    match json_get_mut(obj, parents)? {
        JsonValue::Object(map) => {
            let key = last.as_str().ok_or_else(|| key_error(last))?;
            if !create_key && !map.contains_key(key) {
                return Err(key_error(last));
            }
            map.insert(key.to_string(), value);
        }
        JsonValue::Array(items) => {
            let i = last
                .as_i64()
                .and_then(|i| normalize_index(i, items.len()))
                .ok_or_else(|| index_error(last))?;
            items[i] = value;
        }
        _ => return Err(scalar_error(last)),
    }
    Ok(())
}

/// Push `value` onto the array at `path`
pub fn json_append(obj: &mut JsonValue, path: &[JsonValue], value: JsonValue) -> Result<()> {
    match json_get_mut(obj, path)? {
        JsonValue::Array(items) => {
            items.push(value);
            Ok(())
        }
        other => Err(Error::InvalidOperation(format!(
            "cannot append to non-array value {other}"
        ))),
    }
}

/// Read and parse a JSON file
pub fn json_load(path: &Path) -> Result<JsonValue> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| Error::parse(path, e))
}

/// Write a JSON file, creating parent directories
pub fn json_write(path: &Path, value: &JsonValue) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Turn a search spec into a path: a list is used as-is, anything else is a
/// single element
pub fn as_path(spec: &JsonValue) -> Vec<JsonValue> {
    match spec {
        JsonValue::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

pub(crate) fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if i < 0 { len + i } else { i };
    if (0..len).contains(&i) {
        usize::try_from(i).ok()
    } else {
        None
    }
}

fn key_error(elem: &JsonValue) -> Error {
    Error::KeyNotFound(render(elem))
}

fn index_error(elem: &JsonValue) -> Error {
    Error::IndexNotFound(render(elem))
}

fn scalar_error(elem: &JsonValue) -> Error {
    if elem.is_i64() {
        index_error(elem)
    } else {
        key_error(elem)
    }
}

fn render(elem: &JsonValue) -> String {
    match elem {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
