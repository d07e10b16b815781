//! Turning raw step arguments into values
//!
//! A raw argument is a path reference when it is a two-element list whose
//! first element names an existing file of a known format. The second
//! element is then the search spec handed to that file's parser. Everything
//! else is a literal.

use std::path::Path;

use serde_json::Value as JsonValue;

use crate::common::paths::resolve_against;
use crate::common::Result;
use crate::parse::{Parser, ParserRegistry};
use crate::value::Value;

/// Detect a path reference
///
/// Returns the parser for the referenced file and the search spec, or `None`
/// when `raw` should be taken literally.
pub fn path_reference<'a>(
    raw: &'a JsonValue,
    base_dir: Option<&Path>,
    registry: &ParserRegistry,
) -> Option<(Parser, &'a JsonValue)> {
    let [JsonValue::String(file), spec] = raw.as_array()?.as_slice() else {
        return None;
    };
    let path = resolve_against(Path::new(file), base_dir);
    if !path.is_file() {
        return None;
    }
    let parser = registry.get_parser(&path, true)?;
    Some((parser, spec))
}

/// Resolve one raw argument
///
/// Relative file paths are taken against `base_dir` when given, and against
/// the process working directory otherwise.
pub fn resolve(raw: &JsonValue, base_dir: Option<&Path>, registry: &ParserRegistry) -> Result<Value> {
    match path_reference(raw, base_dir, registry) {
        Some((parser, spec)) => {
            tracing::debug!(file = %parser.path().display(), %spec, "Resolving path reference");
            parser.search(spec)
        }
        None => Ok(Value::Json(raw.clone())),
    }
}
