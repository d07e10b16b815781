//! Values flowing through steps
//!
//! Step arguments start out as JSON literals from the test config. Path
//! references resolve into whatever the file holds: JSON, a table, or a
//! dataset group. Comparisons between values are loose for numbers so that
//! `1` and `1.0` are equal, matching how results files mix integer and
//! float encodings.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Number, Value as JsonValue};

use crate::parse::dataset::{Dataset, Group};
use crate::parse::delimited::Table;

/// A literal or a resolved piece of structured data
#[derive(Debug, Clone)]
pub enum Value {
    Json(JsonValue),
    Table(Table),
    Dataset(Dataset),
    Group(Group),
}

impl Value {
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(JsonValue::as_str)
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Falsy values are null, false, zero and empty containers
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Json(v) => json_truthy(v),
            Value::Table(t) => !t.is_empty(),
            Value::Dataset(d) => d.len() > 0,
            Value::Group(g) => !g.is_empty(),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Json(a), Value::Json(b)) => json_eq(a, b),
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::Dataset(a), Value::Dataset(b)) => a == b,
            (Value::Group(a), Value::Group(b)) => a == b,
            (Value::Dataset(d), Value::Json(j)) | (Value::Json(j), Value::Dataset(d)) => {
                json_eq(&d.to_json(), j)
            }
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Json(a), Value::Json(b)) => json_cmp(a, b),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Json(v) => write!(f, "{v}"),
            Value::Table(t) => write!(f, "{t}"),
            Value::Dataset(d) => write!(f, "{d}"),
            Value::Group(g) => write!(f, "{g}"),
        }
    }
}

fn json_truthy(v: &JsonValue) -> bool {
    match v {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// Structural equality with numeric comparison across int and float
pub fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => number_cmp(x, y) == Some(Ordering::Equal),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

/// Ordering for numbers, strings, booleans and arrays of those
///
/// Arrays compare lexicographically. Every other pairing is incomparable.
pub fn json_cmp(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => number_cmp(x, y),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            for (a, b) in x.iter().zip(y) {
                match json_cmp(a, b)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

fn number_cmp(x: &Number, y: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

/// Render a JSON value the way it reads in a table cell
pub fn cell_text(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Infer the type of a text field
///
/// Tries integer, then float, then a case-insensitive boolean; anything else
/// stays a string.
pub fn type_string(s: &str) -> JsonValue {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return JsonValue::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return JsonValue::Number(n);
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return JsonValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return JsonValue::Bool(false);
    }
    JsonValue::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_string() {
        assert_eq!(type_string("1"), json!(1));
        assert_eq!(type_string("-12"), json!(-12));
        assert_eq!(type_string("1.5"), json!(1.5));
        assert_eq!(type_string("tRUe"), json!(true));
        assert_eq!(type_string("False"), json!(false));
        assert_eq!(type_string("hello"), json!("hello"));
        assert_eq!(type_string(""), json!(""));
    }

    #[test]
    fn test_numbers_compare_across_int_and_float() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!([1, {"a": 2}]), &json!([1.0, {"a": 2.0}])));
        assert!(!json_eq(&json!(true), &json!(1)));
        assert_eq!(json_cmp(&json!(2), &json!(1.5)), Some(Ordering::Greater));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(json_cmp(&json!("a"), &json!("b")), Some(Ordering::Less));
        assert_eq!(json_cmp(&json!([1, 2]), &json!([1, 3])), Some(Ordering::Less));
        assert_eq!(json_cmp(&json!([1, 2]), &json!([1])), Some(Ordering::Greater));
        assert_eq!(json_cmp(&json!(1), &json!("1")), None);
        assert_eq!(json_cmp(&json!({}), &json!({})), None);
    }

    #[test]
    fn test_value_ordering_incomparable_is_false() {
        let a = Value::Json(json!(1));
        let b = Value::Json(json!("x"));
        assert!(!(a > b));
        assert!(!(a < b));
        assert!(a != b);
    }

    #[test]
    fn test_truthy() {
        assert!(!Value::Json(json!(null)).is_truthy());
        assert!(!Value::Json(json!(0)).is_truthy());
        assert!(!Value::Json(json!([])).is_truthy());
        assert!(Value::Json(json!("x")).is_truthy());
        assert!(Value::Json(json!({"a": 1})).is_truthy());
    }

    #[test]
    fn test_display_is_compact_json() {
        assert_eq!(Value::Json(json!({"a": [1, "b"]})).to_string(), r#"{"a":[1,"b"]}"#);
    }
}
