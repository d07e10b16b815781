//! Comparison predicates behind the assertion steps
//!
//! Predicates never fail: a pairing that makes no sense, like an ordering
//! between a number and a string, is simply false.

use serde_json::Value as JsonValue;

use crate::parse::delimited::{parse_criteria, Criterion, Table};
use crate::value::{json_eq, Value};

fn pairwise(args: &[Value], pred: impl Fn(&Value, &Value) -> bool) -> bool {
    args.windows(2).all(|w| pred(&w[0], &w[1]))
}

/// `a == b == c ...`
pub fn eq(args: &[Value]) -> bool {
    pairwise(args, |a, b| a == b)
}

/// Every neighbouring pair differs
pub fn ne(args: &[Value]) -> bool {
    pairwise(args, |a, b| a != b)
}

pub fn gt(args: &[Value]) -> bool {
    pairwise(args, |a, b| a > b)
}

pub fn ge(args: &[Value]) -> bool {
    pairwise(args, |a, b| a >= b)
}

pub fn lt(args: &[Value]) -> bool {
    pairwise(args, |a, b| a < b)
}

pub fn le(args: &[Value]) -> bool {
    pairwise(args, |a, b| a <= b)
}

fn matches_json(item: &Value, element: &JsonValue) -> bool {
    match item {
        Value::Json(j) => json_eq(j, element),
        Value::Dataset(d) => json_eq(&d.to_json(), element),
        _ => false,
    }
}

/// Membership of `item` in `container`
///
/// Lists hold elements, objects hold keys, strings hold substrings, tables
/// hold column names, datasets hold elements and groups hold child names.
pub fn is_in(item: &Value, container: &Value) -> bool {
    match container {
        Value::Json(JsonValue::Array(items)) => items.iter().any(|e| matches_json(item, e)),
        Value::Json(JsonValue::Object(map)) => item.as_str().is_some_and(|k| map.contains_key(k)),
        Value::Json(JsonValue::String(s)) => item.as_str().is_some_and(|sub| s.contains(sub)),
        Value::Table(t) => item.as_str().is_some_and(|c| t.has_column(c)),
        Value::Dataset(d) => item.as_json().is_some_and(|j| d.contains(j)),
        Value::Group(g) => item.as_str().is_some_and(|n| g.contains(n)),
        Value::Json(_) => false,
    }
}

pub fn not_in(item: &Value, container: &Value) -> bool {
    !is_in(item, container)
}

pub fn contains(container: &Value, item: &Value) -> bool {
    is_in(item, container)
}

pub fn does_not_contain(container: &Value, item: &Value) -> bool {
    !is_in(item, container)
}

/// Object keys include `key`; keys are strings, so `1` never matches `"1"`
pub fn keys_contain(obj: &Value, key: &Value) -> bool {
    match (obj, key) {
        (Value::Json(JsonValue::Object(map)), Value::Json(JsonValue::String(k))) => {
            map.contains_key(k)
        }
        _ => false,
    }
}

pub fn values_contain(obj: &Value, value: &Value) -> bool {
    match obj {
        Value::Json(JsonValue::Object(map)) => map.values().any(|v| matches_json(value, v)),
        _ => false,
    }
}

/// `item` is a `[key, value]` pair present in the object
pub fn items_contain(obj: &Value, item: &Value) -> bool {
    let Value::Json(JsonValue::Object(map)) = obj else {
        return false;
    };
    match item.as_json().and_then(JsonValue::as_array).map(Vec::as_slice) {
        Some([JsonValue::String(k), v]) => map.get(k).is_some_and(|found| json_eq(found, v)),
        _ => false,
    }
}

/// At least one row of `table` meets the criteria
///
/// Criteria may also be another table, in which case every one of its rows
/// must appear in `table`.
pub fn table_contains(table: &Value, criteria: &Value) -> bool {
    let Value::Table(table) = table else {
        return false;
    };
    match criteria {
        Value::Json(spec) => match parse_criteria(spec) {
            Ok(criteria) => has_match(table, &criteria),
            Err(_) => false,
        },
        Value::Table(rows) => rows.rows().iter().all(|row| {
            let criteria: Vec<Criterion> = rows
                .columns()
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect();
            has_match(table, &criteria)
        }),
        _ => false,
    }
}

fn has_match(table: &Table, criteria: &[Criterion]) -> bool {
    table.filter(criteria).is_ok_and(|hits| !hits.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vals(items: &[JsonValue]) -> Vec<Value> {
        items.iter().cloned().map(Value::Json).collect()
    }

    fn j(v: JsonValue) -> Value {
        Value::Json(v)
    }

    fn example_table() -> Value {
        Value::Table(Table::new(
            vec!["col1".into(), "col2".into(), "col3".into()],
            vec![
                vec![json!(1), json!(2), json!(3)],
                vec![json!(4), json!(5), json!(3)],
            ],
        ))
    }

    #[test]
    fn test_variadic() {
        assert!(eq(&vals(&[json!(4), json!(4), json!(4.0)])));
        assert!(!eq(&vals(&[json!(4), json!(4), json!(3), json!(4)])));
        assert!(ne(&vals(&[json!(1), json!(2), json!(3), json!(4), json!([1])])));
        assert!(!ne(&vals(&[json!(1), json!(2), json!(3), json!(3)])));
        assert!(gt(&vals(&[json!(4), json!(3), json!(2), json!(1)])));
        assert!(!gt(&vals(&[json!(4), json!(3), json!(2), json!(2)])));
        assert!(ge(&vals(&[json!(4), json!(4), json!(3), json!(2), json!(2), json!(1)])));
        assert!(!ge(&vals(&[json!(4), json!(5), json!(3)])));
        assert!(lt(&vals(&[json!(1), json!(2), json!(3)])));
        assert!(le(&vals(&[json!(1), json!(1), json!(2)])));
        assert!(!le(&vals(&[json!(2), json!(2), json!(3), json!(2)])));
    }

    #[test]
    fn test_vacuous_truth() {
        for pred in [eq, ne, gt, ge, lt, le] {
            assert!(pred(&[]));
            assert!(pred(&vals(&[json!(1)])));
        }
    }

    #[test]
    fn test_incomparable_ordering_is_false() {
        assert!(!gt(&vals(&[json!(1), json!("a")])));
        assert!(!le(&vals(&[json!({}), json!({})])));
    }

    #[test]
    fn test_membership() {
        let list = j(json!([1, "two", [3]]));
        assert!(is_in(&j(json!(1)), &list));
        assert!(is_in(&j(json!([3])), &list));
        assert!(!is_in(&j(json!(4)), &list));
        assert!(not_in(&j(json!(4)), &list));
        assert!(contains(&list, &j(json!("two"))));
        assert!(does_not_contain(&list, &j(json!(4))));

        assert!(is_in(&j(json!("ell")), &j(json!("hello"))));
        assert!(is_in(&j(json!("a")), &j(json!({"a": 1}))));
        assert!(!is_in(&j(json!(1)), &j(json!(5))));
        assert!(is_in(&j(json!("col2")), &example_table()));
    }

    #[test]
    fn test_mapping_containment() {
        let obj = j(json!({"one": 2, "3": "four", "five": [6]}));
        assert!(keys_contain(&obj, &j(json!("3"))));
        assert!(!keys_contain(&obj, &j(json!(3))));
        assert!(values_contain(&obj, &j(json!([6]))));
        assert!(!values_contain(&obj, &j(json!("three"))));
        assert!(items_contain(&obj, &j(json!(["3", "four"]))));
        assert!(!items_contain(&obj, &j(json!(["1", "two"]))));
        assert!(!items_contain(&obj, &j(json!("3"))));
        assert!(!keys_contain(&j(json!([1])), &j(json!("1"))));
    }

    #[test]
    fn test_table_contains() {
        let table = example_table();
        assert!(table_contains(&table, &j(json!([["col1", 1], ["col2", 2], ["col3", 3]]))));
        assert!(table_contains(&table, &j(json!(["col3", 3]))));
        assert!(table_contains(&table, &j(json!([]))));
        assert!(!table_contains(&table, &j(json!([["col1", 1], ["col2", 5]]))));
        assert!(!table_contains(&table, &j(json!(["missing", 1]))));
        assert!(!table_contains(&j(json!([])), &j(json!([]))));
    }

    #[test]
    fn test_table_contains_table_rows() {
        let table = example_table();
        let subset = Value::Table(Table::new(
            vec!["col2".into(), "col1".into()],
            vec![vec![json!(5), json!(4)]],
        ));
        assert!(table_contains(&table, &subset));

        let missing = Value::Table(Table::new(vec!["col2".into()], vec![vec![json!(9)]]));
        assert!(!table_contains(&table, &missing));
    }
}
