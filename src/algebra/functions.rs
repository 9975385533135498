use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::{TypedValue, ValueKind};
use crate::pipeline::{Result, TransformError, type_name};

/// Rendering of the count returned by [`len_array`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LenFormat {
    #[default]
    Number,
    String,
}

/// Number of top-level elements, 0 for anything that is not an array
///
/// ```
/// use reshape::algebra::{len_array, LenFormat, TypedValue};
/// use serde_json::json;
///
/// let count = len_array(&TypedValue::from_value(&json!([1, 2, 3])), LenFormat::Number);
/// assert_eq!(count.bytes(), b"3");
/// ```
pub fn len_array(value: &TypedValue, format: LenFormat) -> TypedValue {
    let count = match value.to_value() {
        Ok(Some(Value::Array(items))) => items.len(),
        _ => 0,
    };

    match format {
        LenFormat::Number => TypedValue::from_value(&Value::from(count)),
        LenFormat::String => TypedValue::from_value(&Value::String(count.to_string())),
    }
}

/// Concatenate two arrays, `left` first
///
/// An absent operand yields the other operand unchanged.
pub fn merge_arrays(left: &TypedValue, right: &TypedValue) -> Result<TypedValue> {
    if left.is_absent() {
        return Ok(right.clone());
    }
    if right.is_absent() {
        return Ok(left.clone());
    }

    let mut items = left.array("left")?;
    items.extend(right.array("right")?);
    Ok(TypedValue::from_value(&Value::Array(items)))
}

/// Sort an array of strings, or an array of objects by `property`
///
/// Strings sort byte-wise. Objects sort by the property value with
/// null/missing values first. Both sorts are stable. When the property has
/// different types across items, is a container, or is missing everywhere,
/// the array is returned in its original order.
pub fn sort_array(value: &TypedValue, property: &str) -> Result<TypedValue> {
    let mut items = value.array("value")?;
    if items.is_empty() {
        return Ok(TypedValue::from_value(&Value::Array(items)));
    }

    let element_kind = ValueKind::of(&items[0]);
    if let Some(other) = items.iter().find(|item| ValueKind::of(item) != element_kind) {
        return Err(TransformError::type_mismatch(
            "value",
            format!("{} elements", type_name(&items[0])),
            type_name(other),
        ));
    }

    match element_kind {
        ValueKind::String => {
            items.sort_by(|a, b| a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default()));
        }
        ValueKind::Object => {
            if property_sortable(&items, property) {
                items.sort_by(|a, b| compare_property(property_of(a, property), property_of(b, property)));
            }
        }
        _ => {
            return Err(TransformError::type_mismatch(
                "value",
                "array of strings or objects",
                format!("array of {}", type_name(&items[0])),
            ));
        }
    }

    Ok(TypedValue::from_value(&Value::Array(items)))
}

/// Join an array of strings with `delimiter`
pub fn join_array(value: &TypedValue, delimiter: &str) -> Result<TypedValue> {
    let items = value.array("value")?;

    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        match item {
            Value::String(s) => parts.push(s.as_str()),
            other => {
                return Err(TransformError::type_mismatch("value", "string elements", type_name(other)));
            }
        }
    }

    Ok(TypedValue::from_value(&Value::String(parts.join(delimiter))))
}

fn property_of<'a>(item: &'a Value, property: &str) -> Option<&'a Value> {
    item.get(property).filter(|v| !v.is_null())
}

fn property_sortable(items: &[Value], property: &str) -> bool {
    let mut kinds = items.iter().filter_map(|item| property_of(item, property)).map(ValueKind::of);

    let Some(first) = kinds.next() else {
        return false;
    };
    if matches!(first, ValueKind::Object | ValueKind::Array) {
        return false;
    }
    kinds.all(|kind| kind == first)
}

fn compare_property(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => a.as_bytes().cmp(b.as_bytes()),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        }
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn typed(value: Value) -> TypedValue {
        TypedValue::from_value(&value)
    }

    fn plain(value: TypedValue) -> Value {
        value.to_value().unwrap().unwrap()
    }

    #[test]
    fn test_len_array() {
        assert_eq!(plain(len_array(&typed(json!([1, 2, 3])), LenFormat::Number)), json!(3));
        assert_eq!(plain(len_array(&TypedValue::null(), LenFormat::Number)), json!(0));
        assert_eq!(plain(len_array(&TypedValue::not_exist(), LenFormat::Number)), json!(0));
        assert_eq!(plain(len_array(&typed(json!({"a": 1})), LenFormat::Number)), json!(0));
        assert_eq!(plain(len_array(&typed(json!(["a"])), LenFormat::String)), json!("1"));
    }

    #[test]
    fn test_merge_arrays_absent_operands() {
        let x = typed(json!([1, "a"]));
        assert_eq!(merge_arrays(&TypedValue::null(), &x).unwrap(), x);
        assert_eq!(merge_arrays(&x, &TypedValue::null()).unwrap(), x);
        assert_eq!(merge_arrays(&TypedValue::not_exist(), &x).unwrap(), x);
        assert_eq!(
            merge_arrays(&TypedValue::null(), &TypedValue::not_exist()).unwrap(),
            TypedValue::not_exist()
        );
    }

    #[test]
    fn test_merge_arrays_concatenates() {
        let merged = merge_arrays(&typed(json!(["a", {"b": 1}])), &typed(json!(["c"]))).unwrap();
        assert_eq!(plain(merged), json!(["a", {"b": 1}, "c"]));

        let err = merge_arrays(&typed(json!({"a": 1})), &typed(json!([]))).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn test_sort_strings() {
        let sorted = sort_array(&typed(json!(["b", "a2", "a", "B"])), "").unwrap();
        assert_eq!(plain(sorted), json!(["B", "a", "a2", "b"]));
        assert_eq!(plain(sort_array(&TypedValue::null(), "x").unwrap()), json!([]));
        assert_eq!(plain(sort_array(&TypedValue::not_exist(), "").unwrap()), json!([]));
        assert_eq!(plain(sort_array(&typed(json!([])), "x").unwrap()), json!([]));
    }

    #[test]
    fn test_sort_objects_nulls_first_and_stable() {
        let items = json!([
            {"id": 1, "name": "b"},
            {"id": 2},
            {"id": 3, "name": "a"},
            {"id": 4, "name": null},
            {"id": 5, "name": "a"}
        ]);
        let sorted = plain(sort_array(&typed(items), "name").unwrap());
        let ids: Vec<i64> = sorted
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 4, 3, 5, 1]);
    }

    #[test]
    fn test_sort_objects_by_number_property() {
        let sorted = sort_array(&typed(json!([{"n": 10}, {"n": 2}, {"n": 2.5}])), "n").unwrap();
        assert_eq!(plain(sorted), json!([{"n": 2}, {"n": 2.5}, {"n": 10}]));
    }

    #[test]
    fn test_sort_objects_left_unmodified() {
        let mixed = json!([{"k": "b"}, {"k": 1}, {"k": "a"}]);
        assert_eq!(plain(sort_array(&typed(mixed.clone()), "k").unwrap()), mixed);

        let missing = json!([{"x": 2}, {"x": 1}]);
        assert_eq!(plain(sort_array(&typed(missing.clone()), "k").unwrap()), missing);
    }

    #[test]
    fn test_sort_numbers_is_an_error() {
        assert!(sort_array(&typed(json!([3, 1, 2])), "").is_err());
        assert!(sort_array(&typed(json!(["a", 1])), "").is_err());
    }

    #[test]
    fn test_join_array() {
        assert_eq!(plain(join_array(&typed(json!(["a", "b", "c"])), ", ").unwrap()), json!("a, b, c"));
        assert_eq!(plain(join_array(&TypedValue::not_exist(), ",").unwrap()), json!(""));
        assert_eq!(plain(join_array(&TypedValue::null(), ",").unwrap()), json!(""));
        assert_eq!(plain(join_array(&typed(json!([])), ",").unwrap()), json!(""));
        assert!(join_array(&typed(json!(["a", 1])), ",").is_err());
    }

    proptest! {
        #[test]
        fn prop_sort_strings_idempotent(words in proptest::collection::vec("[a-c]{0,3}", 0..20)) {
            let once = sort_array(&typed(json!(words)), "").unwrap();
            let twice = sort_array(&once, "").unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
