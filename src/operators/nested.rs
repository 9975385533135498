use serde_json::Value;

use crate::algebra::{LenFormat, TypedValue, len_array};
use crate::executor::OperatorRegistry;
use crate::executor::traits::{CompileOperator, Operator};
use crate::pipeline::{Document, PathRef, Result, Spec, TransformError, type_name};

/// Read a `{ key: "path" }` entry's value as a path reference
fn entry_path(spec: &Spec<'_>, key: &str, value: &Value) -> Result<PathRef> {
    match value {
        Value::String(text) => PathRef::parse(text),
        other => Err(TransformError::invalid_parameter(
            spec.operator(),
            key,
            format!("expected a path string, got {}", type_name(other)),
        )),
    }
}

/// Split `source` at its `[i]` into the root array and the per-item path
fn split_source(spec: &Spec<'_>, source: &PathRef) -> Result<(PathRef, PathRef)> {
    source.ensure_readable()?;
    let (root, nested) = source.split_iteration().ok_or_else(|| {
        TransformError::invalid_parameter(
            spec.operator(),
            source.text(),
            "source reference must contain '[i]'",
        )
    })?;
    if root.is_zero() {
        return Err(TransformError::invalid_path(
            source.text(),
            "'[i]' needs an array reference before it",
        ));
    }
    root.ensure_concrete()?;
    nested.ensure_concrete()?;
    Ok((root, nested))
}

/// Length of the array at `path`, 0 when absent or not an array
fn root_len(path: &PathRef, root: &Value) -> Result<Option<usize>> {
    match path.get(root) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items.len())),
        Some(other) => Err(TransformError::type_mismatch(
            path.text(),
            "array",
            type_name(other),
        )),
    }
}

#[derive(Debug)]
struct MergeEntry {
    root: PathRef,
    source: PathRef,
    target: PathRef,
}

impl MergeEntry {
    fn merge(&self, root: &Value) -> Result<Vec<Value>> {
        let Some(count) = root_len(&self.root, root)? else {
            return Ok(Vec::new());
        };

        let mut merged = Vec::new();
        for index in 0..count {
            let path = self.source.instantiate(index);
            match path.get(root) {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) => merged.extend(items.iter().cloned()),
                Some(other) => {
                    return Err(TransformError::type_mismatch(
                        path.text(),
                        "array",
                        type_name(other),
                    ));
                }
            }
        }
        Ok(merged)
    }
}

/// merge-arrays operator - Concatenate the arrays nested in each root item
///
/// Each key is a source reference containing `[i]`; its value is the target
/// the concatenation is written to.
///
/// Example:
/// ```json
/// {
///   "operation": "merge-arrays",
///   "spec": {"orders[i].lines": "allLines"}
/// }
/// ```
#[derive(Debug)]
pub struct MergeArraysOp {
    entries: Vec<MergeEntry>,
}

impl CompileOperator for MergeArraysOp {
    fn compile(spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        if spec.params().is_empty() {
            return Err(TransformError::invalid_parameter(
                spec.operator(),
                "spec",
                "at least one source/target mapping is required",
            ));
        }

        let entries = spec
            .params()
            .iter()
            .map(|(key, value)| {
                let source = PathRef::parse(key)?;
                let (root, _) = split_source(spec, &source)?;
                let target = entry_path(spec, key, value)?;
                target.ensure_writable()?;
                Ok(MergeEntry {
                    root,
                    source,
                    target,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }
}

impl Operator for MergeArraysOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        for entry in &self.entries {
            let merged = entry.merge(document.root())?;
            document.set(&entry.target, Value::Array(merged))?;
        }
        Ok(document)
    }
}

#[derive(Debug)]
enum LenEntry {
    /// Plain source and target
    Single { source: PathRef, target: PathRef },
    /// One count per root item, written at the instantiated target
    PerItem {
        root: PathRef,
        source: PathRef,
        target: PathRef,
    },
    /// One count per root item, collected into an array
    Collect {
        root: PathRef,
        source: PathRef,
        target: PathRef,
    },
}

fn count(value: Option<&Value>) -> Result<Value> {
    let counted = len_array(&TypedValue::from_option(value), LenFormat::Number);
    Ok(counted.to_value()?.unwrap_or_else(|| Value::from(0)))
}

/// len-arrays operator - Write array lengths
///
/// Each key is a target reference and its value the array to count. With
/// `[i]` in the source, one count is produced per root item.
///
/// Example:
/// ```json
/// {
///   "operation": "len-arrays",
///   "spec": {
///     "itemCount": "items",
///     "orders[i].lineCount": "orders[i].lines"
///   }
/// }
/// ```
#[derive(Debug)]
pub struct LenArraysOp {
    entries: Vec<LenEntry>,
}

impl CompileOperator for LenArraysOp {
    fn compile(spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        let entries = spec
            .params()
            .iter()
            .map(|(key, value)| {
                let target = PathRef::parse(key)?;
                let source = entry_path(spec, key, value)?;

                if !source.has_iteration() {
                    source.ensure_concrete()?;
                    target.ensure_writable()?;
                    return Ok(LenEntry::Single { source, target });
                }

                let (root, _) = split_source(spec, &source)?;
                if target.has_iteration() {
                    target.instantiate(0).ensure_writable()?;
                    Ok(LenEntry::PerItem {
                        root,
                        source,
                        target,
                    })
                } else {
                    target.ensure_writable()?;
                    Ok(LenEntry::Collect {
                        root,
                        source,
                        target,
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }
}

impl Operator for LenArraysOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        for entry in &self.entries {
            match entry {
                LenEntry::Single { source, target } => {
                    let value = count(document.get(source))?;
                    document.set(target, value)?;
                }
                LenEntry::PerItem {
                    root,
                    source,
                    target,
                } => {
                    let items = root_len(root, document.root())?.unwrap_or(0);
                    let counts = (0..items)
                        .map(|index| count(document.get(&source.instantiate(index))))
                        .collect::<Result<Vec<_>>>()?;
                    for (index, value) in counts.into_iter().enumerate() {
                        document.set(&target.instantiate(index), value)?;
                    }
                }
                LenEntry::Collect {
                    root,
                    source,
                    target,
                } => {
                    let items = root_len(root, document.root())?.unwrap_or(0);
                    let counts = (0..items)
                        .map(|index| count(document.get(&source.instantiate(index))))
                        .collect::<Result<Vec<_>>>()?;
                    document.set(target, Value::Array(counts))?;
                }
            }
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ErrorCategory;
    use serde_json::json;

    fn run<T: CompileOperator>(operator: &str, spec: Value, input: Value) -> Result<Value> {
        let params = spec.as_object().cloned().unwrap_or_default();
        let op = T::compile(&Spec::new(operator, &params), &OperatorRegistry::new())?;
        op.apply(Document::new(input)).map(Document::into_value)
    }

    #[test]
    fn test_merge_nested_arrays() {
        let out = run::<MergeArraysOp>(
            "merge-arrays",
            json!({"orders[i].lines": "all"}),
            json!({"orders": [
                {"lines": [1, 2]},
                {"lines": null},
                {},
                {"lines": [3]}
            ]}),
        )
        .unwrap();
        assert_eq!(out["all"], json!([1, 2, 3]));
    }

    #[test]
    fn test_merge_array_of_arrays() {
        let out = run::<MergeArraysOp>(
            "merge-arrays",
            json!({"groups[i]": "flat"}),
            json!({"groups": [["a"], ["b", "c"]]}),
        )
        .unwrap();
        assert_eq!(out["flat"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_merge_absent_root() {
        let out = run::<MergeArraysOp>("merge-arrays", json!({"orders[i].lines": "all"}), json!({}))
            .unwrap();
        assert_eq!(out, json!({"all": []}));
    }

    #[test]
    fn test_merge_requires_iteration() {
        let err = run::<MergeArraysOp>("merge-arrays", json!({"orders.lines": "all"}), json!({}))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_merge_type_errors() {
        let err = run::<MergeArraysOp>(
            "merge-arrays",
            json!({"orders[i].lines": "all"}),
            json!({"orders": {"lines": []}}),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { ref path, .. } if path == "orders"));

        let err = run::<MergeArraysOp>(
            "merge-arrays",
            json!({"orders[i].lines": "all"}),
            json!({"orders": [{"lines": "x"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { ref path, .. } if path == "orders[0].lines"));
    }

    #[test]
    fn test_len_single() {
        let out = run::<LenArraysOp>(
            "len-arrays",
            json!({"count": "items", "missing": "nothing", "text": "name"}),
            json!({"items": [1, 2, 3], "name": "abc"}),
        )
        .unwrap();
        assert_eq!(out["count"], json!(3));
        assert_eq!(out["missing"], json!(0));
        assert_eq!(out["text"], json!(0));
    }

    #[test]
    fn test_len_per_item() {
        let out = run::<LenArraysOp>(
            "len-arrays",
            json!({"orders[i].lineCount": "orders[i].lines"}),
            json!({"orders": [{"lines": [1, 2]}, {"lines": []}, {}]}),
        )
        .unwrap();
        assert_eq!(
            out,
            json!({"orders": [
                {"lines": [1, 2], "lineCount": 2},
                {"lines": [], "lineCount": 0},
                {"lineCount": 0}
            ]})
        );
    }

    #[test]
    fn test_len_collect() {
        let out = run::<LenArraysOp>(
            "len-arrays",
            json!({"lineCounts": "orders[i].lines"}),
            json!({"orders": [{"lines": [1, 2]}, {"lines": [3]}]}),
        )
        .unwrap();
        assert_eq!(out["lineCounts"], json!([2, 1]));

        let out = run::<LenArraysOp>(
            "len-arrays",
            json!({"lineCounts": "orders[i].lines"}),
            json!({}),
        )
        .unwrap();
        assert_eq!(out, json!({"lineCounts": []}));
    }

    #[test]
    fn test_len_rejects_bad_entries() {
        let err = run::<LenArraysOp>("len-arrays", json!({"count": 5}), json!({})).unwrap_err();
        assert!(matches!(err, TransformError::InvalidParameter { .. }));

        let err = run::<LenArraysOp>("len-arrays", json!({"xs[i].n": "items"}), json!({})).unwrap_err();
        assert!(matches!(err, TransformError::InvalidPath { .. }));
    }
}
