use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::conditional::{Criteria, CriterionSpec};
use super::{ArrayRefs, resolve};
use crate::executor::OperatorRegistry;
use crate::executor::traits::{CompileOperator, Operator};
use crate::pipeline::{Document, PathRef, Result, Rule, RuleChain, Spec, TransformError, type_name};

/// shift-array-items operator - Run every element through a nested rule chain
///
/// Example:
/// ```json
/// {
///   "operation": "shift-array-items",
///   "spec": {
///     "source-ref": "orders",
///     "target-ref": "summaries",
///     "criteria": [{"attribute-ref": "status", "term": "open"}],
///     "rules": [
///       {"operation": "set-properties", "spec": {"properties": [
///         {"name-ref": "id", "path-ref": "order.id"}
///       ]}}
///     ]
///   }
/// }
/// ```
#[derive(Debug)]
pub struct ShiftArrayItemsOp {
    refs: ArrayRefs,
    rules: RuleChain,
    criteria: Criteria,
    flatten: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ShiftParams {
    source_ref: PathRef,
    target_ref: Option<PathRef>,
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    criteria: Vec<CriterionSpec>,
    /// Splice array results into the output instead of nesting them
    #[serde(default)]
    flatten: bool,
}

impl CompileOperator for ShiftArrayItemsOp {
    fn compile(spec: &Spec<'_>, registry: &OperatorRegistry) -> Result<Self> {
        spec.require(&["source-ref"])?;
        let params: ShiftParams = spec.parse()?;

        Ok(Self {
            refs: ArrayRefs::new(spec.operator(), params.source_ref, params.target_ref)?,
            rules: registry.compile_chain(&params.rules)?,
            criteria: Criteria::compile(spec.operator(), &params.criteria)?,
            flatten: params.flatten,
        })
    }
}

impl Operator for ShiftArrayItemsOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        let items = self.refs.read(&mut document)?;

        let mut shifted = Vec::with_capacity(items.len());
        for item in items {
            if !self.criteria.matches(&item) {
                continue;
            }
            match self.rules.apply(Document::new(item))?.into_value() {
                Value::Array(nested) if self.flatten => shifted.extend(nested),
                other => shifted.push(other),
            }
        }

        self.refs.write(document, Value::Array(shifted))
    }
}

/// filter-array-items operator - Keep the elements matching any criterion
///
/// Example:
/// ```json
/// {
///   "operation": "filter-array-items",
///   "spec": {
///     "source-ref": "items",
///     "criteria": [
///       {"attribute-ref": "kind", "term": "book"},
///       {"attribute-ref": "kind", "term": "ebook"}
///     ]
///   }
/// }
/// ```
#[derive(Debug)]
pub struct FilterArrayItemsOp {
    refs: ArrayRefs,
    criteria: Criteria,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FilterParams {
    source_ref: PathRef,
    target_ref: Option<PathRef>,
    criteria: Vec<CriterionSpec>,
}

impl CompileOperator for FilterArrayItemsOp {
    fn compile(spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        spec.require(&["source-ref", "criteria"])?;
        let params: FilterParams = spec.parse()?;
        if params.criteria.is_empty() {
            return Err(TransformError::invalid_parameter(
                spec.operator(),
                "criteria",
                "at least one criterion is required",
            ));
        }

        Ok(Self {
            refs: ArrayRefs::new(spec.operator(), params.source_ref, params.target_ref)?,
            criteria: Criteria::compile(spec.operator(), &params.criteria)?,
        })
    }
}

impl Operator for FilterArrayItemsOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        let mut items = self.refs.read(&mut document)?;
        items.retain(|item| self.criteria.matches(item));
        self.refs.write(document, Value::Array(items))
    }
}

/// reduce-array operator - Collapse name/value elements into one object
///
/// Example:
/// ```json
/// {
///   "operation": "reduce-array",
///   "spec": {
///     "source-ref": "attributes",
///     "target-ref": "attributeMap",
///     "name-ref": "key",
///     "value-ref": "val"
///   }
/// }
/// ```
/// turns `[{"key": "color", "val": "red"}]` into `{"color": "red"}`.
#[derive(Debug)]
pub struct ReduceArrayOp {
    refs: ArrayRefs,
    name: PathRef,
    value: PathRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ReduceParams {
    source_ref: PathRef,
    target_ref: Option<PathRef>,
    name_ref: Option<PathRef>,
    value_ref: Option<PathRef>,
}

impl CompileOperator for ReduceArrayOp {
    fn compile(spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        spec.require(&["source-ref"])?;
        let params: ReduceParams = spec.parse()?;

        let name = match params.name_ref {
            Some(name) => name,
            None => PathRef::parse("name")?,
        };
        let value = match params.value_ref {
            Some(value) => value,
            None => PathRef::parse("value")?,
        };
        name.ensure_concrete()?;
        value.ensure_concrete()?;

        Ok(Self {
            refs: ArrayRefs::new(spec.operator(), params.source_ref, params.target_ref)?,
            name,
            value,
        })
    }
}

impl ReduceArrayOp {
    fn key(&self, index: usize, item: &Value) -> Result<Option<String>> {
        match resolve(&self.name, item) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(name)) if name.is_empty() => Ok(None),
            Some(Value::String(name)) => Ok(Some(name.clone())),
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
            Some(other) => Err(TransformError::type_mismatch(
                format!("{}[{}].{}", self.refs.source.text(), index, self.name),
                "scalar",
                type_name(other),
            )),
        }
    }
}

impl Operator for ReduceArrayOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        let items = self.refs.read(&mut document)?;

        let mut reduced = Map::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Some(key) = self.key(index, item)? else {
                continue;
            };
            let Some(value) = resolve(&self.value, item) else {
                continue;
            };
            reduced.insert(key, value.clone());
        }

        self.refs.write(document, Value::Object(reduced))
    }
}

/// distinct-items operator - Deduplicate elements by a key
///
/// The last element seen for a key wins, and the output keeps the position
/// where each key first appeared, so repeated runs give the same order.
///
/// Example:
/// ```json
/// {
///   "operation": "distinct-items",
///   "spec": {"source-ref": "contacts", "on": "email"}
/// }
/// ```
#[derive(Debug)]
pub struct DistinctItemsOp {
    refs: ArrayRefs,
    on: PathRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DistinctParams {
    source_ref: PathRef,
    target_ref: Option<PathRef>,
    on: PathRef,
}

impl CompileOperator for DistinctItemsOp {
    fn compile(spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        spec.require(&["source-ref", "on"])?;
        let params: DistinctParams = spec.parse()?;
        params.on.ensure_concrete()?;

        Ok(Self {
            refs: ArrayRefs::new(spec.operator(), params.source_ref, params.target_ref)?,
            on: params.on,
        })
    }
}

impl Operator for DistinctItemsOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        let items = self.refs.read(&mut document)?;

        let mut distinct: IndexMap<String, Value> = IndexMap::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let key = resolve(&self.on, &item)
                .map(Value::to_string)
                .ok_or_else(|| TransformError::MissingKey {
                    key: self.on.text().to_string(),
                    index,
                })?;
            distinct.insert(key, item);
        }

        self.refs
            .write(document, Value::Array(distinct.into_values().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ErrorCategory;
    use serde_json::json;

    fn compile<T: CompileOperator>(operator: &str, spec: Value) -> Result<T> {
        let params = spec.as_object().cloned().unwrap_or_default();
        T::compile(&Spec::new(operator, &params), &OperatorRegistry::with_builtins())
    }

    fn run<T: CompileOperator>(operator: &str, spec: Value, input: Value) -> Result<Value> {
        let op: T = compile(operator, spec)?;
        op.apply(Document::new(input)).map(Document::into_value)
    }

    #[test]
    fn test_filter_keeps_matching() {
        let out = run::<FilterArrayItemsOp>(
            "filter-array-items",
            json!({
                "source-ref": "items",
                "criteria": [{"attribute-ref": "kind", "term": "a"}]
            }),
            json!({"items": [{"kind": "a", "n": 1}, {"kind": "b"}, {"kind": "a", "n": 2}]}),
        )
        .unwrap();
        assert_eq!(out, json!({"items": [{"kind": "a", "n": 1}, {"kind": "a", "n": 2}]}));
    }

    #[test]
    fn test_filter_on_array_attribute() {
        let out = run::<FilterArrayItemsOp>(
            "filter-array-items",
            json!({
                "source-ref": "items",
                "criteria": [{"attribute-ref": "tags[*]", "term": "x"}]
            }),
            json!({"items": [{"id": 1, "tags": ["x", "y"]}, {"id": 2, "tags": ["z"]}, {"id": 3}]}),
        )
        .unwrap();
        assert_eq!(out, json!({"items": [{"id": 1, "tags": ["x", "y"]}]}));
    }

    #[test]
    fn test_filter_none_match_writes_empty() {
        let spec = json!({
            "source-ref": "items",
            "target-ref": "kept",
            "criteria": [{"attribute-ref": "kind", "term": "z"}]
        });
        let out = run::<FilterArrayItemsOp>(
            "filter-array-items",
            spec.clone(),
            json!({"items": [{"kind": "a"}]}),
        )
        .unwrap();
        assert_eq!(out, json!({"items": [{"kind": "a"}], "kept": []}));

        let out = run::<FilterArrayItemsOp>("filter-array-items", spec, json!({})).unwrap();
        assert_eq!(out, json!({"kept": []}));
    }

    #[test]
    fn test_filter_requires_criteria() {
        let err = compile::<FilterArrayItemsOp>(
            "filter-array-items",
            json!({"source-ref": "items", "criteria": []}),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::InvalidParameter { .. }));

        let err =
            compile::<FilterArrayItemsOp>("filter-array-items", json!({"source-ref": "items"}))
                .unwrap_err();
        assert!(matches!(err, TransformError::MissingParameter { ref parameter, .. } if parameter == "criteria"));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = compile::<FilterArrayItemsOp>(
            "filter-array-items",
            json!({"source-ref": "items", "criteria": [{"term": 1}], "critera": []}),
        )
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_shift_applies_nested_rules() {
        let out = run::<ShiftArrayItemsOp>(
            "shift-array-items",
            json!({
                "source-ref": "orders",
                "target-ref": "ids",
                "criteria": [{"attribute-ref": "open", "term": true}],
                "rules": [{
                    "operation": "set-properties",
                    "spec": {"properties": [{"name-ref": "tagged", "value": "yes"}]}
                }]
            }),
            json!({"orders": [{"id": 1, "open": true}, {"id": 2, "open": false}]}),
        )
        .unwrap();
        assert_eq!(
            out,
            json!({
                "orders": [{"id": 1, "open": true}, {"id": 2, "open": false}],
                "ids": [{"id": 1, "open": true, "tagged": "yes"}]
            })
        );
    }

    #[test]
    fn test_shift_flatten() {
        let spec = json!({
            "source-ref": "groups",
            "flatten": true,
            "rules": [{"operation": "no-op"}]
        });
        let out = run::<ShiftArrayItemsOp>(
            "shift-array-items",
            spec,
            json!({"groups": [[1, 2], 3, [[4]]]}),
        )
        .unwrap();
        assert_eq!(out, json!({"groups": [1, 2, 3, [4]]}));
    }

    #[test]
    fn test_shift_absent_source_writes_empty() {
        let out = run::<ShiftArrayItemsOp>(
            "shift-array-items",
            json!({"source-ref": "missing", "target-ref": "out"}),
            json!({}),
        )
        .unwrap();
        assert_eq!(out, json!({"out": []}));
    }

    #[test]
    fn test_shift_nested_compile_error() {
        let err = compile::<ShiftArrayItemsOp>(
            "shift-array-items",
            json!({"source-ref": "a", "rules": [{"operation": "no-op"}, {"operation": "nope"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::RuleFailed { index: 1, .. }));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_shift_non_array_source() {
        let err = run::<ShiftArrayItemsOp>(
            "shift-array-items",
            json!({"source-ref": "a"}),
            json!({"a": {"b": 1}}),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn test_reduce_defaults() {
        let out = run::<ReduceArrayOp>(
            "reduce-array",
            json!({"source-ref": "attrs", "target-ref": "map"}),
            json!({"attrs": [
                {"name": "color", "value": "red"},
                {"name": "", "value": "skipped"},
                {"name": "size"},
                {"value": "nameless"},
                {"name": 7, "value": null},
                {"name": "color", "value": "blue"}
            ]}),
        )
        .unwrap();
        assert_eq!(out["map"], json!({"color": "blue", "7": null}));
    }

    #[test]
    fn test_reduce_custom_refs_in_place() {
        let out = run::<ReduceArrayOp>(
            "reduce-array",
            json!({"source-ref": "attrs", "name-ref": "k.id", "value-ref": "v"}),
            json!({"attrs": [{"k": {"id": "a"}, "v": [1]}]}),
        )
        .unwrap();
        assert_eq!(out, json!({"attrs": {"a": [1]}}));
    }

    #[test]
    fn test_reduce_container_name() {
        let err = run::<ReduceArrayOp>(
            "reduce-array",
            json!({"source-ref": "attrs"}),
            json!({"attrs": [{"name": {"x": 1}, "value": 1}]}),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn test_distinct_last_wins_in_first_seen_order() {
        let input = json!({"people": [
            {"email": "b@x", "v": 1},
            {"email": "a@x", "v": 2},
            {"email": "b@x", "v": 3},
            {"email": "c@x", "v": 4}
        ]});
        let spec = json!({"source-ref": "people", "on": "email"});

        let first = run::<DistinctItemsOp>("distinct-items", spec.clone(), input.clone()).unwrap();
        assert_eq!(
            first,
            json!({"people": [
                {"email": "b@x", "v": 3},
                {"email": "a@x", "v": 2},
                {"email": "c@x", "v": 4}
            ]})
        );

        for _ in 0..5 {
            let again = run::<DistinctItemsOp>("distinct-items", spec.clone(), input.clone()).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_distinct_keys_by_json_value() {
        let out = run::<DistinctItemsOp>(
            "distinct-items",
            json!({"source-ref": "xs", "on": "k"}),
            json!({"xs": [{"k": 1}, {"k": "1"}, {"k": 1, "last": true}]}),
        )
        .unwrap();
        assert_eq!(out, json!({"xs": [{"k": 1, "last": true}, {"k": "1"}]}));
    }

    #[test]
    fn test_distinct_missing_key() {
        let err = run::<DistinctItemsOp>(
            "distinct-items",
            json!({"source-ref": "xs", "on": "id"}),
            json!({"xs": [{"id": 1}, {"name": "n"}]}),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransformError::MissingKey {
                key: "id".to_string(),
                index: 1
            }
        );
        assert_eq!(err.category(), ErrorCategory::Data);
    }
}
