/// Built-in rule operators
///
/// Every operator validates its spec once when a rule set is registered
/// and is then applied to any number of documents. Array operators share
/// the `source-ref` / `target-ref` convention: the target defaults to the
/// source, and a rule whose target equals its source rewrites the array in
/// place.

mod collection;
mod conditional;
mod data;
mod expression;
mod nested;
mod utility;

pub use collection::{DistinctItemsOp, FilterArrayItemsOp, ReduceArrayOp, ShiftArrayItemsOp};
pub use conditional::{Criteria, Criterion, CriterionSpec};
pub use data::{ConversionKind, FormatOp, SetPropertiesOp};
pub use expression::Expression;
pub use nested::{LenArraysOp, MergeArraysOp};
pub use utility::NoOp;

use serde_json::Value;

use crate::executor::traits::{CompileOperator, OperatorFactory};
use crate::pipeline::{Document, PathRef, Result, TransformError, type_name};

pub const SHIFT_ARRAY_ITEMS: &str = "shift-array-items";
pub const MERGE_ARRAYS: &str = "merge-arrays";
pub const FILTER_ARRAY_ITEMS: &str = "filter-array-items";
pub const REDUCE_ARRAY: &str = "reduce-array";
pub const DISTINCT_ITEMS: &str = "distinct-items";
pub const SET_PROPERTIES: &str = "set-properties";
pub const FORMAT: &str = "format";
pub const LEN_ARRAYS: &str = "len-arrays";
pub const NO_OP: &str = "no-op";

/// Name and factory of every built-in operator
pub fn builtins() -> Vec<(&'static str, OperatorFactory)> {
    vec![
        (SHIFT_ARRAY_ITEMS, ShiftArrayItemsOp::factory()),
        (MERGE_ARRAYS, MergeArraysOp::factory()),
        (FILTER_ARRAY_ITEMS, FilterArrayItemsOp::factory()),
        (REDUCE_ARRAY, ReduceArrayOp::factory()),
        (DISTINCT_ITEMS, DistinctItemsOp::factory()),
        (SET_PROPERTIES, SetPropertiesOp::factory()),
        (FORMAT, FormatOp::factory()),
        (LEN_ARRAYS, LenArraysOp::factory()),
        (NO_OP, NoOp::factory()),
    ]
}

/// Source and target of an array operator
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArrayRefs {
    source: PathRef,
    target: PathRef,
}

impl ArrayRefs {
    /// Validate the pair, defaulting the target to the source
    pub(crate) fn new(operator: &str, source: PathRef, target: Option<PathRef>) -> Result<Self> {
        if source.is_zero() {
            return Err(TransformError::missing_parameter(operator, "source-ref"));
        }
        source.ensure_concrete()?;

        let target = target
            .filter(|target| !target.is_zero())
            .unwrap_or_else(|| source.clone());
        target.ensure_writable()?;

        Ok(Self { source, target })
    }

    pub(crate) fn in_place(&self) -> bool {
        self.source.text() == self.target.text()
    }

    /// Read the source array; absent or null reads as empty
    ///
    /// In-place rules move the array out of the document instead of
    /// copying it, since the target is about to be overwritten.
    pub(crate) fn read(&self, document: &mut Document) -> Result<Vec<Value>> {
        let value = if self.in_place() {
            document.take(&self.source)
        } else {
            document.get(&self.source).cloned()
        };

        match value {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(TransformError::type_mismatch(
                self.source.text(),
                "array",
                type_name(&other),
            )),
        }
    }

    pub(crate) fn write(&self, document: Document, value: Value) -> Result<Document> {
        document.with_value(&self.target, value)
    }
}

/// Resolve `path` against an element; the empty path is the element itself
pub(crate) fn resolve<'a>(path: &PathRef, element: &'a Value) -> Option<&'a Value> {
    if path.is_zero() {
        Some(element)
    } else {
        path.get(element)
    }
}
