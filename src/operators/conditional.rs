use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resolve;
use crate::pipeline::{PathRef, Result, TransformError};

/// A single equality test as written in a rule spec
///
/// Example:
/// ```json
/// {"attribute-ref": "status", "operator": "eq", "term": "open"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CriterionSpec {
    /// Path relative to the tested element; empty tests the element itself
    #[serde(default)]
    pub attribute_ref: String,
    /// Comparison operator, only equality is supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Scalar the attribute is compared with
    pub term: Value,
}

/// A compiled criterion
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    attribute: PathRef,
    term: String,
}

impl Criterion {
    /// Validate a criterion for the operator `operator`
    pub fn compile(operator: &str, spec: &CriterionSpec) -> Result<Self> {
        match spec.operator.as_deref() {
            None | Some("eq") | Some("==") => {}
            Some(other) => {
                return Err(TransformError::UnsupportedCriterion {
                    operator: other.to_string(),
                });
            }
        }

        let attribute = PathRef::parse(&spec.attribute_ref)?;
        attribute.ensure_readable()?;
        if attribute.has_iteration() {
            return Err(TransformError::invalid_path(
                &spec.attribute_ref,
                "'[i]' is not allowed in criteria",
            ));
        }

        let term = scalar_text(&spec.term).ok_or_else(|| {
            TransformError::invalid_parameter(
                operator,
                "criteria",
                "term must be a string, number or boolean",
            )
        })?;

        Ok(Self { attribute, term })
    }

    /// True when the attribute's scalar text equals the term
    ///
    /// A `[*]` attribute matches when any of the selected values does.
    pub fn matches(&self, element: &Value) -> bool {
        if self.attribute.has_wildcard() {
            return self
                .attribute
                .select(element)
                .into_iter()
                .filter_map(scalar_text)
                .any(|text| text == self.term);
        }

        resolve(&self.attribute, element)
            .and_then(scalar_text)
            .is_some_and(|text| text == self.term)
    }
}

/// A disjunction of criteria
///
/// An empty set matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    criteria: Vec<Criterion>,
}

impl Criteria {
    pub fn compile(operator: &str, specs: &[CriterionSpec]) -> Result<Self> {
        let criteria = specs
            .iter()
            .map(|spec| Criterion::compile(operator, spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { criteria })
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// True when any criterion matches, or when there are none
    pub fn matches(&self, element: &Value) -> bool {
        self.criteria.is_empty() || self.criteria.iter().any(|c| c.matches(element))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
