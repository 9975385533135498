use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use validator::Validate;

use super::context::Document;
use super::error::{Result, TransformError};
use crate::executor::traits::Operator;

/// A single step in a rule chain
///
/// Example:
/// ```json
/// {
///   "operation": "filter-array-items",
///   "spec": {
///     "source-ref": "orders",
///     "criteria": [{"attribute-ref": "status", "term": "open"}]
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Rule {
    /// Name of the registered operator to run
    #[validate(length(min = 1, message = "operation must not be empty"))]
    pub operation: String,

    /// Operator parameters
    #[serde(default)]
    pub spec: Map<String, Value>,
}

impl Rule {
    pub fn new(operation: impl Into<String>, spec: Map<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            spec,
        }
    }
}

/// A rule whose spec has been validated and turned into an operator
#[derive(Clone)]
pub struct CompiledRule {
    operation: String,
    operator: Arc<dyn Operator>,
}

impl CompiledRule {
    pub fn new(operation: impl Into<String>, operator: Arc<dyn Operator>) -> Self {
        Self {
            operation: operation.into(),
            operator,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn operator(&self) -> &dyn Operator {
        self.operator.as_ref()
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("operation", &self.operation)
            .field("operator", &"<operator>")
            .finish()
    }
}

/// An ordered list of compiled rules
///
/// Applying a chain folds the document through every rule in order and
/// stops at the first failing rule.
#[derive(Debug, Clone, Default)]
pub struct RuleChain {
    rules: Vec<CompiledRule>,
}

impl RuleChain {
    pub fn new(rules: Vec<CompiledRule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Run the document through every rule
    pub fn apply(&self, document: Document) -> Result<Document> {
        self.rules
            .iter()
            .enumerate()
            .try_fold(document, |document, (index, rule)| {
                tracing::trace!(index, operation = rule.operation(), "applying rule");
                rule.operator().apply(document).map_err(|e| {
                    tracing::debug!(index, operation = rule.operation(), error = %e, "rule failed");
                    e.in_rule(index, rule.operation())
                })
            })
    }
}

/// Read-only view of a rule's parameters, tagged with the operator name
///
/// Operators validate their parameters through this view once, when the
/// rule is compiled.
#[derive(Debug, Clone, Copy)]
pub struct Spec<'a> {
    operator: &'a str,
    params: &'a Map<String, Value>,
}

impl<'a> Spec<'a> {
    pub fn new(operator: &'a str, params: &'a Map<String, Value>) -> Self {
        Self { operator, params }
    }

    pub fn operator(&self) -> &'a str {
        self.operator
    }

    pub fn params(&self) -> &'a Map<String, Value> {
        self.params
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.params.get(name)
    }

    /// Fail with `MissingParameter` for the first absent or null name
    pub fn require(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if self.get(name).is_none_or(Value::is_null) {
                return Err(TransformError::missing_parameter(self.operator, *name));
            }
        }
        Ok(())
    }

    /// Deserialize the whole parameter map into a typed spec
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            TransformError::invalid_parameter(self.operator, "spec", e.to_string())
        })
    }

    /// Deserialize a single parameter, `None` when absent or null
    ///
    /// Custom operators that read a handful of loose parameters can use
    /// this instead of a full [`Spec::parse`] struct.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| TransformError::invalid_parameter(self.operator, name, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PathRef;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rule_deserializes_with_default_spec() {
        let rule: Rule = serde_json::from_value(json!({"operation": "no-op"})).unwrap();
        assert_eq!(rule.operation, "no-op");
        assert!(rule.spec.is_empty());
    }

    #[test]
    fn test_spec_require() {
        let map = params(json!({"source-ref": "items", "target-ref": null}));
        let spec = Spec::new("filter-array-items", &map);

        assert!(spec.require(&["source-ref"]).is_ok());
        assert_eq!(
            spec.require(&["source-ref", "target-ref"]).unwrap_err(),
            TransformError::missing_parameter("filter-array-items", "target-ref")
        );
    }

    #[test]
    fn test_spec_field() {
        let map = params(json!({"delimiter": ",", "flatten": true, "limit": null, "bad": 3}));
        let spec = Spec::new("shift-array-items", &map);

        assert_eq!(spec.field::<String>("delimiter").unwrap().as_deref(), Some(","));
        assert_eq!(spec.field::<bool>("flatten").unwrap(), Some(true));
        assert_eq!(spec.field::<u32>("limit").unwrap(), None);
        assert_eq!(spec.field::<String>("missing").unwrap(), None);
        assert!(matches!(
            spec.field::<String>("bad").unwrap_err(),
            TransformError::InvalidParameter { ref parameter, .. } if parameter == "bad"
        ));
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        struct Fail;
        impl Operator for Fail {
            fn apply(&self, _document: Document) -> Result<Document> {
                Err(TransformError::AmountOverflow)
            }
        }
        struct Mark;
        impl Operator for Mark {
            fn apply(&self, document: Document) -> Result<Document> {
                let path = PathRef::parse("marked")?;
                document.with_value(&path, json!(true))
            }
        }

        let chain = RuleChain::new(vec![
            CompiledRule::new("mark", Arc::new(Mark)),
            CompiledRule::new("fail", Arc::new(Fail)),
            CompiledRule::new("mark", Arc::new(Mark)),
        ]);
        let err = chain.apply(Document::new(json!({}))).unwrap_err();
        assert!(matches!(err, TransformError::RuleFailed { index: 1, .. }));

        let ok = RuleChain::new(vec![CompiledRule::new("mark", Arc::new(Mark))]);
        assert_eq!(ok.apply(Document::new(json!({}))).unwrap().into_value(), json!({"marked": true}));
    }
}
