use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::traits::{Operator, OperatorFactory};
use crate::operators;
use crate::pipeline::{CompiledRule, Result, Rule, RuleChain, Spec, TransformError};

/// Operator name → factory table
///
/// Built once when an engine is bootstrapped and read-only afterwards.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    factories: HashMap<String, OperatorFactory>,
}

impl OperatorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, factory) in operators::builtins() {
            registry.register(name, factory);
        }
        registry
    }

    /// Register or replace an operator factory
    pub fn register(&mut self, name: impl Into<String>, factory: OperatorFactory) -> Option<OperatorFactory> {
        self.factories.insert(name.into(), factory)
    }

    /// Register a factory given as a plain closure
    pub fn register_fn<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Spec<'_>, &OperatorRegistry) -> Result<Box<dyn Operator>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered operator names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate a rule's spec and build its operator
    pub fn compile(&self, rule: &Rule) -> Result<CompiledRule> {
        let factory = self
            .factories
            .get(&rule.operation)
            .ok_or_else(|| TransformError::UnknownOperator {
                name: rule.operation.clone(),
            })?;

        let spec = Spec::new(&rule.operation, &rule.spec);
        let operator = factory(&spec, self)?;
        Ok(CompiledRule::new(&rule.operation, Arc::from(operator)))
    }

    /// Compile an ordered rule list, failing on the first bad rule
    pub fn compile_chain(&self, rules: &[Rule]) -> Result<RuleChain> {
        let compiled = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| self.compile(rule).map_err(|e| e.in_rule(index, &rule.operation)))
            .collect::<Result<Vec<_>>>()?;
        Ok(RuleChain::new(compiled))
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Document, ErrorCategory};
    use serde_json::{Map, json};

    #[test]
    fn test_builtins_registered() {
        let registry = OperatorRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                "distinct-items",
                "filter-array-items",
                "format",
                "len-arrays",
                "merge-arrays",
                "no-op",
                "reduce-array",
                "set-properties",
                "shift-array-items",
            ]
        );
    }

    #[test]
    fn test_unknown_operator() {
        let registry = OperatorRegistry::with_builtins();
        let err = registry.compile(&Rule::new("explode", Map::new())).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_register_custom_operator() {
        struct Stamp(String);
        impl Operator for Stamp {
            fn apply(&self, document: Document) -> Result<Document> {
                let path = crate::pipeline::PathRef::parse("stamp")?;
                document.with_value(&path, json!(self.0))
            }
        }

        let mut registry = OperatorRegistry::new();
        registry.register_fn("stamp", |spec, _| {
            spec.require(&["text"])?;
            let text: String = spec.field("text")?.unwrap_or_default();
            Ok(Box::new(Stamp(text)) as Box<dyn Operator>)
        });

        let spec = json!({"text": "hello"}).as_object().cloned().unwrap();
        let rule = registry.compile(&Rule::new("stamp", spec)).unwrap();
        let out = rule.operator().apply(Document::new(json!({}))).unwrap();
        assert_eq!(out.into_value(), json!({"stamp": "hello"}));

        let err = registry.compile(&Rule::new("stamp", Map::new())).unwrap_err();
        assert!(matches!(err, TransformError::MissingParameter { .. }));
    }

    #[test]
    fn test_compile_chain_reports_rule_index() {
        let registry = OperatorRegistry::with_builtins();
        let rules = vec![
            Rule::new("no-op", Map::new()),
            Rule::new("filter-array-items", Map::new()),
        ];
        let err = registry.compile_chain(&rules).unwrap_err();
        assert!(matches!(err, TransformError::RuleFailed { index: 1, .. }));
        assert!(matches!(err.root_cause(), TransformError::MissingParameter { .. }));
    }
}
