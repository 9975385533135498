/// Rule engine
///
/// This module contains the engine that owns the operator registry and the
/// registered rule sets, and threads documents through them.

mod registry;
pub mod traits;

pub use registry::OperatorRegistry;

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RuleSetConfig;
use crate::pipeline::{Document, Result, Rule, RuleChain, TransformError};
use traits::OperatorFactory;

/// A compiled, registered rule set
#[derive(Debug)]
pub struct RuleSet {
    id: String,
    chain: RuleChain,
}

impl RuleSet {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn chain(&self) -> &RuleChain {
        &self.chain
    }

    /// Thread a document through every rule
    pub fn apply(&self, document: Document) -> Result<Document> {
        self.chain.apply(document)
    }
}

/// The transformation engine
///
/// Operators are registered while the engine is being set up (`&mut self`)
/// and are read-only afterwards. Rule sets can be added at any time: the
/// table holds `Arc` snapshots, so a transformation only holds the read
/// lock long enough to clone one.
///
/// # Example
/// ```
/// use reshape::{Engine, Rule};
/// use serde_json::json;
///
/// let engine = Engine::new();
/// let rule: Rule = serde_json::from_value(json!({
///     "operation": "filter-array-items",
///     "spec": {"source-ref": "xs", "criteria": [{"attribute-ref": "ok", "term": true}]}
/// })).unwrap();
/// engine.add_rule_set("only-ok", vec![rule]).unwrap();
///
/// let out = engine.transform("only-ok", br#"{"xs":[{"ok":true},{"ok":false}]}"#).unwrap();
/// assert_eq!(out, br#"{"xs":[{"ok":true}]}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Engine {
    operators: OperatorRegistry,
    rule_sets: RwLock<HashMap<String, Arc<RuleSet>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with every built-in operator registered
    pub fn new() -> Self {
        Self::with_operators(OperatorRegistry::with_builtins())
    }

    /// An engine using the given operator set
    pub fn with_operators(operators: OperatorRegistry) -> Self {
        Self {
            operators,
            rule_sets: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace an operator
    ///
    /// Rule sets already compiled keep the operators they were built with.
    pub fn register_operator(&mut self, name: impl Into<String>, factory: OperatorFactory) {
        self.operators.register(name, factory);
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// Compile and register a rule set under a new id
    ///
    /// Nothing is registered when any rule fails to compile.
    pub fn add_rule_set(&self, id: impl Into<String>, rules: Vec<Rule>) -> Result<()> {
        let rule_set = self.compile(id.into(), &rules)?;

        let mut rule_sets = self.rule_sets.write();
        if rule_sets.contains_key(&rule_set.id) {
            return Err(TransformError::DuplicateRuleSet { id: rule_set.id });
        }
        tracing::info!(id = %rule_set.id, rules = rule_set.chain.len(), "registered rule set");
        rule_sets.insert(rule_set.id.clone(), Arc::new(rule_set));
        Ok(())
    }

    /// Validate and register a rule set read from configuration
    pub fn add_rule_set_config(&self, config: RuleSetConfig) -> Result<()> {
        config.check()?;
        self.add_rule_set(config.id, config.rules)
    }

    /// Swap the rules of an already registered rule set
    ///
    /// Transformations already running finish with the previous rules.
    pub fn replace_rule_set(&self, id: impl Into<String>, rules: Vec<Rule>) -> Result<()> {
        let rule_set = self.compile(id.into(), &rules)?;

        let mut rule_sets = self.rule_sets.write();
        let Some(slot) = rule_sets.get_mut(&rule_set.id) else {
            return Err(TransformError::UnknownRuleSet { id: rule_set.id });
        };
        tracing::info!(id = %rule_set.id, rules = rule_set.chain.len(), "replaced rule set");
        *slot = Arc::new(rule_set);
        Ok(())
    }

    /// Look up a registered rule set
    pub fn rule_set(&self, id: &str) -> Result<Arc<RuleSet>> {
        self.rule_sets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TransformError::UnknownRuleSet { id: id.to_string() })
    }

    /// Registered rule set ids, sorted
    pub fn rule_set_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rule_sets.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Transform a serialized JSON document with the rule set `id`
    pub fn transform(&self, id: &str, input: &[u8]) -> Result<Vec<u8>> {
        let rule_set = self.rule_set(id)?;
        let document = Document::from_slice(input)?;
        tracing::debug!(id, rules = rule_set.chain.len(), bytes = input.len(), "transforming document");
        rule_set.apply(document)?.to_vec()
    }

    /// Transform an already parsed document with the rule set `id`
    pub fn transform_value(&self, id: &str, input: Value) -> Result<Value> {
        let rule_set = self.rule_set(id)?;
        tracing::debug!(id, rules = rule_set.chain.len(), "transforming document");
        rule_set.apply(Document::new(input)).map(Document::into_value)
    }

    fn compile(&self, id: String, rules: &[Rule]) -> Result<RuleSet> {
        if id.is_empty() {
            return Err(TransformError::invalid_rule_set("rule set id must not be empty"));
        }
        let chain = self.operators.compile_chain(rules)?;
        Ok(RuleSet { id, chain })
    }
}
