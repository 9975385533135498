use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::pipeline::{Result, Rule, TransformError};

/// A named, ordered list of rules
///
/// Example:
/// ```json
/// {
///   "id": "orders-v1",
///   "rules": [
///     {"operation": "filter-array-items", "spec": {
///       "source-ref": "orders",
///       "criteria": [{"attribute-ref": "status", "term": "open"}]
///     }},
///     {"operation": "len-arrays", "spec": {"openOrders": "orders"}}
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct RuleSetConfig {
    /// Identifier used to select the rule set when transforming
    #[validate(length(min = 1, message = "rule set id must not be empty"))]
    pub id: String,

    /// Rules applied in order
    #[serde(default)]
    #[validate(nested)]
    pub rules: Vec<Rule>,
}

impl RuleSetConfig {
    pub fn new(id: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            id: id.into(),
            rules,
        }
    }

    /// Run the derived validations, mapped to a configuration error
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|e| {
            TransformError::invalid_rule_set(format!("rule set '{}': {}", self.id, e))
        })
    }
}

/// Top-level layout of a rules file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct RulesFile {
    #[serde(default)]
    #[validate(nested)]
    pub rule_sets: Vec<RuleSetConfig>,
}

impl RulesFile {
    /// Parse a rules file from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_slice(text.as_bytes())
    }

    /// Parse a rules file from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let file: RulesFile = serde_json::from_slice(bytes)
            .map_err(|e| TransformError::invalid_rule_set(format!("malformed rules file: {}", e)))?;
        for rule_set in &file.rule_sets {
            rule_set.check()?;
        }
        Ok(file)
    }

    /// Rule set ids in file order
    pub fn ids(&self) -> Vec<&str> {
        self.rule_sets.iter().map(|r| r.id.as_str()).collect()
    }
}
