/// reshape - A JSON-to-JSON rule transformation engine
///
/// This library reshapes JSON documents by threading them through named
/// rule sets. Each rule names an operator (filtering, shifting, merging,
/// deduplicating, setting properties, formatting amounts, ...) together
/// with its parameters; rules are validated once when a rule set is
/// registered and then applied to any number of documents.
///
/// The fixed-point amount conversions and the value algebra functions the
/// operators are built on are exposed as well.

pub mod algebra;
pub mod amount;
pub mod config;
pub mod executor;
pub mod operators;
pub mod pipeline;

// Re-export commonly used types
pub use config::{RuleSetConfig, RulesFile};
pub use executor::{Engine, OperatorRegistry, RuleSet};
pub use executor::traits::{CompileOperator, Operator, OperatorFactory};
pub use pipeline::{Document, ErrorCategory, PathRef, Result, Rule, TransformError};
