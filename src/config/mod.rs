/// Configuration types for reshape
///
/// This module contains the types rule sets are loaded from. Rule files
/// are plain JSON; each rule set is validated before any of its rules are
/// compiled.

mod rules;

pub use rules::{RuleSetConfig, RulesFile};
