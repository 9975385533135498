/// Rule chain types
///
/// This module contains the document model, path references, errors and
/// the rule types that are threaded together by the engine.

mod context;
mod error;
mod path;
mod step;

pub use context::Document;
pub use error::{ErrorCategory, Result, TransformError};
pub use path::{PathRef, Segment, type_name};
pub use step::{CompiledRule, Rule, RuleChain, Spec};
