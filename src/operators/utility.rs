use crate::executor::OperatorRegistry;
use crate::executor::traits::{CompileOperator, Operator};
use crate::pipeline::{Document, Result, Spec};

/// no-op operator - Return the document unchanged
///
/// Any parameters are ignored.
///
/// Example:
/// ```json
/// {"operation": "no-op"}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

impl CompileOperator for NoOp {
    fn compile(_spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        Ok(NoOp)
    }
}

impl Operator for NoOp {
    fn apply(&self, document: Document) -> Result<Document> {
        Ok(document)
    }
}
