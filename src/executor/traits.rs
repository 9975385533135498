use std::sync::Arc;

use crate::executor::OperatorRegistry;
use crate::pipeline::{Document, Result, Spec};

/// A compiled transformation step
///
/// Operators are built once from a rule's spec and then applied to any
/// number of documents, possibly from several threads at once. They must
/// not keep per-document state.
pub trait Operator: Send + Sync {
    /// Transform a document, returning the new document
    fn apply(&self, document: Document) -> Result<Document>;
}

/// Builds an operator from a rule spec
///
/// The registry is passed along so that operators holding nested rule
/// chains can compile them with the same operator set.
pub type OperatorFactory =
    Arc<dyn Fn(&Spec<'_>, &OperatorRegistry) -> Result<Box<dyn Operator>> + Send + Sync>;

/// Operators that know how to build themselves from a spec
pub trait CompileOperator: Operator + Sized + 'static {
    /// Validate the spec and build the operator
    fn compile(spec: &Spec<'_>, registry: &OperatorRegistry) -> Result<Self>;

    /// Wrap [`CompileOperator::compile`] as a registry factory
    fn factory() -> OperatorFactory {
        Arc::new(compile_boxed::<Self>)
    }
}

fn compile_boxed<T: CompileOperator>(
    spec: &Spec<'_>,
    registry: &OperatorRegistry,
) -> Result<Box<dyn Operator>> {
    Ok(Box::new(T::compile(spec, registry)?))
}
