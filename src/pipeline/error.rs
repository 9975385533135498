use thiserror::Error;

/// Coarse classification of a [`TransformError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The rule set or one of its parameters is malformed
    Configuration,
    /// The document does not have the shape a rule requires
    Data,
    /// An unknown rule set or operator was referenced
    NotFound,
}

/// Errors that can occur while compiling or applying rules
///
/// Every failure is returned as a value; a failing rule aborts the rest of
/// the chain and no partial document is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A required operator parameter is absent
    #[error("Operator '{operator}' is missing required parameter '{parameter}'")]
    MissingParameter { operator: String, parameter: String },

    /// An operator parameter is present but unusable
    #[error("Invalid parameter '{parameter}' for operator '{operator}': {message}")]
    InvalidParameter {
        operator: String,
        parameter: String,
        message: String,
    },

    /// A path reference could not be parsed or is used in the wrong position
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// A unit tag outside the closed unit set
    #[error("Unknown amount unit '{unit}'")]
    UnknownUnit { unit: String },

    /// No conversion exists between two units
    #[error("Unsupported conversion from '{source_unit}' to '{target_unit}'")]
    UnsupportedConversion {
        source_unit: String,
        target_unit: String,
    },

    /// A criterion names an operator other than equality
    #[error("Unsupported criterion operator '{operator}'")]
    UnsupportedCriterion { operator: String },

    /// A rule set definition was rejected
    #[error("Invalid rule set: {message}")]
    InvalidRuleSet { message: String },

    /// A rule set id is already registered
    #[error("Rule set '{id}' is already registered")]
    DuplicateRuleSet { id: String },

    /// The value at a path does not have the required type
    #[error("Type error at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// A monetary amount string could not be interpreted
    #[error("Invalid amount '{value}': {message}")]
    InvalidAmount { value: String, message: String },

    /// Amount arithmetic left the representable range
    #[error("Amount arithmetic overflowed")]
    AmountOverflow,

    /// A string that should hold an integer does not
    #[error("Invalid number '{value}'")]
    InvalidNumber { value: String },

    /// An element lacks a key the operator requires
    #[error("Missing key '{key}' in element {index}")]
    MissingKey { key: String, index: usize },

    /// A write addressed an index past the end of an array
    #[error("Index out of bounds at '{path}': {index} (length: {length})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        length: usize,
    },

    /// The input bytes are not a JSON document
    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    /// No rule set is registered under the id
    #[error("Rule set not found: {id}")]
    UnknownRuleSet { id: String },

    /// No operator is registered under the name
    #[error("Operator not found: {name}")]
    UnknownOperator { name: String },

    /// A rule in a chain failed
    #[error("Rule {index} ({operation}) failed: {source}")]
    RuleFailed {
        index: usize,
        operation: String,
        #[source]
        source: Box<TransformError>,
    },
}

impl TransformError {
    /// Create a MissingParameter error
    pub fn missing_parameter(operator: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            operator: operator.into(),
            parameter: parameter.into(),
        }
    }

    /// Create an InvalidParameter error
    pub fn invalid_parameter(
        operator: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            operator: operator.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidPath error
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a TypeMismatch error
    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an UnsupportedConversion error
    pub fn unsupported_conversion(
        source_unit: impl Into<String>,
        target_unit: impl Into<String>,
    ) -> Self {
        Self::UnsupportedConversion {
            source_unit: source_unit.into(),
            target_unit: target_unit.into(),
        }
    }

    /// Create an InvalidRuleSet error
    pub fn invalid_rule_set(message: impl Into<String>) -> Self {
        Self::InvalidRuleSet {
            message: message.into(),
        }
    }

    /// Wrap an error raised by the rule at `index`
    pub fn in_rule(self, index: usize, operation: impl Into<String>) -> Self {
        Self::RuleFailed {
            index,
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingParameter { .. }
            | Self::InvalidParameter { .. }
            | Self::InvalidPath { .. }
            | Self::UnknownUnit { .. }
            | Self::UnsupportedConversion { .. }
            | Self::UnsupportedCriterion { .. }
            | Self::InvalidRuleSet { .. }
            | Self::DuplicateRuleSet { .. } => ErrorCategory::Configuration,
            Self::TypeMismatch { .. }
            | Self::InvalidAmount { .. }
            | Self::AmountOverflow
            | Self::InvalidNumber { .. }
            | Self::MissingKey { .. }
            | Self::IndexOutOfBounds { .. }
            | Self::InvalidDocument { .. } => ErrorCategory::Data,
            Self::UnknownRuleSet { .. } | Self::UnknownOperator { .. } => ErrorCategory::NotFound,
            Self::RuleFailed { source, .. } => source.category(),
        }
    }

    /// The innermost error, unwrapping rule context
    pub fn root_cause(&self) -> &TransformError {
        match self {
            Self::RuleFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, TransformError>;
