use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::algebra::{LenFormat, TypedValue, join_array, len_array, merge_arrays, sort_array};
use crate::amount::{self, AmtOp, Unit};
use crate::pipeline::{PathRef, Result, TransformError, type_name};

/// A computed value for `set-properties`
///
/// Expressions are externally tagged by function name:
/// ```json
/// {"sort": {"ref": "tags"}}
/// {"amt": {"op": "add", "source-unit": "cent", "target-unit": "decimal-2", "refs": ["a", "b"]}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum Expression {
    /// Element count of an array
    Len {
        #[serde(rename = "ref")]
        reference: PathRef,
        #[serde(default)]
        format: LenFormat,
    },
    /// Concatenation of two arrays
    Merge { left: PathRef, right: PathRef },
    /// Sorted copy of an array
    Sort {
        #[serde(rename = "ref")]
        reference: PathRef,
        #[serde(default)]
        property: String,
    },
    /// Strings joined with a delimiter
    Join {
        #[serde(rename = "ref")]
        reference: PathRef,
        #[serde(default)]
        delimiter: String,
    },
    /// Sum or difference of amounts
    Amt {
        op: AmtOp,
        source_unit: Unit,
        target_unit: Unit,
        #[serde(default)]
        decimal_output: bool,
        refs: Vec<PathRef>,
    },
    /// `left > right` after converting both amounts
    AmtCmp {
        unit: Unit,
        left: PathRef,
        left_unit: Unit,
        right: PathRef,
        right_unit: Unit,
    },
}

impl Expression {
    /// Check that every reference addresses a single location
    pub fn validate(&self) -> Result<()> {
        match self {
            Expression::Len { reference, .. }
            | Expression::Sort { reference, .. }
            | Expression::Join { reference, .. } => reference.ensure_concrete(),
            Expression::Merge { left, right } | Expression::AmtCmp { left, right, .. } => {
                left.ensure_concrete()?;
                right.ensure_concrete()
            }
            Expression::Amt { refs, .. } => refs.iter().try_for_each(PathRef::ensure_concrete),
        }
    }

    /// Evaluate against a document root
    ///
    /// Missing inputs propagate as `NotExist` rather than failing.
    pub fn evaluate(&self, root: &Value) -> Result<TypedValue> {
        let lookup = |path: &PathRef| TypedValue::from_option(path.get(root));

        match self {
            Expression::Len { reference, format } => Ok(len_array(&lookup(reference), *format)),
            Expression::Merge { left, right } => merge_arrays(&lookup(left), &lookup(right)),
            Expression::Sort {
                reference,
                property,
            } => sort_array(&lookup(reference), property),
            Expression::Join {
                reference,
                delimiter,
            } => join_array(&lookup(reference), delimiter),
            Expression::Amt {
                op,
                source_unit,
                target_unit,
                decimal_output,
                refs,
            } => {
                let mut values = Vec::with_capacity(refs.len());
                for path in refs {
                    if let Some(text) = amount_text(path, root)? {
                        values.push(text);
                    }
                }
                let total = amount::amt(*op, *source_unit, *target_unit, *decimal_output, &values)?;
                Ok(TypedValue::from_value(&Value::String(total)))
            }
            Expression::AmtCmp {
                unit,
                left,
                left_unit,
                right,
                right_unit,
            } => {
                let (Some(a), Some(b)) = (amount_text(left, root)?, amount_text(right, root)?) else {
                    return Ok(TypedValue::not_exist());
                };
                let greater = amount::amt_cmp(*unit, &a, *left_unit, &b, *right_unit)?;
                Ok(TypedValue::from_value(&Value::Bool(greater)))
            }
        }
    }
}

/// Read an amount operand as text; numbers are rendered, absent is `None`
pub(crate) fn amount_text(path: &PathRef, root: &Value) -> Result<Option<String>> {
    match path.get(root) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(TransformError::type_mismatch(
            path.text(),
            "string or number",
            type_name(other),
        )),
    }
}
