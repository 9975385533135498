use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::conditional::{Criteria, CriterionSpec};
use super::expression::{Expression, amount_text};
use crate::amount::{self, Unit};
use crate::executor::OperatorRegistry;
use crate::executor::traits::{CompileOperator, Operator};
use crate::pipeline::{Document, PathRef, Result, Spec, TransformError, type_name};

/// Keep an explicit `null` distinct from an absent field
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PropertySpec {
    name_ref: PathRef,
    #[serde(default, deserialize_with = "present")]
    value: Option<Value>,
    path_ref: Option<PathRef>,
    expression: Option<Expression>,
    #[serde(default)]
    delete: bool,
    #[serde(default)]
    if_missing: bool,
    #[serde(default)]
    criteria: Vec<CriterionSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SetPropertiesParams {
    properties: Vec<PropertySpec>,
}

/// Where a property's new value comes from
#[derive(Debug, Clone, PartialEq)]
enum PropertySource {
    Literal(Value),
    Copy(PathRef),
    Expression(Expression),
    Delete,
}

#[derive(Debug)]
struct Property {
    name: PathRef,
    source: PropertySource,
    if_missing: bool,
    criteria: Criteria,
}

impl Property {
    fn compile(operator: &str, spec: PropertySpec) -> Result<Self> {
        spec.name_ref.ensure_writable()?;

        let given = [
            spec.value.is_some(),
            spec.path_ref.is_some(),
            spec.expression.is_some(),
            spec.delete,
        ];
        if given.iter().filter(|given| **given).count() != 1 {
            return Err(TransformError::invalid_parameter(
                operator,
                spec.name_ref.text(),
                "exactly one of 'value', 'path-ref', 'expression' or 'delete' is required",
            ));
        }

        let source = if let Some(value) = spec.value {
            PropertySource::Literal(value)
        } else if let Some(path) = spec.path_ref {
            path.ensure_concrete()?;
            PropertySource::Copy(path)
        } else if let Some(expression) = spec.expression {
            expression.validate()?;
            PropertySource::Expression(expression)
        } else {
            PropertySource::Delete
        };

        Ok(Self {
            name: spec.name_ref,
            source,
            if_missing: spec.if_missing,
            criteria: Criteria::compile(operator, &spec.criteria)?,
        })
    }

    fn apply(&self, document: &mut Document) -> Result<()> {
        if !self.criteria.matches(document.root()) {
            return Ok(());
        }
        if self.if_missing && document.has(&self.name) {
            return Ok(());
        }

        let value = match &self.source {
            PropertySource::Literal(value) => Some(value.clone()),
            PropertySource::Copy(path) => document.get(path).cloned(),
            PropertySource::Expression(expression) => expression.evaluate(document.root())?.to_value()?,
            PropertySource::Delete => {
                document.remove(&self.name);
                return Ok(());
            }
        };

        match value {
            Some(value) => document.set(&self.name, value),
            None => Ok(()),
        }
    }
}

/// set-properties operator - Set, copy, compute or delete properties
///
/// Entries run in order and each sees the writes of the ones before it.
///
/// Example:
/// ```json
/// {
///   "operation": "set-properties",
///   "spec": {
///     "properties": [
///       {"name-ref": "source", "value": "import"},
///       {"name-ref": "customer.id", "path-ref": "order.customerId"},
///       {"name-ref": "lineCount", "expression": {"len": {"ref": "order.lines"}}},
///       {"name-ref": "currency", "value": "EUR", "if-missing": true},
///       {"name-ref": "order.customerId", "delete": true}
///     ]
///   }
/// }
/// ```
#[derive(Debug)]
pub struct SetPropertiesOp {
    properties: Vec<Property>,
}

impl CompileOperator for SetPropertiesOp {
    fn compile(spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        spec.require(&["properties"])?;
        let params: SetPropertiesParams = spec.parse()?;

        let properties = params
            .properties
            .into_iter()
            .map(|property| Property::compile(spec.operator(), property))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { properties })
    }
}

impl Operator for SetPropertiesOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        for property in &self.properties {
            property.apply(&mut document)?;
        }
        Ok(document)
    }
}

/// Conversion performed by a `format` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionKind {
    /// Amount unit conversion
    Amt,
    /// Integer string to JSON number
    Atoi,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConversionSpec {
    target_ref: PathRef,
    #[serde(rename = "type")]
    kind: ConversionKind,
    source_unit: Option<Unit>,
    target_unit: Option<Unit>,
    #[serde(default)]
    decimal_format: bool,
    #[serde(default)]
    negate: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FormatParams {
    conversions: Vec<ConversionSpec>,
}

#[derive(Debug, Clone, PartialEq)]
enum Conversion {
    Amount {
        source: Unit,
        target: Unit,
        decimal_format: bool,
        negate: bool,
    },
    Integer,
}

#[derive(Debug)]
struct FormatEntry {
    target: PathRef,
    conversion: Conversion,
}

impl FormatEntry {
    fn compile(operator: &str, spec: ConversionSpec) -> Result<Self> {
        spec.target_ref.ensure_writable()?;

        let conversion = match spec.kind {
            ConversionKind::Atoi => Conversion::Integer,
            ConversionKind::Amt => {
                let source = spec
                    .source_unit
                    .ok_or_else(|| TransformError::missing_parameter(operator, "source-unit"))?;
                let target = spec
                    .target_unit
                    .ok_or_else(|| TransformError::missing_parameter(operator, "target-unit"))?;
                if source.conversion_to(target).is_none() {
                    return Err(TransformError::unsupported_conversion(
                        source.as_str(),
                        target.as_str(),
                    ));
                }
                // the two-decimal display reads its input as cents
                if spec.decimal_format && target != Unit::Cent {
                    return Err(TransformError::invalid_parameter(
                        operator,
                        "decimal-format",
                        format!("requires target unit 'cent', got '{}'", target),
                    ));
                }
                Conversion::Amount {
                    source,
                    target,
                    decimal_format: spec.decimal_format,
                    negate: spec.negate,
                }
            }
        };

        Ok(Self {
            target: spec.target_ref,
            conversion,
        })
    }

    fn convert(&self, document: &Document) -> Result<Option<Value>> {
        match &self.conversion {
            Conversion::Amount {
                source,
                target,
                decimal_format,
                negate,
            } => {
                let Some(text) = amount_text(&self.target, document.root())? else {
                    return Ok(None);
                };
                let mut converted = amount::format(&text, *source, *target, *negate)?;
                if *decimal_format {
                    converted = amount::display_two_decimals(&converted)?;
                }
                Ok(Some(Value::String(converted)))
            }
            Conversion::Integer => match document.get(&self.target) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(text)) => text
                    .trim()
                    .parse::<i64>()
                    .map(|number| Some(Value::from(number)))
                    .map_err(|_| TransformError::InvalidNumber { value: text.clone() }),
                Some(Value::Number(number)) if number.is_i64() || number.is_u64() => {
                    Ok(Some(Value::Number(number.clone())))
                }
                Some(Value::Number(number)) => Err(TransformError::InvalidNumber {
                    value: number.to_string(),
                }),
                Some(other) => Err(TransformError::type_mismatch(
                    self.target.text(),
                    "string or number",
                    type_name(other),
                )),
            },
        }
    }
}

/// format operator - Convert values in place
///
/// `amt` entries convert a monetary amount between units, `atoi` entries
/// turn an integer string into a JSON number. `decimal-format` renders a
/// cent result as a two-decimal display string (`151` → `1.51`) and is only
/// accepted with target unit `cent`.
///
/// Example:
/// ```json
/// {
///   "operation": "format",
///   "spec": {
///     "conversions": [
///       {"target-ref": "total", "type": "amt", "source-unit": "decimal", "target-unit": "cent"},
///       {"target-ref": "refund", "type": "amt", "source-unit": "cent", "target-unit": "decimal-2", "negate": true},
///       {"target-ref": "quantity", "type": "atoi"}
///     ]
///   }
/// }
/// ```
#[derive(Debug)]
pub struct FormatOp {
    entries: Vec<FormatEntry>,
}

impl CompileOperator for FormatOp {
    fn compile(spec: &Spec<'_>, _registry: &OperatorRegistry) -> Result<Self> {
        spec.require(&["conversions"])?;
        let params: FormatParams = spec.parse()?;

        let entries = params
            .conversions
            .into_iter()
            .map(|conversion| FormatEntry::compile(spec.operator(), conversion))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }
}

impl Operator for FormatOp {
    fn apply(&self, mut document: Document) -> Result<Document> {
        for entry in &self.entries {
            if let Some(value) = entry.convert(&document)? {
                document.set(&entry.target, value)?;
            }
        }
        Ok(document)
    }
}
