/// Value algebra over tagged JSON fragments
///
/// These functions are meant to be called from a templating layer that
/// passes raw JSON fragments around together with a kind tag. `Null` and
/// `NotExist` propagate as "absent" instead of raising errors.

mod functions;

pub use functions::{LenFormat, join_array, len_array, merge_arrays, sort_array};

use serde_json::Value;

use crate::pipeline::{Result, TransformError};

/// Kind tag of a [`TypedValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    NotExist,
    String,
    Number,
    Bool,
    Object,
    Array,
}

impl ValueKind {
    /// Kind of a parsed JSON value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

/// A raw JSON fragment with its kind
///
/// The bytes are always a complete JSON value (strings keep their quotes);
/// `NotExist` carries no bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue {
    bytes: Vec<u8>,
    kind: ValueKind,
}

impl TypedValue {
    /// A value that is not present at all
    pub fn not_exist() -> Self {
        Self {
            bytes: Vec::new(),
            kind: ValueKind::NotExist,
        }
    }

    pub fn null() -> Self {
        Self {
            bytes: b"null".to_vec(),
            kind: ValueKind::Null,
        }
    }

    /// Tag an already serialized fragment, checking that it is valid JSON
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| TransformError::InvalidDocument {
            message: e.to_string(),
        })?;
        Ok(Self {
            kind: ValueKind::of(&value),
            bytes,
        })
    }

    pub fn from_value(value: &Value) -> Self {
        Self {
            // Serializing a Value cannot fail: its keys are always strings
            bytes: serde_json::to_vec(value).unwrap_or_default(),
            kind: ValueKind::of(value),
        }
    }

    /// Lift an optional lookup result, mapping `None` to `NotExist`
    pub fn from_option(value: Option<&Value>) -> Self {
        value.map(Self::from_value).unwrap_or_else(Self::not_exist)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// True for `Null` and `NotExist`
    pub fn is_absent(&self) -> bool {
        matches!(self.kind, ValueKind::Null | ValueKind::NotExist)
    }

    /// Parse the fragment, `None` for `NotExist`
    pub fn to_value(&self) -> Result<Option<Value>> {
        if self.kind == ValueKind::NotExist {
            return Ok(None);
        }
        serde_json::from_slice(&self.bytes)
            .map(Some)
            .map_err(|e| TransformError::InvalidDocument {
                message: e.to_string(),
            })
    }

    /// Elements of an array operand; `Null` and `NotExist` read as empty
    fn array(&self, operand: &str) -> Result<Vec<Value>> {
        if self.is_absent() {
            return Ok(Vec::new());
        }
        match self.to_value()? {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(TransformError::type_mismatch(
                operand,
                "array",
                crate::pipeline::type_name(&other),
            )),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kinds() {
        assert_eq!(TypedValue::from_value(&json!("a")).kind(), ValueKind::String);
        assert_eq!(TypedValue::from_value(&json!(1.5)).kind(), ValueKind::Number);
        assert_eq!(TypedValue::from_value(&json!([1])).kind(), ValueKind::Array);
        assert_eq!(TypedValue::from_option(None).kind(), ValueKind::NotExist);
        assert!(TypedValue::null().is_absent());
        assert!(TypedValue::not_exist().is_absent());
        assert_ne!(TypedValue::null(), TypedValue::not_exist());
    }

    #[test]
    fn test_from_bytes() {
        let value = TypedValue::from_bytes(br#"{"a":[1,2]}"#.to_vec()).unwrap();
        assert_eq!(value.kind(), ValueKind::Object);
        assert_eq!(value.to_value().unwrap(), Some(json!({"a": [1, 2]})));
        assert!(TypedValue::from_bytes("{oops").is_err());
    }

    #[test]
    fn test_strings_keep_quotes() {
        let value = TypedValue::from_value(&json!("x"));
        assert_eq!(value.bytes(), b"\"x\"");
    }
}
