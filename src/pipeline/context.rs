use serde_json::Value;

use super::error::{Result, TransformError};
use super::path::PathRef;

/// A JSON document flowing through a rule chain
///
/// Documents are owned values: every operator consumes one and returns a new
/// one, so a caller's input can never be observed half-edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    /// Wrap an already parsed JSON value
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Parse a document from raw JSON bytes
    ///
    /// # Example
    /// ```
    /// use reshape::pipeline::Document;
    /// use serde_json::json;
    ///
    /// let doc = Document::from_slice(br#"{"user": {"id": "123"}}"#).unwrap();
    /// assert_eq!(doc.get_path("user.id").unwrap(), Some(&json!("123")));
    /// ```
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map(Self::new)
            .map_err(|e| TransformError::InvalidDocument {
                message: e.to_string(),
            })
    }

    /// Serialize the document back to JSON bytes
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.root).map_err(|e| TransformError::InvalidDocument {
            message: e.to_string(),
        })
    }

    /// Return a new document with `value` written at `path`
    pub fn with_value(mut self, path: &PathRef, value: Value) -> Result<Self> {
        self.set(path, value)?;
        Ok(self)
    }

    /// Write a value at a path (mutable version)
    pub fn set(&mut self, path: &PathRef, value: Value) -> Result<()> {
        path.set(&mut self.root, value)
    }

    /// Read the value at a path
    pub fn get(&self, path: &PathRef) -> Option<&Value> {
        path.get(&self.root)
    }

    /// Parse `path` and read the value there
    pub fn get_path(&self, path: &str) -> Result<Option<&Value>> {
        Ok(PathRef::parse(path)?.get(&self.root))
    }

    /// True when the path resolves to a non-null value
    pub fn has(&self, path: &PathRef) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    /// Move the value out of a path, leaving null in its place
    pub fn take(&mut self, path: &PathRef) -> Option<Value> {
        path.get_mut(&mut self.root).map(std::mem::take)
    }

    /// Remove the value at a path
    pub fn remove(&mut self, path: &PathRef) -> bool {
        path.delete(&mut self.root)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

impl From<Value> for Document {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}
