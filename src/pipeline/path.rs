use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use super::error::{Result, TransformError};

/// One access step of a [`PathRef`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member, e.g. `user`
    Field(String),
    /// Array position, e.g. `[3]`
    Index(usize),
    /// Every element of an array, `[*]`
    Wildcard,
    /// A new element at the end of an array, `[+]`
    Append,
    /// The current loop index, `[i]`
    Iteration,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, "{}", name),
            Segment::Index(index) => write!(f, "[{}]", index),
            Segment::Wildcard => write!(f, "[*]"),
            Segment::Append => write!(f, "[+]"),
            Segment::Iteration => write!(f, "[i]"),
        }
    }
}

/// A parsed address into a JSON document
///
/// Grammar: dot-separated field names, each optionally followed by bracket
/// tokens (`[N]`, `[*]`, `[+]`, `[i]`). A reference parsed from the empty
/// string is "zero" and addresses nothing.
///
/// # Example
/// ```
/// use reshape::pipeline::PathRef;
/// use serde_json::json;
///
/// let path = PathRef::parse("orders[1].id").unwrap();
/// let doc = json!({"orders": [{"id": "a"}, {"id": "b"}]});
///
/// assert_eq!(path.get(&doc), Some(&json!("b")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathRef {
    text: String,
    segments: Vec<Segment>,
}

impl PathRef {
    /// Parse a textual path
    pub fn parse(text: &str) -> Result<Self> {
        let segments = parse_segments(text)?;
        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    /// Build a reference from segments, rendering its text
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut text = String::new();
        for segment in &segments {
            if let Segment::Field(_) = segment {
                if !text.is_empty() {
                    text.push('.');
                }
            }
            text.push_str(&segment.to_string());
        }
        Self { text, segments }
    }

    /// The text the reference was parsed from
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True for the empty reference
    pub fn is_zero(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_iteration(&self) -> bool {
        self.segments.contains(&Segment::Iteration)
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&Segment::Wildcard)
    }

    /// Reject references that cannot be read from
    pub fn ensure_readable(&self) -> Result<()> {
        if self.segments.contains(&Segment::Append) {
            return Err(TransformError::invalid_path(
                &self.text,
                "'[+]' is only allowed in target references",
            ));
        }
        Ok(())
    }

    /// Reject references that cannot be written to
    pub fn ensure_writable(&self) -> Result<()> {
        if self.is_zero() {
            return Err(TransformError::invalid_path(&self.text, "empty target reference"));
        }
        if self.has_wildcard() {
            return Err(TransformError::invalid_path(
                &self.text,
                "'[*]' is not allowed in target references",
            ));
        }
        if self.has_iteration() {
            return Err(TransformError::invalid_path(
                &self.text,
                "'[i]' must be instantiated before writing",
            ));
        }
        Ok(())
    }

    /// Reject references that do not address exactly one location
    pub fn ensure_concrete(&self) -> Result<()> {
        self.ensure_readable()?;
        if self.has_wildcard() || self.has_iteration() {
            return Err(TransformError::invalid_path(
                &self.text,
                "'[*]' and '[i]' are not allowed here",
            ));
        }
        Ok(())
    }

    /// Split at the first `[i]` into the root array reference and the
    /// reference relative to each root item
    pub fn split_iteration(&self) -> Option<(PathRef, PathRef)> {
        let position = self.segments.iter().position(|s| *s == Segment::Iteration)?;
        let root = PathRef::from_segments(self.segments[..position].to_vec());
        let nested = PathRef::from_segments(self.segments[position + 1..].to_vec());
        Some((root, nested))
    }

    /// Replace the first `[i]` with a concrete index
    pub fn instantiate(&self, index: usize) -> PathRef {
        let mut segments = self.segments.clone();
        if let Some(slot) = segments.iter_mut().find(|s| **s == Segment::Iteration) {
            *slot = Segment::Index(index);
        }
        PathRef::from_segments(segments)
    }

    /// Read the single value addressed by this reference
    ///
    /// Returns `None` when any step is missing, and for wildcard, append or
    /// iteration segments.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        if self.is_zero() {
            return None;
        }

        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Field(name), Value::Object(map)) => map.get(name)?,
                (Segment::Field(name), Value::Array(items)) => {
                    // Numeric field names double as indices ("items.0")
                    let index: usize = name.parse().ok()?;
                    items.get(index)?
                }
                (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Read every value addressed by this reference, fanning out on `[*]`
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        if self.is_zero() {
            return Vec::new();
        }

        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::with_capacity(current.len());
            for value in current {
                match (segment, value) {
                    (Segment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                    (Segment::Field(name), Value::Object(map)) => next.extend(map.get(name)),
                    (Segment::Field(name), Value::Array(items)) => {
                        if let Ok(index) = name.parse::<usize>() {
                            next.extend(items.get(index));
                        }
                    }
                    (Segment::Index(index), Value::Array(items)) => next.extend(items.get(*index)),
                    _ => {}
                }
            }
            current = next;
        }

        current
    }

    /// Write `value` at this reference, creating intermediate containers
    pub fn set(&self, root: &mut Value, value: Value) -> Result<()> {
        self.ensure_writable()?;

        let (last, parents) = match self.segments.split_last() {
            Some(split) => split,
            None => return Err(TransformError::invalid_path(&self.text, "empty target reference")),
        };

        let mut current = root;
        for (position, segment) in parents.iter().enumerate() {
            let next_is_array = matches!(
                self.segments[position + 1],
                Segment::Index(_) | Segment::Append
            );
            current = self.step_mut(current, segment, next_is_array)?;
        }

        match last {
            Segment::Field(name) => {
                let map = self.object_mut(current)?;
                map.insert(name.clone(), value);
            }
            Segment::Index(index) => {
                let items = self.array_mut(current)?;
                match (*index).cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[*index] = value,
                    std::cmp::Ordering::Equal => items.push(value),
                    std::cmp::Ordering::Greater => {
                        return Err(TransformError::IndexOutOfBounds {
                            path: self.text.clone(),
                            index: *index,
                            length: items.len(),
                        });
                    }
                }
            }
            Segment::Append => self.array_mut(current)?.push(value),
            Segment::Wildcard | Segment::Iteration => unreachable!("rejected by ensure_writable"),
        }

        Ok(())
    }

    /// Remove the addressed value, reporting whether anything was removed
    pub fn delete(&self, root: &mut Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            return false;
        };

        let parent = PathRef::from_segments(parents.to_vec());
        let target = if parents.is_empty() {
            Some(root)
        } else {
            parent.get_mut(root)
        };

        match (last, target) {
            (Segment::Field(name), Some(Value::Object(map))) => map.shift_remove(name).is_some(),
            (Segment::Index(index), Some(Value::Array(items))) if *index < items.len() => {
                items.remove(*index);
                true
            }
            _ => false,
        }
    }

    /// Mutable access to the single value addressed by this reference
    pub fn get_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        if self.is_zero() {
            return None;
        }

        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Field(name), Value::Object(map)) => map.get_mut(name)?,
                (Segment::Field(name), Value::Array(items)) => {
                    let index: usize = name.parse().ok()?;
                    items.get_mut(index)?
                }
                (Segment::Index(index), Value::Array(items)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn step_mut<'a>(
        &self,
        current: &'a mut Value,
        segment: &Segment,
        next_is_array: bool,
    ) -> Result<&'a mut Value> {
        let empty = || {
            if next_is_array {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            }
        };

        match segment {
            Segment::Field(name) => {
                let map = self.object_mut(current)?;
                let slot = map.entry(name.clone()).or_insert_with(empty);
                if slot.is_null() {
                    *slot = empty();
                }
                Ok(slot)
            }
            Segment::Index(index) => {
                let items = self.array_mut(current)?;
                if *index > items.len() {
                    return Err(TransformError::IndexOutOfBounds {
                        path: self.text.clone(),
                        index: *index,
                        length: items.len(),
                    });
                }
                if *index == items.len() {
                    items.push(empty());
                }
                let slot = &mut items[*index];
                if slot.is_null() {
                    *slot = empty();
                }
                Ok(slot)
            }
            Segment::Append => {
                let items = self.array_mut(current)?;
                items.push(empty());
                let last = items.len() - 1;
                Ok(&mut items[last])
            }
            Segment::Wildcard | Segment::Iteration => unreachable!("rejected by ensure_writable"),
        }
    }

    fn object_mut<'a>(&self, value: &'a mut Value) -> Result<&'a mut Map<String, Value>> {
        if value.is_null() {
            *value = Value::Object(Map::new());
        }
        let actual = type_name(value);
        value
            .as_object_mut()
            .ok_or_else(|| TransformError::type_mismatch(&self.text, "object", actual))
    }

    fn array_mut<'a>(&self, value: &'a mut Value) -> Result<&'a mut Vec<Value>> {
        if value.is_null() {
            *value = Value::Array(Vec::new());
        }
        let actual = type_name(value);
        value
            .as_array_mut()
            .ok_or_else(|| TransformError::type_mismatch(&self.text, "array", actual))
    }
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::str::FromStr for PathRef {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        PathRef::parse(s)
    }
}

impl Serialize for PathRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for PathRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        PathRef::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Name of a JSON value's type, for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_segments(text: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    if text.is_empty() {
        return Ok(segments);
    }

    for part in text.split('.') {
        if part.is_empty() {
            return Err(TransformError::invalid_path(text, "empty path segment"));
        }

        let (name, mut rest) = match part.find('[') {
            Some(open) => part.split_at(open),
            None => (part, ""),
        };
        if !name.is_empty() {
            if name.contains(']') {
                return Err(TransformError::invalid_path(text, "unbalanced ']'"));
            }
            segments.push(Segment::Field(name.to_string()));
        }

        while !rest.is_empty() {
            let Some(inner) = rest.strip_prefix('[') else {
                return Err(TransformError::invalid_path(
                    text,
                    format!("unexpected '{}' after ']'", rest),
                ));
            };
            let close = inner
                .find(']')
                .ok_or_else(|| TransformError::invalid_path(text, "unterminated '['"))?;
            segments.push(parse_bracket(text, &inner[..close])?);
            rest = &inner[close + 1..];
        }
    }

    Ok(segments)
}

fn parse_bracket(text: &str, token: &str) -> Result<Segment> {
    match token {
        "*" => Ok(Segment::Wildcard),
        "+" => Ok(Segment::Append),
        "i" => Ok(Segment::Iteration),
        digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits
            .parse()
            .map(Segment::Index)
            .map_err(|_| TransformError::invalid_path(text, format!("index '{}' is too large", digits))),
        other => Err(TransformError::invalid_path(
            text,
            format!("unknown bracket content '[{}]'", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(text: &str) -> PathRef {
        PathRef::parse(text).unwrap()
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(
            path("orders[2].lines[*].sku[+]").segments(),
            &[
                Segment::Field("orders".to_string()),
                Segment::Index(2),
                Segment::Field("lines".to_string()),
                Segment::Wildcard,
                Segment::Field("sku".to_string()),
                Segment::Append,
            ]
        );
        assert_eq!(
            path("a[i].b").segments(),
            &[
                Segment::Field("a".to_string()),
                Segment::Iteration,
                Segment::Field("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_zero() {
        let zero = path("");
        assert!(zero.is_zero());
        assert!(zero.segments().is_empty());
        assert_eq!(zero.get(&json!({"a": 1})), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(PathRef::parse("a..b").is_err());
        assert!(PathRef::parse("a[x]").is_err());
        assert!(PathRef::parse("a[]").is_err());
        assert!(PathRef::parse("a[1").is_err());
        assert!(PathRef::parse("a[1]b").is_err());
        assert!(PathRef::parse("a]").is_err());
    }

    #[test]
    fn test_get_nested() {
        let doc = json!({
            "user": {"profile": {"name": "Alice"}},
            "items": [{"name": "Item 1"}, {"name": "Item 2"}]
        });

        assert_eq!(path("user.profile.name").get(&doc), Some(&json!("Alice")));
        assert_eq!(path("items[1].name").get(&doc), Some(&json!("Item 2")));
        assert_eq!(path("items.0.name").get(&doc), Some(&json!("Item 1")));
        assert_eq!(path("items[9]").get(&doc), None);
        assert_eq!(path("user.missing").get(&doc), None);
        assert_eq!(path("items[*].name").get(&doc), None);
    }

    #[test]
    fn test_select_wildcard() {
        let doc = json!({"tags": ["a", "b"], "items": [{"k": 1}, {"x": 2}, {"k": 3}]});

        assert_eq!(path("tags[*]").select(&doc), vec![&json!("a"), &json!("b")]);
        assert_eq!(path("items[*].k").select(&doc), vec![&json!(1), &json!(3)]);
        assert!(path("missing[*]").select(&doc).is_empty());
    }

    #[test]
    fn test_set_creates_containers() {
        let mut doc = json!({});
        path("a.b[0].c").set(&mut doc, json!(1)).unwrap();
        path("a.list[+]").set(&mut doc, json!("x")).unwrap();
        path("a.list[+]").set(&mut doc, json!("y")).unwrap();

        assert_eq!(doc, json!({"a": {"b": [{"c": 1}], "list": ["x", "y"]}}));
    }

    #[test]
    fn test_set_replaces_and_appends_by_index() {
        let mut doc = json!({"items": [1, 2]});
        path("items[0]").set(&mut doc, json!(10)).unwrap();
        path("items[2]").set(&mut doc, json!(3)).unwrap();
        assert_eq!(doc, json!({"items": [10, 2, 3]}));

        let err = path("items[7]").set(&mut doc, json!(0)).unwrap_err();
        assert!(matches!(err, TransformError::IndexOutOfBounds { index: 7, length: 3, .. }));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut doc = json!({"count": 42});
        let err = path("count.value").set(&mut doc, json!(1)).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn test_positions() {
        assert!(path("a[+]").ensure_readable().is_err());
        assert!(path("a[*]").ensure_writable().is_err());
        assert!(path("a[i].b").ensure_writable().is_err());
        assert!(path("").ensure_writable().is_err());
        assert!(path("a[i].b").ensure_readable().is_ok());
    }

    #[test]
    fn test_ensure_concrete() {
        assert!(path("a[0].b").ensure_concrete().is_ok());
        assert!(path("a[*]").ensure_concrete().is_err());
        assert!(path("a[i]").ensure_concrete().is_err());
        assert!(path("a[+]").ensure_concrete().is_err());
    }

    #[test]
    fn test_split_and_instantiate() {
        let template = path("orders[i].lines");
        let (root, nested) = template.split_iteration().unwrap();
        assert_eq!(root.text(), "orders");
        assert_eq!(nested.text(), "lines");

        let concrete = template.instantiate(3);
        assert_eq!(concrete.text(), "orders[3].lines");
        assert_eq!(concrete.segments()[1], Segment::Index(3));

        assert!(path("orders.lines").split_iteration().is_none());
    }

    #[test]
    fn test_delete() {
        let mut doc = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});
        assert!(path("a.b").delete(&mut doc));
        assert!(path("list[0]").delete(&mut doc));
        assert!(!path("a.zzz").delete(&mut doc));
        assert_eq!(doc, json!({"a": {"c": 2}, "list": [2, 3]}));
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let parsed: PathRef = serde_json::from_value(json!("a.b[1]")).unwrap();
        assert_eq!(parsed.text(), "a.b[1]");
        assert!(serde_json::from_value::<PathRef>(json!("a[?]")).is_err());
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json!("a.b[1]"));
    }
}
