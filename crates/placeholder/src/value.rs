//! Variable tree values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node in a request variable tree.
///
/// Loaded from YAML scenario files and serialized as the GraphQL `variables`
/// object. Only `String` leaves may carry placeholder tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<VarValue>),
    Map(BTreeMap<String, VarValue>),
}

impl VarValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VarValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            VarValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VarValue::Int(i) => Some(*i as f64),
            VarValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&VarValue> {
        match self {
            VarValue::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// True if both values have the same structure, ignoring leaf contents.
    ///
    /// String leaves are allowed to turn into numbers, since a lone numeric
    /// placeholder renders as a number.
    pub fn same_shape(&self, other: &VarValue) -> bool {
        match (self, other) {
            (VarValue::List(a), VarValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            (VarValue::Map(a), VarValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.same_shape(vb))
            }
            (VarValue::String(_), VarValue::String(_) | VarValue::Int(_) | VarValue::Float(_)) => {
                true
            }
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl From<&str> for VarValue {
    fn from(s: &str) -> Self {
        VarValue::String(s.to_string())
    }
}

impl From<String> for VarValue {
    fn from(s: String) -> Self {
        VarValue::String(s)
    }
}

impl From<i64> for VarValue {
    fn from(i: i64) -> Self {
        VarValue::Int(i)
    }
}

impl From<f64> for VarValue {
    fn from(f: f64) -> Self {
        VarValue::Float(f)
    }
}

impl From<bool> for VarValue {
    fn from(b: bool) -> Self {
        VarValue::Bool(b)
    }
}

impl<V: Into<VarValue>> FromIterator<(String, V)> for VarValue {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        VarValue::Map(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_yaml_load() {
        let yaml = r#"
input:
  name: "{{random.name}}"
  age: 42
  score: 1.5
  active: true
  tags: [a, b]
  parent: ~
"#;
        let value: VarValue = serde_yaml::from_str(yaml).unwrap();
        let input = value.get("input").unwrap();
        assert_eq!(input.get("name").and_then(|v| v.as_str()), Some("{{random.name}}"));
        assert_eq!(input.get("age"), Some(&VarValue::Int(42)));
        assert_eq!(input.get("score"), Some(&VarValue::Float(1.5)));
        assert_eq!(input.get("active"), Some(&VarValue::Bool(true)));
        assert_eq!(input.get("parent"), Some(&VarValue::Null));
        assert!(matches!(input.get("tags"), Some(VarValue::List(l)) if l.len() == 2));
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let value: VarValue = [("id".to_string(), VarValue::Int(7))].into_iter().collect();
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"id":7}"#);
        assert_eq!(serde_json::to_string(&VarValue::Null).unwrap(), "null");
    }

    #[test]
    fn test_same_shape() {
        let a: VarValue = serde_json::from_str(r#"{"a": ["x", 1], "b": {"c": "y"}}"#).unwrap();
        let b: VarValue = serde_json::from_str(r#"{"a": [5, 1], "b": {"c": "z"}}"#).unwrap();
        let c: VarValue = serde_json::from_str(r#"{"a": ["x"], "b": {"c": "y"}}"#).unwrap();
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }
}
