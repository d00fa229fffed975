//! The runtime value model.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::context::Context;
use crate::error::EvaluationError;

/// Extension point for values the engine itself provides: template
/// functions, stream slices, match bookkeeping. Objects can expose named
/// attributes and may be callable.
pub trait Object: fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Attribute access; the default has no attributes.
    fn get(&self, _name: &str) -> Option<Value> {
        None
    }

    fn is_callable(&self) -> bool {
        false
    }

    fn call(
        &self,
        _ctxt: &Context,
        _args: Vec<Value>,
        _kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvaluationError> {
        Err(EvaluationError::new(format!(
            "{} object is not callable",
            self.type_name()
        )))
    }

    /// Supports downcasting to the concrete object type.
    fn as_any(&self) -> &dyn Any;
}

/// A dynamically typed template value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Object(Rc<dyn Object>),
}

impl Value {
    pub fn object(obj: impl Object + 'static) -> Self {
        Value::Object(Rc::new(obj))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Truth of a value, the way conditions and predicates see it.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_callable())
    }

    /// Downcasts an object value to a concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Uniform attribute access: object attribute, then mapping entry, then
    /// none.
    pub fn attr(&self, name: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(name).unwrap_or(Value::None),
            Value::Map(map) => map.get(name).cloned().unwrap_or(Value::None),
            _ => Value::None,
        }
    }

    /// Uniform item access: mapping entry or sequence index (negative
    /// indices count from the end), falling back to attribute access for
    /// string keys, then none.
    pub fn item(&self, key: &Value) -> Value {
        match (self, key) {
            (Value::Map(map), Value::Str(name)) => {
                map.get(name).cloned().unwrap_or(Value::None)
            }
            (Value::List(items), Value::Int(idx)) => {
                let len = items.len() as i64;
                let idx = if *idx < 0 { idx + len } else { *idx };
                if idx >= 0 && idx < len {
                    items[idx as usize].clone()
                } else {
                    Value::None
                }
            }
            (Value::Str(s), Value::Int(idx)) => {
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i64;
                let idx = if *idx < 0 { idx + len } else { *idx };
                if idx >= 0 && idx < len {
                    Value::Str(chars[idx as usize].to_string())
                } else {
                    Value::None
                }
            }
            (_, Value::Str(name)) => self.attr(name),
            _ => Value::None,
        }
    }

    /// Invokes a callable value.
    pub fn call(
        &self,
        ctxt: &Context,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvaluationError> {
        match self {
            Value::Object(obj) => obj.call(ctxt, args, kwargs),
            other => Err(EvaluationError::new(format!(
                "{} value is not callable",
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // None renders as nothing; its output is omitted everywhere.
            Value::None => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Object(obj) => write!(f, "<{}>", obj.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
    }

    #[test]
    fn test_numeric_equality_is_cross_type() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Float(1.5));
    }

    #[test]
    fn test_item_access() {
        let list = Value::from(vec![1i64, 2, 3]);
        assert_eq!(list.item(&Value::Int(0)), Value::Int(1));
        assert_eq!(list.item(&Value::Int(-1)), Value::Int(3));
        assert_eq!(list.item(&Value::Int(9)), Value::None);

        let mut map = IndexMap::new();
        map.insert("some".to_string(), Value::from("thing"));
        let map = Value::Map(map);
        assert_eq!(map.item(&Value::from("some")), Value::from("thing"));
        assert_eq!(map.attr("some"), Value::from("thing"));
        assert_eq!(map.attr("missing"), Value::None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::None.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::from(vec![1i64, 2]).to_string(), "[1, 2]");
    }

    #[test]
    fn test_json_conversion() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"name": "Joe", "tags": [1, 2]}"#).unwrap();
        let value = Value::from(json);
        assert_eq!(value.attr("name"), Value::from("Joe"));
        assert_eq!(value.attr("tags").item(&Value::Int(1)), Value::Int(2));
    }
}
