use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::{Result, SchemaError};

/// Value of one of the loosely typed action fields.
///
/// Serialized without a tag, so `Bool(true)` is written as `true` and
/// `List` as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<TypedValue>),
}

impl TypedValue {
    /// Reads a JSON value, keeping integers and floats apart so a document
    /// writes back the way it was read. `null` and objects are rejected.
    pub fn from_json(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if n.is_u64() {
                    Err(SchemaError::out_of_range(field, n))
                } else {
                    n.as_f64()
                        .map(Self::Float)
                        .ok_or_else(|| SchemaError::out_of_range(field, n))
                }
            }
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_json(&format!("{field}[{i}]"), item))
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            Value::Null | Value::Object(_) => {
                Err(SchemaError::type_mismatch(field, "bool, number, string or list"))
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TypedValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_bool_or_number(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_))
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl<T: Into<TypedValue>> From<Vec<T>> for TypedValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Behavioural kind of an action, read from its `type` string.
///
/// `boolean`, `vector1` and `vector2` are the kinds the polling runtime
/// dispatches on; anything else is kept as `Other` and checked loosely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Boolean,
    Vector1,
    Vector2,
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Boolean => "boolean",
            Self::Vector1 => "vector1",
            Self::Vector2 => "vector2",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ActionKind {
    fn from(s: &str) -> Self {
        match s {
            "boolean" => Self::Boolean,
            "vector1" => Self::Vector1,
            "vector2" => Self::Vector2,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_and_floats_stay_apart() {
        assert_eq!(TypedValue::from_json("x", &json!(0)).unwrap(), TypedValue::Int(0));
        assert_eq!(TypedValue::from_json("x", &json!(0.0)).unwrap(), TypedValue::Float(0.0));
        assert_eq!(serde_json::to_value(TypedValue::Float(0.0)).unwrap(), json!(0.0));
    }

    #[test]
    fn nested_error_paths_point_at_the_element() {
        let err = TypedValue::from_json("actions[0].enabled", &json!([true, null])).unwrap_err();
        assert_eq!(err.field(), Some("actions[0].enabled[1]"));
    }

    #[test]
    fn huge_unsigned_is_out_of_range() {
        let err = TypedValue::from_json("t", &json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, SchemaError::OutOfRange { .. }));
    }

    #[test]
    fn objects_are_rejected() {
        let err = TypedValue::from_json("osc", &json!({"a": 1})).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn action_kind_keeps_unknown_names() {
        assert_eq!(ActionKind::from("vector2"), ActionKind::Vector2);
        let kind = ActionKind::from("button");
        assert_eq!(kind, ActionKind::Other("button".into()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("button"));
    }

    #[test]
    fn strings_and_lists_are_not_bool_or_number() {
        assert!(TypedValue::Int(3).is_bool_or_number());
        assert!(TypedValue::Bool(false).is_bool_or_number());
        assert!(!TypedValue::from("3").is_bool_or_number());
        assert!(!TypedValue::from(vec![1i64]).is_bool_or_number());
    }

    #[test]
    fn display_lists() {
        let v = TypedValue::from(vec![TypedValue::Bool(true), TypedValue::Float(0.5)]);
        assert_eq!(v.to_string(), "[true, 0.5]");
    }
}
