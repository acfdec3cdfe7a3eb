use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a slot or parameter.
///
/// Types are compared at connect time (slots) and on every write (parameters).
/// `Bool`, `Int`, `Float` and `Enum` are value types and never hold null; the
/// remaining types are reference-like and accept [`Value::Null`](super::Value::Null).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Accepts every value.
    Any,
    Bool,
    Int,
    Float,
    String,
    /// A named enumeration stored as its integer index.
    Enum(String),
    /// A homogeneous list.
    List(Box<ValueType>),
    /// An opaque host object handle of the named type.
    Object(String),
    /// A handle to a parameter, used to pass parameter references through slots.
    Parameter,
}

impl ValueType {
    /// Whether `null` is a legal value of this type.
    pub fn is_nullable(&self) -> bool {
        !matches!(
            self,
            ValueType::Bool | ValueType::Int | ValueType::Float | ValueType::Enum(_)
        )
    }

    /// Whether a value of type `source` can be stored where `self` is expected.
    ///
    /// This is the check used when connecting an output slot to an input slot.
    pub fn is_assignable_from(&self, source: &ValueType) -> bool {
        match (self, source) {
            (a, b) if a == b => true,
            (ValueType::Any, _) => true,
            // Integers widen to floats without loss of meaning
            (ValueType::Float, ValueType::Int) => true,
            (ValueType::List(a), ValueType::List(b)) => a.is_assignable_from(b),
            _ => false,
        }
    }

    /// The value a freshly created slot or parameter of this type holds.
    pub fn default_value(&self) -> super::Value {
        use super::Value;
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Enum(type_name) => Value::Enum {
                type_name: type_name.clone(),
                index: 0,
            },
            ValueType::List(_) => Value::List(Vec::new()),
            ValueType::Any
            | ValueType::String
            | ValueType::Object(_)
            | ValueType::Parameter => Value::Null,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "Any"),
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Float => write!(f, "Float"),
            ValueType::String => write!(f, "String"),
            ValueType::Enum(name) => write!(f, "Enum<{}>", name),
            ValueType::List(element) => write!(f, "List<{}>", element),
            ValueType::Object(name) => write!(f, "Object<{}>", name),
            ValueType::Parameter => write!(f, "Parameter"),
        }
    }
}
