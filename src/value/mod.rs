//! Runtime values that flow through slots and parameters.

pub mod convert;
pub mod types;

pub use convert::*;
pub use types::*;

use crate::parameter::ParameterHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed value stored in a slot or parameter.
///
/// Values are always handed out by clone, so two successive reads of the same
/// slot never alias each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum { type_name: String, index: i64 },
    List(Vec<Value>),
    Object { type_name: String, handle: u64 },
    Parameter(ParameterHandle),
}

impl Value {
    /// The runtime type of this value. `None` for [`Value::Null`].
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::Int),
            Value::Float(_) => Some(ValueType::Float),
            Value::String(_) => Some(ValueType::String),
            Value::Enum { type_name, .. } => Some(ValueType::Enum(type_name.clone())),
            Value::List(items) => {
                // An empty list carries no element information; treat it as a list of Any.
                let element = items
                    .iter()
                    .find_map(Value::value_type)
                    .unwrap_or(ValueType::Any);
                Some(ValueType::List(Box::new(element)))
            }
            Value::Object { type_name, .. } => Some(ValueType::Object(type_name.clone())),
            Value::Parameter(_) => Some(ValueType::Parameter),
        }
    }

    /// Whether this value may be stored, unconverted, where `ty` is declared.
    pub fn is_instance_of(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Value::Null, ty) => ty.is_nullable(),
            (Value::List(items), ValueType::List(element)) => {
                items.iter().all(|item| item.is_instance_of(element))
            }
            (value, ty) => value
                .value_type()
                .is_some_and(|actual| actual == *ty || *ty == ValueType::Any),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Enum { type_name, index } => write!(f, "{}::{}", type_name, index),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object { type_name, handle } => write!(f, "{}#{}", type_name, handle),
            Value::Parameter(handle) => write!(f, "&{}", handle),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<ParameterHandle> for Value {
    fn from(value: ParameterHandle) -> Self {
        Value::Parameter(value)
    }
}
