use super::{Value, ValueType};

/// Converts `value` to `target` when the conversion is safe and meaningful.
///
/// Returns the value unchanged when it already is an instance of `target`, a
/// converted copy for numeric and enum conversions (`Int` to `Enum`, `Float` to
/// `Int`, `Bool` to `Int`, ...), and `None` otherwise.
pub fn convert(value: &Value, target: &ValueType) -> Option<Value> {
    if value.is_instance_of(target) {
        return Some(value.clone());
    }

    match (value, target) {
        (Value::Int(i), ValueType::Float) => Some(Value::Float(*i as f64)),
        (Value::Float(f), ValueType::Int) => float_to_int(*f).map(Value::Int),
        (Value::Bool(b), ValueType::Int) => Some(Value::Int(i64::from(*b))),
        (Value::Bool(b), ValueType::Float) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        (Value::Int(i), ValueType::Bool) => Some(Value::Bool(*i != 0)),
        (Value::Int(i), ValueType::Enum(type_name)) => Some(Value::Enum {
            type_name: type_name.clone(),
            index: *i,
        }),
        (Value::Float(f), ValueType::Enum(type_name)) => float_to_int(*f).map(|index| Value::Enum {
            type_name: type_name.clone(),
            index,
        }),
        (Value::Enum { index, .. }, ValueType::Int) => Some(Value::Int(*index)),
        (Value::Enum { index, .. }, ValueType::Float) => Some(Value::Float(*index as f64)),
        (Value::List(items), ValueType::List(element)) => items
            .iter()
            .map(|item| convert(item, element))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        _ => None,
    }
}

/// Rounds to the nearest integer; `None` for NaN, infinities and values outside `i64`.
fn float_to_int(f: f64) -> Option<i64> {
    let rounded = f.round();
    // i64::MAX is not representable as f64; 2^63 is the first value past the range.
    (rounded >= i64::MIN as f64 && rounded < i64::MAX as f64).then_some(rounded as i64)
}

/// Rust types that can be read out of a [`Value`].
///
/// Reads go through [`convert`], so an `Int` parameter can be read as `f64` and
/// an enum slot can be read as `i64`.
pub trait FromValue: Sized {
    /// The declared type a value is converted to before extraction.
    fn value_type() -> ValueType;

    fn extract(value: Value) -> Option<Self>;

    fn from_value(value: &Value) -> Option<Self> {
        convert(value, &Self::value_type()).and_then(Self::extract)
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $value_type:expr, $pattern:pat => $out:expr) => {
        impl FromValue for $ty {
            fn value_type() -> ValueType {
                $value_type
            }
            fn extract(value: Value) -> Option<Self> {
                match value {
                    $pattern => Some($out),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(bool, ValueType::Bool, Value::Bool(b) => b);
impl_from_value!(i64, ValueType::Int, Value::Int(i) => i);
impl_from_value!(f64, ValueType::Float, Value::Float(f) => f);
impl_from_value!(f32, ValueType::Float, Value::Float(f) => f as f32);
impl_from_value!(String, ValueType::String, Value::String(s) => s);

impl FromValue for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn extract(value: Value) -> Option<Self> {
        match value {
            Value::Int(i) => i32::try_from(i).ok(),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn extract(value: Value) -> Option<Self> {
        Some(value)
    }
}
