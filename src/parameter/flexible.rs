use super::ParameterHandle;
use crate::behaviour::NodeContext;
use crate::error::ParameterError;
use crate::value::FromValue;
use serde::{Deserialize, Serialize};

/// A behaviour field that is either a literal, an input slot, or a parameter.
///
/// The source is resolved on every read, so a field linked to a parameter sees
/// writes made earlier in the same tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexibleField<T> {
    Constant(T),
    /// Name of an input slot on the owning behaviour.
    Slot(String),
    Parameter(ParameterHandle),
}

impl<T: FromValue + Clone> FlexibleField<T> {
    pub fn resolve(&self, ctx: &mut NodeContext<'_>) -> Result<T, ParameterError> {
        let value = match self {
            FlexibleField::Constant(value) => return Ok(value.clone()),
            FlexibleField::Slot(slot) => ctx.try_input(slot)?,
            FlexibleField::Parameter(handle) => ctx.read_handle(handle, None)?,
        };
        T::from_value(&value).ok_or_else(|| ParameterError::TypeMismatch {
            name: self.source_name(),
            expected: T::value_type(),
            found: value,
        })
    }

    /// Resolves the field, logging and falling back to `default` on error.
    pub fn resolve_or(&self, ctx: &mut NodeContext<'_>, default: T) -> T {
        match self.resolve(ctx) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(node = %ctx.node(), error = %e, "failed to resolve field");
                default
            }
        }
    }

    fn source_name(&self) -> String {
        match self {
            FlexibleField::Constant(_) => "<constant>".to_string(),
            FlexibleField::Slot(slot) => slot.clone(),
            FlexibleField::Parameter(handle) => handle.to_string(),
        }
    }
}

impl<T> From<T> for FlexibleField<T> {
    fn from(value: T) -> Self {
        FlexibleField::Constant(value)
    }
}

impl<T: Default> Default for FlexibleField<T> {
    fn default() -> Self {
        FlexibleField::Constant(T::default())
    }
}

impl<T> FlexibleField<T> {
    pub fn slot(name: &str) -> Self {
        FlexibleField::Slot(name.to_string())
    }

    pub fn parameter(name: &str) -> Self {
        FlexibleField::Parameter(ParameterHandle::local(name))
    }
}
