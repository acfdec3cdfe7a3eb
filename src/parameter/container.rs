use super::ParameterId;
use crate::error::ParameterError;
use crate::graph::IdAllocator;
use crate::value::{Value, ValueType, convert};
use serde::{Deserialize, Serialize};

/// A named, typed variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub(crate) id: ParameterId,
    pub(crate) name: String,
    pub(crate) value_type: ValueType,
    pub(crate) value: Value,
}

impl Parameter {
    pub fn id(&self) -> ParameterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Stores `value`, converting it to the parameter type when possible.
    /// On error the current value is left untouched.
    pub(crate) fn assign(&mut self, value: Value) -> Result<(), ParameterError> {
        if value.is_null() && !self.value_type.is_nullable() {
            return Err(ParameterError::NullAssignment {
                name: self.name.clone(),
                value_type: self.value_type.clone(),
            });
        }
        let converted =
            convert(&value, &self.value_type).ok_or_else(|| ParameterError::TypeMismatch {
                name: self.name.clone(),
                expected: self.value_type.clone(),
                found: value,
            })?;
        self.value = converted;
        Ok(())
    }

    /// Fails when the caller was built against a different parameter type.
    pub(crate) fn check_declared(&self, declared: Option<&ValueType>) -> Result<(), ParameterError> {
        match declared {
            Some(expected) if *expected != self.value_type => Err(ParameterError::TypeChanged {
                name: self.name.clone(),
                expected: expected.clone(),
                found: self.value_type.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Ordered collection of parameters with stable ids.
///
/// Lookups go by id first and fall back to the name, so references survive a
/// graph whose ids were not preserved (for example a re-imported asset).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ContainerData")]
pub struct ParameterContainer {
    parameters: Vec<Parameter>,
    ids: IdAllocator,
}

#[derive(Deserialize)]
struct ContainerData {
    #[serde(default)]
    parameters: Vec<Parameter>,
    #[serde(default)]
    ids: IdAllocator,
}

impl TryFrom<ContainerData> for ParameterContainer {
    type Error = ParameterError;

    fn try_from(data: ContainerData) -> Result<Self, ParameterError> {
        let mut container = ParameterContainer {
            parameters: Vec::with_capacity(data.parameters.len()),
            ids: data.ids,
        };
        for parameter in data.parameters {
            if container.get(parameter.id).is_some() {
                return Err(ParameterError::InvalidData(format!(
                    "duplicate parameter id '{}'",
                    parameter.id
                )));
            }
            if container.by_name(&parameter.name).is_some() {
                return Err(ParameterError::DuplicateName(parameter.name));
            }
            if !container.ids.reserve(parameter.id.0) {
                return Err(ParameterError::InvalidData(format!(
                    "parameter id {} is out of range",
                    parameter.id.0
                )));
            }
            container.parameters.push(parameter);
        }
        Ok(container)
    }
}

impl ParameterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new parameter. Names are unique within a container.
    pub fn add(
        &mut self,
        name: &str,
        value_type: ValueType,
        initial: Value,
    ) -> Result<ParameterId, ParameterError> {
        if self.by_name(name).is_some() {
            return Err(ParameterError::DuplicateName(name.to_string()));
        }
        let id = ParameterId(self.ids.allocate().ok_or(ParameterError::IdsExhausted)?);
        let mut parameter = Parameter {
            id,
            name: name.to_string(),
            value: value_type.default_value(),
            value_type,
        };
        if !initial.is_null() || parameter.value_type.is_nullable() {
            parameter.assign(initial)?;
        }
        self.parameters.push(parameter);
        Ok(id)
    }

    pub fn remove(&mut self, id: ParameterId) -> bool {
        let before = self.parameters.len();
        self.parameters.retain(|p| p.id != id);
        before != self.parameters.len()
    }

    pub fn rename(&mut self, id: ParameterId, name: &str) -> Result<(), ParameterError> {
        if self.by_name(name).is_some_and(|p| p.id != id) {
            return Err(ParameterError::DuplicateName(name.to_string()));
        }
        let parameter = self.get_mut(id).ok_or_else(|| ParameterError::NotFound {
            id: Some(id),
            name: name.to_string(),
        })?;
        parameter.name = name.to_string();
        Ok(())
    }

    /// Changes a parameter's type and resets its value. References built against the
    /// old type report [`ParameterError::TypeChanged`] from then on.
    pub fn change_type(&mut self, id: ParameterId, value_type: ValueType) -> bool {
        match self.get_mut(id) {
            Some(parameter) => {
                parameter.value = value_type.default_value();
                parameter.value_type = value_type;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ParameterId) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: ParameterId) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Looks a parameter up by id, falling back to the name.
    pub fn find(&self, id: Option<ParameterId>, name: &str) -> Option<&Parameter> {
        id.and_then(|id| self.get(id))
            .or_else(|| self.by_name(name))
    }

    fn find_mut(&mut self, id: Option<ParameterId>, name: &str) -> Option<&mut Parameter> {
        let index = id
            .and_then(|id| self.parameters.iter().position(|p| p.id == id))
            .or_else(|| self.parameters.iter().position(|p| p.name == name))?;
        self.parameters.get_mut(index)
    }

    /// Reads a parameter, checking it still has the type the caller declared.
    pub fn read(
        &self,
        id: Option<ParameterId>,
        name: &str,
        declared: Option<&ValueType>,
    ) -> Result<Value, ParameterError> {
        let parameter = self.find(id, name).ok_or_else(|| ParameterError::NotFound {
            id,
            name: name.to_string(),
        })?;
        parameter.check_declared(declared)?;
        Ok(parameter.value.clone())
    }

    /// Writes a parameter. On any error the stored value is left untouched.
    pub fn write(
        &mut self,
        id: Option<ParameterId>,
        name: &str,
        declared: Option<&ValueType>,
        value: Value,
    ) -> Result<(), ParameterError> {
        let parameter = self.find_mut(id, name).ok_or_else(|| ParameterError::NotFound {
            id,
            name: name.to_string(),
        })?;
        parameter.check_declared(declared)?;
        parameter.assign(value)
    }

    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.by_name(name).map(|p| p.value.clone())
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ParameterError> {
        self.write(None, name, None, value.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
