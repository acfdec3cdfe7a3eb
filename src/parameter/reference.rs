use super::ParameterId;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which container a parameter lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerSource {
    /// The container owned by the graph instance running the behaviour.
    #[default]
    Local,
    /// A named container registered on the [`Runtime`](crate::scheduler::Runtime)
    /// and shared by every graph.
    Shared(String),
}

/// Addresses a parameter by container, id and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterHandle {
    #[serde(default)]
    pub container: ContainerSource,
    #[serde(default)]
    pub id: Option<ParameterId>,
    pub name: String,
}

impl ParameterHandle {
    /// A handle into the local container, resolved by name.
    pub fn local(name: &str) -> Self {
        Self {
            container: ContainerSource::Local,
            id: None,
            name: name.to_string(),
        }
    }

    /// A handle into a shared container, resolved by name.
    pub fn shared(container: &str, name: &str) -> Self {
        Self {
            container: ContainerSource::Shared(container.to_string()),
            id: None,
            name: name.to_string(),
        }
    }

    pub fn with_id(mut self, id: ParameterId) -> Self {
        self.id = Some(id);
        self
    }
}

impl fmt::Display for ParameterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.container {
            ContainerSource::Local => write!(f, "{}", self.name),
            ContainerSource::Shared(container) => write!(f, "{}::{}", container, self.name),
        }
    }
}

/// Where a behaviour reads (and possibly writes) a parameter value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterReference {
    /// A literal. Read-only.
    Constant(Value),
    /// A stored parameter. `value_type` is the type the reference was built
    /// against; a parameter whose type differs is reported as changed.
    Parameter {
        handle: ParameterHandle,
        #[serde(default)]
        value_type: Option<ValueType>,
    },
    /// An input slot of the owning behaviour. A slot carrying a
    /// [`Value::Parameter`] handle is dereferenced; any other value is read as-is.
    Slot(String),
}

impl ParameterReference {
    pub fn local(name: &str) -> Self {
        ParameterReference::Parameter {
            handle: ParameterHandle::local(name),
            value_type: None,
        }
    }

    pub fn typed(name: &str, value_type: ValueType) -> Self {
        ParameterReference::Parameter {
            handle: ParameterHandle::local(name),
            value_type: Some(value_type),
        }
    }

    pub fn shared(container: &str, name: &str) -> Self {
        ParameterReference::Parameter {
            handle: ParameterHandle::shared(container, name),
            value_type: None,
        }
    }
}

impl fmt::Display for ParameterReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterReference::Constant(value) => write!(f, "{}", value),
            ParameterReference::Parameter { handle, .. } => write!(f, "${}", handle),
            ParameterReference::Slot(slot) => write!(f, "<{}>", slot),
        }
    }
}
