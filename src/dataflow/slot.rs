use crate::error::SlotError;
use crate::graph::{DataBranchId, NodeId};
use crate::value::{Value, ValueType, convert};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addresses one slot: the node, the index of the behaviour on that node, and
/// the slot name declared by the behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub node: NodeId,
    pub behaviour: usize,
    pub slot: String,
}

impl SlotRef {
    pub fn new(node: NodeId, behaviour: usize, slot: &str) -> Self {
        Self {
            node,
            behaviour,
            slot: slot.to_string(),
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{}", self.node, self.behaviour, self.slot)
    }
}

/// Declaration of a slot on a behaviour spec.
///
/// For inputs `value` is the constant used while the slot is unconnected; for
/// outputs it is the value held before the producer first runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDef {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default = "null_value")]
    pub value: Value,
}

fn null_value() -> Value {
    Value::Null
}

impl SlotDef {
    pub fn new(name: &str, value_type: ValueType, value: Value) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            value,
        }
    }
}

/// A persisted connection from an output slot to an input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBranch {
    pub(crate) id: DataBranchId,
    pub output: SlotRef,
    pub input: SlotRef,
}

impl DataBranch {
    pub fn id(&self) -> DataBranchId {
        self.id
    }
}

/// Runtime state of an output slot.
#[derive(Debug, Clone)]
pub struct OutputSlot {
    value_type: ValueType,
    value: Value,
    connections: usize,
}

impl OutputSlot {
    pub(crate) fn new(value_type: ValueType, initial: Value) -> Self {
        Self {
            value_type,
            value: initial,
            connections: 0,
        }
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// The last value written by the producer.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Number of input slots reading from this output.
    pub fn connections(&self) -> usize {
        self.connections
    }

    pub(crate) fn connect(&mut self) {
        self.connections += 1;
    }

    /// Stores a new value, converting it to the slot type when that is safe.
    pub fn set(&mut self, slot: &SlotRef, value: Value) -> Result<(), SlotError> {
        match convert(&value, &self.value_type) {
            Some(converted) => {
                self.value = converted;
                Ok(())
            }
            None => Err(SlotError::TypeMismatch {
                slot: slot.clone(),
                expected: self.value_type.clone(),
                found: value,
            }),
        }
    }
}

/// Runtime state of an input slot.
#[derive(Debug, Clone)]
pub struct InputSlot {
    value_type: ValueType,
    constant: Value,
    source: Option<SlotRef>,
}

impl InputSlot {
    pub(crate) fn new(value_type: ValueType, constant: Value) -> Self {
        Self {
            value_type,
            constant,
            source: None,
        }
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn constant(&self) -> &Value {
        &self.constant
    }

    pub fn source(&self) -> Option<&SlotRef> {
        self.source.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }

    pub(crate) fn set_source(&mut self, source: SlotRef) {
        self.source = Some(source);
    }

    pub(crate) fn set_constant(&mut self, constant: Value) {
        self.constant = constant;
    }
}
