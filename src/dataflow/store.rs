use super::{InputSlot, OutputSlot, SlotRef};
use crate::behaviour::Calculator;
use crate::error::SlotError;
use crate::graph::{NodeGraph, NodeId};
use crate::value::Value;
use ahash::{AHashMap, AHashSet};
use tracing::warn;

/// Live slot values of one graph instance.
///
/// Outputs hold the last value their producer wrote. Inputs either follow a
/// connected output or fall back to their own constant. Calculator behaviours are
/// kept here as well, because they only ever run when one of their outputs is read.
#[derive(Default)]
pub struct DataStore {
    outputs: AHashMap<SlotRef, OutputSlot>,
    inputs: AHashMap<SlotRef, InputSlot>,
    calculators: AHashMap<NodeId, Option<Box<dyn Calculator>>>,
    calculated: AHashSet<NodeId>,
}

impl DataStore {
    /// Creates the slots declared by every behaviour of `graph` and wires its data
    /// branches. Branches whose endpoints no longer exist are skipped.
    pub fn from_graph(graph: &NodeGraph) -> Self {
        let mut store = Self::default();
        for node in graph.nodes() {
            for (index, spec) in node.behaviours().iter().enumerate() {
                for def in &spec.outputs {
                    store.outputs.insert(
                        SlotRef::new(node.id(), index, &def.name),
                        OutputSlot::new(def.value_type.clone(), def.value.clone()),
                    );
                }
                for def in &spec.inputs {
                    store.inputs.insert(
                        SlotRef::new(node.id(), index, &def.name),
                        InputSlot::new(def.value_type.clone(), def.value.clone()),
                    );
                }
            }
        }

        for branch in graph.data_branches() {
            let (Some(output), Some(input)) = (
                store.outputs.get_mut(&branch.output),
                store.inputs.get_mut(&branch.input),
            ) else {
                warn!(branch = %branch.id(), "skipping data branch with a missing endpoint");
                continue;
            };
            output.connect();
            input.set_source(branch.output.clone());
        }
        store
    }

    pub fn output(&self, slot: &SlotRef) -> Option<&OutputSlot> {
        self.outputs.get(slot)
    }

    pub fn input(&self, slot: &SlotRef) -> Option<&InputSlot> {
        self.inputs.get(slot)
    }

    pub fn set_output(&mut self, slot: &SlotRef, value: Value) -> Result<(), SlotError> {
        self.outputs
            .get_mut(slot)
            .ok_or_else(|| SlotError::NotFound(slot.clone()))?
            .set(slot, value)
    }

    pub fn set_constant(&mut self, slot: &SlotRef, value: Value) -> Result<(), SlotError> {
        let input = self
            .inputs
            .get_mut(slot)
            .ok_or_else(|| SlotError::NotFound(slot.clone()))?;
        if !value.is_instance_of(input.value_type()) {
            return Err(SlotError::TypeMismatch {
                slot: slot.clone(),
                expected: input.value_type().clone(),
                found: value,
            });
        }
        input.set_constant(value);
        Ok(())
    }

    pub(crate) fn insert_calculator(&mut self, node: NodeId, calculator: Box<dyn Calculator>) {
        self.calculators.insert(node, Some(calculator));
    }

    pub fn is_calculator(&self, node: NodeId) -> bool {
        self.calculators.contains_key(&node)
    }

    /// Whether `node` is a calculator that has not run in the current pass.
    pub(crate) fn needs_calculation(&self, node: NodeId) -> bool {
        self.is_calculator(node) && !self.calculated.contains(&node)
    }

    pub(crate) fn mark_calculated(&mut self, node: NodeId) {
        self.calculated.insert(node);
    }

    pub(crate) fn take_calculator(&mut self, node: NodeId) -> Option<Box<dyn Calculator>> {
        self.calculators.get_mut(&node).and_then(Option::take)
    }

    pub(crate) fn restore_calculator(&mut self, node: NodeId, calculator: Box<dyn Calculator>) {
        if let Some(slot) = self.calculators.get_mut(&node) {
            *slot = Some(calculator);
        }
    }

    /// Starts a new pass: every calculator may run again.
    pub(crate) fn begin_pass(&mut self) {
        self.calculated.clear();
    }
}
