use super::TickPhase;
use crate::clock::TimeBase;
use crate::dataflow::SlotRef;
use crate::error::{ParameterError, SlotError};
use crate::graph::{NodeGraph, NodeId};
use crate::parameter::{ContainerSource, ParameterContainer, ParameterHandle, ParameterReference};
use crate::scheduler::{InstanceCore, InstanceId, Runtime};
use crate::value::{FromValue, Value, ValueType, convert};
use tracing::{error, warn};

/// Work a hook asks the engine to do once it returns.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    Transition { from: NodeId, link: String },
    Trigger { name: String },
}

fn log_parameter_error(node: NodeId, e: &ParameterError) {
    match e {
        ParameterError::TypeChanged { .. }
        | ParameterError::NullAssignment { .. }
        | ParameterError::TypeMismatch { .. } => {
            error!(node = %node, error = %e, "parameter access aborted")
        }
        _ => warn!(node = %node, error = %e, "parameter access failed"),
    }
}

/// Everything a behaviour hook can see and touch.
///
/// The context is created by the engine for the duration of one hook call. Reads
/// and writes go straight to the owning instance, so a parameter written by one
/// behaviour is visible to every behaviour that runs after it in the same pass.
pub struct NodeContext<'a> {
    node: NodeId,
    behaviour: usize,
    phase: TickPhase,
    core: &'a mut InstanceCore,
    runtime: &'a mut Runtime,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        node: NodeId,
        behaviour: usize,
        phase: TickPhase,
        core: &'a mut InstanceCore,
        runtime: &'a mut Runtime,
    ) -> Self {
        Self {
            node,
            behaviour,
            phase,
            core,
            runtime,
        }
    }

    /// The node hosting the running behaviour.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Index of the running behaviour on its node.
    pub fn behaviour_index(&self) -> usize {
        self.behaviour
    }

    pub fn instance_id(&self) -> InstanceId {
        self.core.id
    }

    /// Asset the owning instance was built from.
    pub fn asset(&self) -> Option<&str> {
        self.core.asset.as_deref()
    }

    /// Number of Update passes the instance has run.
    pub fn frame(&self) -> u64 {
        self.core.frame
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.core.graph
    }

    /// Current time on the given base.
    pub fn time(&self, base: TimeBase) -> f64 {
        self.runtime.clock().time(base)
    }

    pub fn delta_time(&self, base: TimeBase) -> f64 {
        self.runtime.clock().delta(base)
    }

    pub fn runtime(&self) -> &Runtime {
        &*self.runtime
    }

    /// The runtime, for hosts that instantiate and drive child graphs.
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut *self.runtime
    }

    // --- State machine requests ---

    /// Requests the transition along the named link of the owning state.
    /// Ignored when the behaviour is not hosted by an active state.
    pub fn transition(&mut self, link: &str) {
        self.core.requests.push_back(Request::Transition {
            from: self.node,
            link: link.to_string(),
        });
    }

    /// Sends a trigger to every behaviour on the active and resident states.
    pub fn send_trigger(&mut self, name: &str) {
        self.core.requests.push_back(Request::Trigger {
            name: name.to_string(),
        });
    }

    // --- Data flow ---

    fn slot(&self, name: &str) -> SlotRef {
        SlotRef::new(self.node, self.behaviour, name)
    }

    /// Reads an input slot of the running behaviour.
    ///
    /// A connected input returns its producer's current value, running the
    /// producer first when it is a calculator that has not run in this pass.
    pub fn try_input(&mut self, name: &str) -> Result<Value, SlotError> {
        let slot = self.slot(name);
        let (value_type, source) = {
            let input = self
                .core
                .data
                .input(&slot)
                .ok_or_else(|| SlotError::NotFound(slot.clone()))?;
            match input.source() {
                None => return Ok(input.constant().clone()),
                Some(source) => (input.value_type().clone(), source.clone()),
            }
        };

        self.pull(source.node);
        let value = self
            .core
            .data
            .output(&source)
            .ok_or_else(|| SlotError::NotFound(source.clone()))?
            .value()
            .clone();
        Ok(convert(&value, &value_type).unwrap_or(value))
    }

    /// Reads an input slot, logging and returning `Null` when it does not exist.
    pub fn input(&mut self, name: &str) -> Value {
        self.try_input(name).unwrap_or_else(|e| {
            warn!(node = %self.node, error = %e, "input read failed");
            Value::Null
        })
    }

    /// Reads an input slot converted to `T`.
    pub fn input_as<T: FromValue>(&mut self, name: &str) -> Option<T> {
        T::from_value(&self.input(name))
    }

    /// Writes an output slot of the running behaviour. Connected inputs see the
    /// value from now on.
    pub fn try_set_output(&mut self, name: &str, value: impl Into<Value>) -> Result<(), SlotError> {
        let slot = self.slot(name);
        self.core.data.set_output(&slot, value.into())
    }

    /// Writes an output slot, logging on failure.
    pub fn set_output(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.try_set_output(name, value) {
            Ok(()) => true,
            Err(e) => {
                error!(node = %self.node, error = %e, "output write aborted");
                false
            }
        }
    }

    /// Changes the constant of an unconnected input.
    pub fn set_input_constant(&mut self, name: &str, value: Value) -> Result<(), SlotError> {
        let slot = self.slot(name);
        self.core.data.set_constant(&slot, value)
    }

    fn pull(&mut self, producer: NodeId) {
        if !self.core.data.needs_calculation(producer) {
            return;
        }
        // Marked before running so that a cycle reads the cached value instead.
        self.core.data.mark_calculated(producer);
        let Some(mut calculator) = self.core.data.take_calculator(producer) else {
            return;
        };
        {
            let mut ctx = NodeContext::new(producer, 0, self.phase, &mut *self.core, &mut *self.runtime);
            calculator.on_calculate(&mut ctx);
        }
        self.core.data.restore_calculator(producer, calculator);
    }

    // --- Parameters ---

    /// The instance's own parameters.
    pub fn parameters(&self) -> &ParameterContainer {
        &self.core.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterContainer {
        &mut self.core.parameters
    }

    fn container(&self, source: &ContainerSource) -> Result<&ParameterContainer, ParameterError> {
        match source {
            ContainerSource::Local => Ok(&self.core.parameters),
            ContainerSource::Shared(name) => self
                .runtime
                .shared_parameters(name)
                .ok_or_else(|| ParameterError::ContainerNotFound(name.clone())),
        }
    }

    fn container_mut(
        &mut self,
        source: &ContainerSource,
    ) -> Result<&mut ParameterContainer, ParameterError> {
        match source {
            ContainerSource::Local => Ok(&mut self.core.parameters),
            ContainerSource::Shared(name) => self
                .runtime
                .shared_parameters_mut(name)
                .ok_or_else(|| ParameterError::ContainerNotFound(name.clone())),
        }
    }

    /// Reads the parameter a handle points at.
    pub fn read_handle(
        &self,
        handle: &ParameterHandle,
        declared: Option<&ValueType>,
    ) -> Result<Value, ParameterError> {
        self.container(&handle.container)?
            .read(handle.id, &handle.name, declared)
    }

    pub fn write_handle(
        &mut self,
        handle: &ParameterHandle,
        declared: Option<&ValueType>,
        value: Value,
    ) -> Result<(), ParameterError> {
        self.container_mut(&handle.container)?
            .write(handle.id, &handle.name, declared, value)
    }

    /// Resolves a reference to its current value.
    pub fn read_parameter(&mut self, reference: &ParameterReference) -> Result<Value, ParameterError> {
        match reference {
            ParameterReference::Constant(value) => Ok(value.clone()),
            ParameterReference::Parameter { handle, value_type } => {
                self.read_handle(handle, value_type.as_ref())
            }
            ParameterReference::Slot(name) => match self.try_input(name)? {
                Value::Parameter(handle) => self.read_handle(&handle, None),
                other => Ok(other),
            },
        }
    }

    /// Writes through a reference. Constants and plain slot values are read-only.
    pub fn write_parameter(
        &mut self,
        reference: &ParameterReference,
        value: Value,
    ) -> Result<(), ParameterError> {
        match reference {
            ParameterReference::Constant(_) => {
                Err(ParameterError::ReadOnly(reference.to_string()))
            }
            ParameterReference::Parameter { handle, value_type } => {
                self.write_handle(handle, value_type.as_ref(), value)
            }
            ParameterReference::Slot(name) => match self.try_input(name)? {
                Value::Parameter(handle) => self.write_handle(&handle, None, value),
                _ => Err(ParameterError::ReadOnly(reference.to_string())),
            },
        }
    }

    /// Reads a parameter, logging the error and returning `None` on failure.
    pub fn get_parameter(&mut self, reference: &ParameterReference) -> Option<Value> {
        match self.read_parameter(reference) {
            Ok(value) => Some(value),
            Err(e) => {
                log_parameter_error(self.node, &e);
                None
            }
        }
    }

    /// Writes a parameter, logging the error on failure. The stored value is
    /// untouched when the write is rejected.
    pub fn set_parameter(&mut self, reference: &ParameterReference, value: impl Into<Value>) -> bool {
        match self.write_parameter(reference, value.into()) {
            Ok(()) => true,
            Err(e) => {
                log_parameter_error(self.node, &e);
                false
            }
        }
    }
}
