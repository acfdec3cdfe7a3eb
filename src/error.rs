use crate::dataflow::SlotRef;
use crate::graph::{BranchId, DataBranchId, NodeId, ParameterId};
use crate::value::{Value, ValueType};
use thiserror::Error;

/// Errors raised by the graph model when a structural edit is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node '{0}' not found in the graph")]
    NodeNotFound(NodeId),

    #[error("Branch '{0}' not found in the graph")]
    BranchNotFound(BranchId),

    #[error("Data branch '{0}' not found in the graph")]
    DataBranchNotFound(DataBranchId),

    #[error("A branch from node '{parent}' to node '{child}' is invalid: {message}")]
    InvalidBranch {
        parent: NodeId,
        child: NodeId,
        message: String,
    },

    #[error("Node '{node}' cannot host this behaviour: {message}")]
    InvalidBehaviour { node: NodeId, message: String },

    #[error("Node '{0}' is not a state")]
    NotAState(NodeId),

    #[error("State '{state}' already has a link named '{name}'")]
    DuplicateLink { state: NodeId, name: String },

    #[error("State '{state}' has no link named '{name}'")]
    LinkNotFound { state: NodeId, name: String },

    #[error("The graph already has a behaviour tree root ('{0}')")]
    DuplicateRoot(NodeId),

    #[error("No {0} ids left to allocate")]
    IdsExhausted(&'static str),

    #[error("Invalid graph data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Slot(#[from] SlotError),
}

/// Errors raised by the data-flow layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    #[error("Slot '{0}' does not exist")]
    NotFound(SlotRef),

    #[error(
        "Cannot connect output '{output}' ({output_type}) to input '{input}' ({input_type}): types are not assignable"
    )]
    IncompatibleTypes {
        output: SlotRef,
        output_type: ValueType,
        input: SlotRef,
        input_type: ValueType,
    },

    #[error("Value '{found}' cannot be stored in slot '{slot}' of type {expected}")]
    TypeMismatch {
        slot: SlotRef,
        expected: ValueType,
        found: Value,
    },
}

/// Errors raised when reading or writing parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' (id {id:?}) not found")]
    NotFound {
        id: Option<ParameterId>,
        name: String,
    },

    #[error("Parameter container '{0}' not found")]
    ContainerNotFound(String),

    #[error("A parameter named '{0}' already exists")]
    DuplicateName(String),

    #[error("Parameter type has changed for '{name}': reference expects {expected}, parameter holds {found}")]
    TypeChanged {
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("Cannot assign null to non-nullable parameter '{name}' of type {value_type}")]
    NullAssignment { name: String, value_type: ValueType },

    #[error("Value '{found}' is not convertible to {expected} for parameter '{name}'")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: Value,
    },

    #[error("Parameter reference is read-only: {0}")]
    ReadOnly(String),

    #[error("No parameter ids left to allocate")]
    IdsExhausted,

    #[error("Invalid parameter data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Slot(#[from] SlotError),
}

/// Errors raised while building behaviours from their specs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BehaviourError {
    #[error("Behaviour type '{0}' is not registered")]
    UnknownType(String),

    #[error("Invalid configuration for behaviour '{type_name}': {message}")]
    InvalidConfig { type_name: String, message: String },
}

/// Errors raised when a live graph instance cannot be created.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstanceError {
    #[error("Graph asset '{0}' is not registered")]
    AssetNotFound(String),

    #[error("Graph instance '{0}' not found")]
    InstanceNotFound(u64),

    #[error(transparent)]
    Behaviour(#[from] BehaviourError),
}

/// Errors raised when saving or loading persisted graphs.
#[derive(Error, Debug, Clone)]
pub enum ArtifactError {
    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("Deserialization failed: {0}")]
    Deserialize(String),

    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
}
