use super::{NodeId, StateLink};
use crate::dataflow::SlotDef;
use crate::error::BehaviourError;
use crate::value::{Value, ValueType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Editor position of a node. Carried for tooling, ignored at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// State-machine specific data of a [`NodeKind::State`] node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateNode {
    /// Resident states run alongside whichever transient state is active.
    pub resident: bool,
    pub(crate) links: Vec<StateLink>,
}

impl StateNode {
    pub fn links(&self) -> &[StateLink] {
        &self.links
    }

    pub fn link(&self, name: &str) -> Option<&StateLink> {
        self.links.iter().find(|link| link.name == name)
    }
}

/// The role a node plays in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    State(StateNode),
    /// Entry point of the behaviour tree. Has exactly one child.
    Root,
    Composite,
    /// Wraps exactly one child and gates it with a condition.
    Decorator,
    Action,
    /// Side-effect node attached to a composite or action; never affects status.
    Service,
    /// Pure data-flow node computing its outputs on demand.
    Calculator,
}

impl NodeKind {
    pub fn state() -> Self {
        NodeKind::State(StateNode::default())
    }

    pub fn resident_state() -> Self {
        NodeKind::State(StateNode {
            resident: true,
            links: Vec::new(),
        })
    }

    pub fn is_state(&self) -> bool {
        matches!(self, NodeKind::State(_))
    }

    pub fn is_tree_node(&self) -> bool {
        matches!(
            self,
            NodeKind::Root
                | NodeKind::Composite
                | NodeKind::Decorator
                | NodeKind::Action
                | NodeKind::Service
        )
    }

    /// Maximum number of behaviours the node can host. States host any number.
    pub fn behaviour_capacity(&self) -> Option<usize> {
        match self {
            NodeKind::State(_) => None,
            NodeKind::Root => Some(0),
            _ => Some(1),
        }
    }
}

/// Declarative description of a behaviour attached to a node.
///
/// The live behaviour object is built from this spec by the
/// [`BehaviourRegistry`](crate::behaviour::BehaviourRegistry) whenever the graph
/// is instantiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviourSpec {
    pub type_name: String,
    #[serde(default, with = "config_format")]
    pub config: serde_json::Value,
    #[serde(default)]
    pub inputs: Vec<SlotDef>,
    #[serde(default)]
    pub outputs: Vec<SlotDef>,
}

impl BehaviourSpec {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            config: serde_json::Value::Null,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_input(mut self, name: &str, value_type: ValueType) -> Self {
        let constant = value_type.default_value();
        self.inputs.push(SlotDef::new(name, value_type, constant));
        self
    }

    pub fn with_input_constant(mut self, name: &str, value_type: ValueType, constant: Value) -> Self {
        self.inputs.push(SlotDef::new(name, value_type, constant));
        self
    }

    pub fn with_output(mut self, name: &str, value_type: ValueType) -> Self {
        let initial = value_type.default_value();
        self.outputs.push(SlotDef::new(name, value_type, initial));
        self
    }

    pub fn input(&self, name: &str) -> Option<&SlotDef> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&SlotDef> {
        self.outputs.iter().find(|slot| slot.name == name)
    }

    /// Deserializes the behaviour's configuration. A missing config reads as `{}`.
    pub fn parse_config<T: DeserializeOwned>(&self) -> Result<T, BehaviourError> {
        let config = match &self.config {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(config).map_err(|e| BehaviourError::InvalidConfig {
            type_name: self.type_name.clone(),
            message: e.to_string(),
        })
    }
}

/// A single node of a [`NodeGraph`](super::NodeGraph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    pub(crate) kind: NodeKind,
    #[serde(default)]
    pub(crate) behaviours: Vec<BehaviourSpec>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn behaviours(&self) -> &[BehaviourSpec] {
        &self.behaviours
    }

    pub fn state(&self) -> Option<&StateNode> {
        match &self.kind {
            NodeKind::State(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn state_mut(&mut self) -> Option<&mut StateNode> {
        match &mut self.kind {
            NodeKind::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.state().is_some_and(|state| state.resident)
    }
}

/// Keeps behaviour configs readable in JSON while remaining encodable by
/// non-self-describing formats such as bincode.
mod config_format {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &serde_json::Value, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            value.serialize(s)
        } else {
            s.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<serde_json::Value, D::Error> {
        if d.is_human_readable() {
            serde_json::Value::deserialize(d)
        } else {
            let text = String::deserialize(d)?;
            serde_json::from_str(&text).map_err(D::Error::custom)
        }
    }
}
