use super::NodeId;
use serde::{Deserialize, Serialize};

/// When an accepted transition is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTiming {
    /// End the old state and begin the new one as soon as the requesting hook returns.
    Immediate,
    /// Commit once the current frame's LateUpdate pass has finished.
    #[default]
    LateUpdate,
    /// Commit at the start of the next Update pass.
    NextUpdate,
}

/// Editor-only presentation of a link. Ignored at runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkDisplay {
    pub label: Option<String>,
    pub color: Option<[u8; 4]>,
}

/// A named transition out of a state.
///
/// `target == None` is a terminal link: taking it stops the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateLink {
    pub name: String,
    pub target: Option<NodeId>,
    #[serde(default)]
    pub timing: TransitionTiming,
    #[serde(default)]
    pub display: Option<LinkDisplay>,
}

impl StateLink {
    pub fn new(name: &str, target: Option<NodeId>, timing: TransitionTiming) -> Self {
        Self {
            name: name.to_string(),
            target,
            timing,
            display: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.target.is_none()
    }
}
