//! Behaviours: the logic units attached to nodes.
//!
//! A behaviour implements exactly one capability trait, chosen by the role of the
//! node that hosts it:
//!
//! | Node kind   | Capability              |
//! |-------------|-------------------------|
//! | State       | [`StateBehaviour`]      |
//! | Composite   | [`CompositeBehaviour`]  |
//! | Decorator   | [`DecoratorBehaviour`]  |
//! | Action      | [`ActionBehaviour`]     |
//! | Service     | [`ServiceBehaviour`]    |
//! | Calculator  | [`Calculator`]          |
//!
//! Every hook receives a [`NodeContext`] giving access to the behaviour's slots,
//! the parameters, the clock and the transition/trigger requests. Hooks have no
//! other way to reach the engine, so they can never mutate the active node list
//! while it is being iterated; requests are processed after the hook returns.

pub mod context;
pub mod registry;

pub use context::NodeContext;
pub use registry::{BehaviourFactory, BehaviourRegistry};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of evaluating a behaviour-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Executing,
    Success,
    Failure,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Executing => write!(f, "Executing"),
            Status::Success => write!(f, "Success"),
            Status::Failure => write!(f, "Failure"),
        }
    }
}

/// The host pass a piece of logic runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPhase {
    #[default]
    Update,
    FixedUpdate,
    LateUpdate,
}

/// Which running subtrees a decorator's re-evaluated condition may interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortFlags {
    #[default]
    None,
    /// Abort the decorator's own subtree when its condition turns false.
    #[serde(rename = "self")]
    OwnSubtree,
    /// Abort a lower-priority sibling subtree when the condition changes.
    LowerPriority,
    Both,
}

impl AbortFlags {
    pub fn aborts_self(self) -> bool {
        matches!(self, AbortFlags::OwnSubtree | AbortFlags::Both)
    }

    pub fn aborts_lower_priority(self) -> bool {
        matches!(self, AbortFlags::LowerPriority | AbortFlags::Both)
    }
}

/// Which change of a decorator's condition triggers a lower-priority abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortSense {
    #[default]
    Changed,
    BecameTrue,
    BecameFalse,
}

impl AbortSense {
    pub fn fires(self, previous: bool, current: bool) -> bool {
        match self {
            AbortSense::Changed => previous != current,
            AbortSense::BecameTrue => !previous && current,
            AbortSense::BecameFalse => previous && !current,
        }
    }
}

/// What a composite does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeStep {
    /// Enter the child at this index.
    Run(usize),
    /// Finish the composite with this status.
    Finish(Status),
}

/// Logic hosted by a state. Hooks run in the state's declared behaviour order.
#[allow(unused_variables)]
pub trait StateBehaviour {
    /// Called once, the first time the owning instance starts playing.
    fn on_awake(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_begin(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_update(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_fixed_update(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_late_update(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {}
    /// Called for every trigger sent while the state is active. Behaviours
    /// ignore the names they are not interested in.
    fn on_trigger(&mut self, ctx: &mut NodeContext<'_>, name: &str) {}
    fn on_graph_pause(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_graph_resume(&mut self, ctx: &mut NodeContext<'_>) {}
}

/// Chooses which child of a composite runs. The engine enters children one at a
/// time, in the order the composite asks for.
#[allow(unused_variables)]
pub trait CompositeBehaviour {
    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {}

    fn first_child(&mut self, ctx: &mut NodeContext<'_>, children: usize) -> CompositeStep {
        if children == 0 {
            CompositeStep::Finish(Status::Success)
        } else {
            CompositeStep::Run(0)
        }
    }

    fn next_child(
        &mut self,
        ctx: &mut NodeContext<'_>,
        finished: usize,
        status: Status,
        children: usize,
    ) -> CompositeStep;

    /// Called when an abort moves execution back to the child at `index`.
    fn on_interrupt(&mut self, ctx: &mut NodeContext<'_>, index: usize) {}
    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {}
}

/// Gates a single child with a condition.
#[allow(unused_variables)]
pub trait DecoratorBehaviour {
    fn abort_flags(&self) -> AbortFlags {
        AbortFlags::None
    }

    fn abort_sense(&self) -> AbortSense {
        AbortSense::Changed
    }

    /// Checked before the child is entered and, with abort flags, on every tick.
    fn on_condition_check(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        true
    }

    /// Called after the condition passed, before the child is entered.
    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {}

    /// Maps the child's result to the decorator's result.
    fn on_child_finished(&mut self, ctx: &mut NodeContext<'_>, status: Status) -> Status {
        status
    }

    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {}
}

/// Leaf work of a behaviour tree.
#[allow(unused_variables)]
pub trait ActionBehaviour {
    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {}
    /// Runs at most once per tick while the action is active.
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>) -> Status;
    fn on_fixed_update(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_late_update(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_graph_pause(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_graph_resume(&mut self, ctx: &mut NodeContext<'_>) {}
}

/// Side-effect logic attached to a composite or action. Never affects status.
#[allow(unused_variables)]
pub trait ServiceBehaviour {
    /// The pass in which [`on_update`](Self::on_update) runs.
    fn phase(&self) -> TickPhase {
        TickPhase::Update
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_update(&mut self, ctx: &mut NodeContext<'_>) {}
    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {}
}

/// A pure data-flow node. Runs lazily, at most once per pass, when one of its
/// outputs is read.
pub trait Calculator {
    fn on_calculate(&mut self, ctx: &mut NodeContext<'_>);
}

/// A live behaviour, tagged by capability.
pub enum Behaviour {
    State(Box<dyn StateBehaviour>),
    Composite(Box<dyn CompositeBehaviour>),
    Decorator(Box<dyn DecoratorBehaviour>),
    Action(Box<dyn ActionBehaviour>),
    Service(Box<dyn ServiceBehaviour>),
    Calculator(Box<dyn Calculator>),
}

impl Behaviour {
    pub fn state(behaviour: impl StateBehaviour + 'static) -> Self {
        Behaviour::State(Box::new(behaviour))
    }

    pub fn composite(behaviour: impl CompositeBehaviour + 'static) -> Self {
        Behaviour::Composite(Box::new(behaviour))
    }

    pub fn decorator(behaviour: impl DecoratorBehaviour + 'static) -> Self {
        Behaviour::Decorator(Box::new(behaviour))
    }

    pub fn action(behaviour: impl ActionBehaviour + 'static) -> Self {
        Behaviour::Action(Box::new(behaviour))
    }

    pub fn service(behaviour: impl ServiceBehaviour + 'static) -> Self {
        Behaviour::Service(Box::new(behaviour))
    }

    pub fn calculator(behaviour: impl Calculator + 'static) -> Self {
        Behaviour::Calculator(Box::new(behaviour))
    }

    /// Name of the capability, for diagnostics.
    pub fn role(&self) -> &'static str {
        match self {
            Behaviour::State(_) => "state",
            Behaviour::Composite(_) => "composite",
            Behaviour::Decorator(_) => "decorator",
            Behaviour::Action(_) => "action",
            Behaviour::Service(_) => "service",
            Behaviour::Calculator(_) => "calculator",
        }
    }
}

impl fmt::Debug for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Behaviour::{}", self.role())
    }
}
