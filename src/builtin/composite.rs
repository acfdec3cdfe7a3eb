use super::FromSpec;
use crate::behaviour::{CompositeBehaviour, CompositeStep, NodeContext, Status};
use crate::error::BehaviourError;
use crate::graph::BehaviourSpec;

/// Runs its children in order until one fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequencer;

impl CompositeBehaviour for Sequencer {
    fn next_child(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        finished: usize,
        status: Status,
        children: usize,
    ) -> CompositeStep {
        match status {
            Status::Success if finished + 1 < children => CompositeStep::Run(finished + 1),
            Status::Executing => CompositeStep::Run(finished),
            status => CompositeStep::Finish(status),
        }
    }
}

impl FromSpec for Sequencer {
    fn from_spec(_spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(Sequencer)
    }
}

/// Runs its children in order until one succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct Selector;

impl CompositeBehaviour for Selector {
    fn first_child(&mut self, _ctx: &mut NodeContext<'_>, children: usize) -> CompositeStep {
        if children == 0 {
            CompositeStep::Finish(Status::Failure)
        } else {
            CompositeStep::Run(0)
        }
    }

    fn next_child(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        finished: usize,
        status: Status,
        children: usize,
    ) -> CompositeStep {
        match status {
            Status::Failure if finished + 1 < children => CompositeStep::Run(finished + 1),
            Status::Executing => CompositeStep::Run(finished),
            status => CompositeStep::Finish(status),
        }
    }
}

impl FromSpec for Selector {
    fn from_spec(_spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(Selector)
    }
}
