use crate::behaviour::NodeContext;
use crate::parameter::ParameterReference;
use crate::scheduler::GraphInstance;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which way an argument's value flows between parent and child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentDirection {
    /// Parent to child.
    #[default]
    In,
    /// Child to parent, when the host exits.
    Out,
    InOut,
}

impl ArgumentDirection {
    pub fn is_input(self) -> bool {
        matches!(self, ArgumentDirection::In | ArgumentDirection::InOut)
    }

    pub fn is_output(self) -> bool {
        matches!(self, ArgumentDirection::Out | ArgumentDirection::InOut)
    }
}

/// When an input argument is copied into the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentTiming {
    /// Once, when the host enters.
    #[default]
    Enter,
    /// On entry and again before every pass of the child.
    Execute,
}

/// Binds a parameter of the child graph to a value source of the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphArgument {
    /// Name of the parameter in the child graph.
    pub parameter: String,
    /// Where the value is read from (and, for outputs, written to) in the parent.
    pub reference: ParameterReference,
    #[serde(default)]
    pub direction: ArgumentDirection,
    #[serde(default)]
    pub timing: ArgumentTiming,
}

impl GraphArgument {
    pub fn input(parameter: &str, reference: ParameterReference) -> Self {
        Self {
            parameter: parameter.to_string(),
            reference,
            direction: ArgumentDirection::In,
            timing: ArgumentTiming::Enter,
        }
    }

    pub fn output(parameter: &str, reference: ParameterReference) -> Self {
        Self {
            parameter: parameter.to_string(),
            reference,
            direction: ArgumentDirection::Out,
            timing: ArgumentTiming::Enter,
        }
    }

    pub fn with_direction(mut self, direction: ArgumentDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_timing(mut self, timing: ArgumentTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Copies the parent value into the child. Failures are logged and leave
    /// the child parameter untouched.
    pub(crate) fn copy_in(&self, ctx: &mut NodeContext<'_>, child: &mut GraphInstance) {
        let Some(value) = ctx.get_parameter(&self.reference) else {
            return;
        };
        if let Err(e) = child.parameters_mut().set_value(&self.parameter, value) {
            warn!(
                node = %ctx.node(),
                argument = %self.parameter,
                error = %e,
                "failed to pass argument to sub-graph"
            );
        }
    }

    /// Copies the child's parameter back into the parent.
    pub(crate) fn copy_out(&self, ctx: &mut NodeContext<'_>, child: &GraphInstance) {
        match child.parameters().get_value(&self.parameter) {
            Some(value) => {
                ctx.set_parameter(&self.reference, value);
            }
            None => warn!(
                node = %ctx.node(),
                argument = %self.parameter,
                "sub-graph has no such parameter"
            ),
        }
    }
}
