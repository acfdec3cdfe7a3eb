use super::FromSpec;
use crate::behaviour::{ActionBehaviour, NodeContext, Status};
use crate::clock::TimeBase;
use crate::error::BehaviourError;
use crate::graph::BehaviourSpec;
use crate::parameter::FlexibleField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub seconds: FlexibleField<f64>,
    pub time_base: TimeBase,
}

/// Executes until `seconds` have elapsed since it started, then succeeds.
#[derive(Debug, Clone, Default)]
pub struct Wait {
    config: WaitConfig,
    started_at: f64,
}

impl Wait {
    pub fn new(config: WaitConfig) -> Self {
        Self {
            config,
            started_at: 0.0,
        }
    }

    pub fn seconds(seconds: f64) -> Self {
        Self::new(WaitConfig {
            seconds: FlexibleField::Constant(seconds),
            ..Default::default()
        })
    }
}

impl ActionBehaviour for Wait {
    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {
        self.started_at = ctx.time(self.config.time_base);
    }

    fn on_execute(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let seconds = self.config.seconds.resolve_or(ctx, 0.0);
        if ctx.time(self.config.time_base) - self.started_at >= seconds {
            Status::Success
        } else {
            Status::Executing
        }
    }
}

impl FromSpec for Wait {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(Wait::new(spec.parse_config()?))
    }
}
