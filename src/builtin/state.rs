use super::FromSpec;
use crate::behaviour::{NodeContext, StateBehaviour};
use crate::clock::TimeBase;
use crate::error::BehaviourError;
use crate::graph::BehaviourSpec;
use crate::parameter::FlexibleField;
use serde::{Deserialize, Serialize};

/// Takes `link` when the trigger named `trigger` is received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerTransition {
    pub trigger: String,
    pub link: String,
}

impl TriggerTransition {
    pub fn new(trigger: &str, link: &str) -> Self {
        Self {
            trigger: trigger.to_string(),
            link: link.to_string(),
        }
    }
}

impl StateBehaviour for TriggerTransition {
    fn on_trigger(&mut self, ctx: &mut NodeContext<'_>, name: &str) {
        if name == self.trigger {
            ctx.transition(&self.link);
        }
    }
}

impl FromSpec for TriggerTransition {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        spec.parse_config()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeTransitionConfig {
    pub seconds: FlexibleField<f64>,
    pub time_base: TimeBase,
    pub link: String,
}

/// Takes `link` once the state has been active for `seconds`.
#[derive(Debug, Clone, Default)]
pub struct TimeTransition {
    config: TimeTransitionConfig,
    began_at: f64,
    fired: bool,
}

impl TimeTransition {
    pub fn new(config: TimeTransitionConfig) -> Self {
        Self {
            config,
            began_at: 0.0,
            fired: false,
        }
    }

    pub fn after(seconds: f64, link: &str) -> Self {
        Self::new(TimeTransitionConfig {
            seconds: FlexibleField::Constant(seconds),
            time_base: TimeBase::Scaled,
            link: link.to_string(),
        })
    }
}

impl StateBehaviour for TimeTransition {
    fn on_begin(&mut self, ctx: &mut NodeContext<'_>) {
        self.began_at = ctx.time(self.config.time_base);
        self.fired = false;
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) {
        if self.fired {
            return;
        }
        let seconds = self.config.seconds.resolve_or(ctx, 0.0);
        if ctx.time(self.config.time_base) - self.began_at >= seconds {
            self.fired = true;
            ctx.transition(&self.config.link);
        }
    }
}

impl FromSpec for TimeTransition {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(TimeTransition::new(spec.parse_config()?))
    }
}
