use super::FromSpec;
use crate::behaviour::{AbortFlags, AbortSense, DecoratorBehaviour, NodeContext};
use crate::clock::TimeBase;
use crate::error::BehaviourError;
use crate::graph::BehaviourSpec;
use crate::parameter::FlexibleField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub seconds: FlexibleField<f64>,
    pub time_base: TimeBase,
    pub abort_flags: AbortFlags,
    pub abort_sense: AbortSense,
}

/// Blocks its child for `seconds` after the child's subtree last exited.
///
/// The exit time is stored when the decorator ends, and the gate recomputes the
/// elapsed time on every check.
#[derive(Debug, Clone, Default)]
pub struct Cooldown {
    config: CooldownConfig,
    ended_at: Option<f64>,
}

impl Cooldown {
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            config,
            ended_at: None,
        }
    }

    pub fn seconds(seconds: f64) -> Self {
        Self::new(CooldownConfig {
            seconds: FlexibleField::Constant(seconds),
            ..Default::default()
        })
    }
}

impl DecoratorBehaviour for Cooldown {
    fn abort_flags(&self) -> AbortFlags {
        self.config.abort_flags
    }

    fn abort_sense(&self) -> AbortSense {
        self.config.abort_sense
    }

    fn on_condition_check(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let Some(ended_at) = self.ended_at else {
            return true;
        };
        let seconds = self.config.seconds.resolve_or(ctx, 0.0);
        ctx.time(self.config.time_base) - ended_at >= seconds
    }

    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {
        self.ended_at = Some(ctx.time(self.config.time_base));
    }
}

impl FromSpec for Cooldown {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(Cooldown::new(spec.parse_config()?))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeLimitConfig {
    pub seconds: FlexibleField<f64>,
    pub time_base: TimeBase,
}

/// Fails its child's subtree once it has run for `seconds`.
#[derive(Debug, Clone, Default)]
pub struct TimeLimit {
    config: TimeLimitConfig,
    started_at: Option<f64>,
}

impl TimeLimit {
    pub fn new(config: TimeLimitConfig) -> Self {
        Self {
            config,
            started_at: None,
        }
    }

    pub fn seconds(seconds: f64) -> Self {
        Self::new(TimeLimitConfig {
            seconds: FlexibleField::Constant(seconds),
            ..Default::default()
        })
    }
}

impl DecoratorBehaviour for TimeLimit {
    fn abort_flags(&self) -> AbortFlags {
        AbortFlags::OwnSubtree
    }

    fn on_condition_check(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let Some(started_at) = self.started_at else {
            return true;
        };
        let seconds = self.config.seconds.resolve_or(ctx, 0.0);
        ctx.time(self.config.time_base) - started_at < seconds
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {
        self.started_at = Some(ctx.time(self.config.time_base));
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        self.started_at = None;
    }
}

impl FromSpec for TimeLimit {
    fn from_spec(spec: &BehaviourSpec) -> Result<Self, BehaviourError> {
        Ok(TimeLimit::new(spec.parse_config()?))
    }
}
