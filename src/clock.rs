//! Simulation time shared by every graph of a [`Runtime`](crate::scheduler::Runtime).
//!
//! Time-gated behaviours never suspend. They store a timestamp read from the
//! [`Clock`] and recompute the elapsed time on every check, against the
//! [`TimeBase`] they were configured with.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Which clock a timestamp is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Frame time multiplied by the time scale.
    #[default]
    Scaled,
    /// Frame time ignoring the time scale.
    Unscaled,
    /// Wall-clock time since the clock was created.
    Realtime,
    /// Accumulated fixed-step time.
    Fixed,
}

/// Accumulates frame and fixed-step time as the host advances it.
#[derive(Debug, Clone)]
pub struct Clock {
    scaled: f64,
    unscaled: f64,
    fixed: f64,
    delta: f64,
    fixed_delta: f64,
    time_scale: f64,
    started: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            scaled: 0.0,
            unscaled: 0.0,
            fixed: 0.0,
            delta: 0.0,
            fixed_delta: 0.0,
            time_scale: 1.0,
            started: Instant::now(),
        }
    }
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances frame time by `dt` unscaled seconds.
    pub fn advance(&mut self, dt: f64) {
        let dt = dt.max(0.0);
        self.delta = dt;
        self.unscaled += dt;
        self.scaled += dt * self.time_scale;
    }

    /// Advances fixed-step time by `dt` seconds.
    pub fn advance_fixed(&mut self, dt: f64) {
        let dt = dt.max(0.0);
        self.fixed_delta = dt;
        self.fixed += dt * self.time_scale;
    }

    /// Current time in seconds on the given base.
    pub fn time(&self, base: TimeBase) -> f64 {
        match base {
            TimeBase::Scaled => self.scaled,
            TimeBase::Unscaled => self.unscaled,
            TimeBase::Realtime => self.started.elapsed().as_secs_f64(),
            TimeBase::Fixed => self.fixed,
        }
    }

    /// Length of the last step in seconds on the given base.
    pub fn delta(&self, base: TimeBase) -> f64 {
        match base {
            TimeBase::Scaled => self.delta * self.time_scale,
            TimeBase::Unscaled | TimeBase::Realtime => self.delta,
            TimeBase::Fixed => self.fixed_delta * self.time_scale,
        }
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Sets the time scale. Negative scales are clamped to zero.
    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale.max(0.0);
    }
}

