use super::{ArgumentTiming, GraphArgument};
use crate::behaviour::{ActionBehaviour, NodeContext, StateBehaviour, Status, TickPhase};
use crate::parameter::FlexibleField;
use crate::scheduler::{GraphInstance, PlayState, UpdateMode};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, warn};

/// Configuration shared by the sub-graph host behaviours.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubGraphConfig {
    /// Name of the graph asset to run.
    pub asset: FlexibleField<String>,
    /// Take the child from the runtime's pool and hand it back on exit.
    pub use_pool: bool,
    pub arguments: Vec<GraphArgument>,
    /// Link the hosting state takes once the child graph stops.
    pub finish_link: Option<String>,
}

/// Owns and drives one child graph instance on behalf of a parent node.
///
/// The child runs in [`UpdateMode::Manual`]: it is ticked only from the host's
/// hooks, in the parent's passes. Without pooling the host keeps its child
/// between entries and only builds a new one when the asset was replaced.
#[derive(Debug, Default)]
pub struct SubGraphHost {
    config: SubGraphConfig,
    child: Option<Box<GraphInstance>>,
    pooled: bool,
}

impl SubGraphHost {
    pub fn new(config: SubGraphConfig) -> Self {
        Self {
            config,
            child: None,
            pooled: false,
        }
    }

    pub fn config(&self) -> &SubGraphConfig {
        &self.config
    }

    /// The child instance, while one is held.
    pub fn child(&self) -> Option<&GraphInstance> {
        self.child.as_deref()
    }

    /// Whether the child ran to completion (or was never started).
    pub fn is_finished(&self) -> bool {
        self.child
            .as_ref()
            .is_none_or(|child| child.play_state() == PlayState::Stopped)
    }

    /// Result of the child's last completed tree run, if it has a tree.
    pub fn tree_status(&self) -> Option<Status> {
        self.child.as_ref()?.tree()?.last_status()
    }

    /// Obtains the child, passes the arguments in and starts it.
    /// Returns false when no child could be started.
    pub fn enter(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let asset = self.config.asset.resolve_or(ctx, String::new());
        let Some(graph) = ctx.runtime().asset(&asset) else {
            warn!(node = %ctx.node(), asset = %asset, "sub-graph asset not found");
            return false;
        };
        if !ctx.runtime().can_nest(ctx.asset(), &asset) {
            warn!(node = %ctx.node(), asset = %asset, "sub-graph would nest itself, not started");
            return false;
        }

        let child = if self.config.use_pool {
            if let Some(stale) = self.child.take() {
                ctx.runtime_mut().release(stale);
            }
            ctx.runtime_mut().acquire(&asset)
        } else {
            match self.child.take() {
                Some(child)
                    if child.asset() == Some(asset.as_str()) && Rc::ptr_eq(child.graph(), &graph) =>
                {
                    Ok(child)
                }
                _ => {
                    debug!(node = %ctx.node(), asset = %asset, "instantiating sub-graph");
                    ctx.runtime_mut().instantiate(&asset).map(Box::new)
                }
            }
        };
        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(node = %ctx.node(), asset = %asset, error = %e, "failed to instantiate sub-graph");
                return false;
            }
        };

        child.set_update_mode(UpdateMode::Manual);
        child.reset_parameters();
        for argument in self.config.arguments.iter().filter(|a| a.direction.is_input()) {
            argument.copy_in(ctx, &mut child);
        }
        let host = ctx.asset().map(str::to_string);
        ctx.runtime_mut()
            .nested(host.as_deref(), |runtime| child.play(runtime));
        self.pooled = self.config.use_pool;
        self.child = Some(child);
        true
    }

    /// Runs one pass of the child.
    pub fn tick(&mut self, ctx: &mut NodeContext<'_>, phase: TickPhase) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if !child.is_playing() {
            return;
        }
        if phase == TickPhase::Update {
            for argument in &self.config.arguments {
                if argument.direction.is_input() && argument.timing == ArgumentTiming::Execute {
                    argument.copy_in(ctx, child);
                }
            }
        }
        let host = ctx.asset().map(str::to_string);
        ctx.runtime_mut()
            .nested(host.as_deref(), |runtime| match phase {
                TickPhase::Update => child.execute_update(runtime),
                TickPhase::FixedUpdate => child.execute_fixed_update(runtime),
                TickPhase::LateUpdate => child.execute_late_update(runtime),
            });
    }

    /// Copies results out and stops the child. A pooled child goes back to the
    /// pool; otherwise it is kept for the next entry.
    pub fn exit(&mut self, ctx: &mut NodeContext<'_>) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        for argument in self.config.arguments.iter().filter(|a| a.direction.is_output()) {
            argument.copy_out(ctx, &child);
        }
        if self.pooled {
            ctx.runtime_mut().release(child);
        } else {
            child.stop(ctx.runtime_mut());
            self.child = Some(child);
        }
    }

    pub fn pause(&mut self, ctx: &mut NodeContext<'_>) {
        if let Some(child) = self.child.as_mut() {
            child.pause(ctx.runtime_mut());
        }
    }

    pub fn resume(&mut self, ctx: &mut NodeContext<'_>) {
        if let Some(child) = self.child.as_mut() {
            child.resume(ctx.runtime_mut());
        }
    }
}

/// Runs a child graph for as long as the hosting state is active.
#[derive(Debug, Default)]
pub struct SubGraphState {
    host: SubGraphHost,
    finished: bool,
}

impl SubGraphState {
    pub fn new(config: SubGraphConfig) -> Self {
        Self {
            host: SubGraphHost::new(config),
            finished: false,
        }
    }

    pub fn host(&self) -> &SubGraphHost {
        &self.host
    }

    fn check_finished(&mut self, ctx: &mut NodeContext<'_>) {
        if self.finished || !self.host.is_finished() {
            return;
        }
        self.finished = true;
        if let Some(link) = self.host.config().finish_link.clone() {
            ctx.transition(&link);
        }
    }
}

impl StateBehaviour for SubGraphState {
    fn on_begin(&mut self, ctx: &mut NodeContext<'_>) {
        // A child that could not start counts as finished on the first check.
        self.finished = false;
        self.host.enter(ctx);
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.tick(ctx, TickPhase::Update);
        self.check_finished(ctx);
    }

    fn on_fixed_update(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.tick(ctx, TickPhase::FixedUpdate);
    }

    fn on_late_update(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.tick(ctx, TickPhase::LateUpdate);
        self.check_finished(ctx);
    }

    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.exit(ctx);
    }

    fn on_graph_pause(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.pause(ctx);
    }

    fn on_graph_resume(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.resume(ctx);
    }
}

/// Runs a child graph as a behaviour-tree leaf.
///
/// The action executes while the child plays. Once the child stops, it
/// succeeds, unless the child's own tree finished with a failure.
#[derive(Debug, Default)]
pub struct SubGraphAction {
    host: SubGraphHost,
    started: bool,
}

impl SubGraphAction {
    pub fn new(config: SubGraphConfig) -> Self {
        Self {
            host: SubGraphHost::new(config),
            started: false,
        }
    }

    pub fn host(&self) -> &SubGraphHost {
        &self.host
    }
}

impl ActionBehaviour for SubGraphAction {
    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {
        self.started = self.host.enter(ctx);
    }

    fn on_execute(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if !self.started {
            return Status::Failure;
        }
        self.host.tick(ctx, TickPhase::Update);
        if !self.host.is_finished() {
            return Status::Executing;
        }
        self.host.tree_status().unwrap_or(Status::Success)
    }

    fn on_fixed_update(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.tick(ctx, TickPhase::FixedUpdate);
    }

    fn on_late_update(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.tick(ctx, TickPhase::LateUpdate);
    }

    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {
        self.started = false;
        self.host.exit(ctx);
    }

    fn on_graph_pause(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.pause(ctx);
    }

    fn on_graph_resume(&mut self, ctx: &mut NodeContext<'_>) {
        self.host.resume(ctx);
    }
}
