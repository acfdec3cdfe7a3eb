//! Common test utilities: recording behaviours and small graph builders.
#![allow(dead_code)]
use serde::Deserialize;
use serde_json::json;
use shikumi::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared event log written by the recording behaviours.
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn push(log: &Log, entry: String) {
    log.borrow_mut().push(entry);
}

/// Removes and returns everything logged so far.
pub fn take(log: &Log) -> Vec<String> {
    log.borrow_mut().drain(..).collect()
}

pub fn count(log: &Log, entry: &str) -> usize {
    log.borrow().iter().filter(|e| *e == entry).count()
}

pub fn contains(log: &Log, entry: &str) -> bool {
    count(log, entry) > 0
}

/// Position of the first occurrence of `entry`, for ordering assertions.
pub fn position(log: &Log, entry: &str) -> Option<usize> {
    log.borrow().iter().position(|e| e == entry)
}

// --- Recording behaviours ---

/// A state behaviour that logs its hooks and can request transitions.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub name: String,
    /// Link requested from `on_begin`.
    pub on_begin: Option<String>,
    /// Link requested from `on_update`.
    pub on_update: Option<String>,
    /// Link requested from `on_late_update`.
    pub on_late: Option<String>,
    /// Request the `on_update` link only once per entry.
    pub once: bool,
    /// Log the hosting instance id on begin.
    pub track_instance: bool,
}

pub struct Probe {
    config: ProbeConfig,
    log: Log,
    fired: bool,
}

impl StateBehaviour for Probe {
    fn on_awake(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:awake", self.config.name));
    }

    fn on_begin(&mut self, ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:begin", self.config.name));
        if self.config.track_instance {
            push(&self.log, format!("{}:instance:{}", self.config.name, ctx.instance_id().raw()));
        }
        self.fired = false;
        if let Some(link) = &self.config.on_begin {
            ctx.transition(link);
        }
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:update", self.config.name));
        if let Some(link) = &self.config.on_update {
            if !(self.config.once && self.fired) {
                self.fired = true;
                ctx.transition(link);
            }
        }
    }

    fn on_fixed_update(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:fixed", self.config.name));
    }

    fn on_late_update(&mut self, ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:late", self.config.name));
        if let Some(link) = &self.config.on_late {
            ctx.transition(link);
        }
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:end", self.config.name));
    }

    fn on_trigger(&mut self, _ctx: &mut NodeContext<'_>, name: &str) {
        push(&self.log, format!("{}:trigger:{}", self.config.name, name));
    }

    fn on_graph_pause(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:pause", self.config.name));
    }

    fn on_graph_resume(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:resume", self.config.name));
    }
}

/// An action that returns a scripted sequence of statuses. The last status
/// repeats; the script restarts on every entry.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub name: String,
    pub statuses: Vec<Status>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            statuses: vec![Status::Executing],
        }
    }
}

pub struct Script {
    config: ScriptConfig,
    log: Log,
    step: usize,
}

impl ActionBehaviour for Script {
    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {
        self.step = 0;
        push(&self.log, format!("{}:start", self.config.name));
    }

    fn on_execute(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        push(&self.log, format!("{}:execute", self.config.name));
        let last = self.config.statuses.len().saturating_sub(1);
        let status = self
            .config
            .statuses
            .get(self.step.min(last))
            .copied()
            .unwrap_or(Status::Success);
        self.step += 1;
        status
    }

    fn on_fixed_update(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:fixed", self.config.name));
    }

    fn on_late_update(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:late", self.config.name));
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:end", self.config.name));
    }

    fn on_graph_pause(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:pause", self.config.name));
    }

    fn on_graph_resume(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:resume", self.config.name));
    }
}

/// A decorator whose condition is a bool parameter of the instance.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FlagGateConfig {
    pub name: String,
    pub parameter: String,
    pub abort_flags: AbortFlags,
    pub abort_sense: AbortSense,
}

impl Default for FlagGateConfig {
    fn default() -> Self {
        Self {
            name: "gate".to_string(),
            parameter: "flag".to_string(),
            abort_flags: AbortFlags::None,
            abort_sense: AbortSense::Changed,
        }
    }
}

pub struct FlagGate {
    config: FlagGateConfig,
    log: Log,
}

impl DecoratorBehaviour for FlagGate {
    fn abort_flags(&self) -> AbortFlags {
        self.config.abort_flags
    }

    fn abort_sense(&self) -> AbortSense {
        self.config.abort_sense
    }

    fn on_condition_check(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        ctx.parameters()
            .get_value(&self.config.parameter)
            .and_then(|value| bool::from_value(&value))
            .unwrap_or(false)
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:start", self.config.name));
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:end", self.config.name));
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub name: String,
}

pub struct Ticker {
    config: TickerConfig,
    log: Log,
}

impl ServiceBehaviour for Ticker {
    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:start", self.config.name));
    }

    fn on_update(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:update", self.config.name));
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        push(&self.log, format!("{}:end", self.config.name));
    }
}

/// Calculator: `out = 2 * in`.
pub struct Doubler {
    log: Log,
}

impl Calculator for Doubler {
    fn on_calculate(&mut self, ctx: &mut NodeContext<'_>) {
        push(&self.log, "doubler:calc".to_string());
        let input = ctx.input_as::<f64>("in").unwrap_or(0.0);
        ctx.set_output("out", input * 2.0);
    }
}

/// Logs the value of an input slot or a parameter on every update.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub name: String,
    pub input: Option<String>,
    pub parameter: Option<ParameterReference>,
}

pub struct Reader {
    config: ReaderConfig,
    log: Log,
}

impl StateBehaviour for Reader {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>) {
        if let Some(input) = &self.config.input {
            let value = ctx.input(input);
            push(&self.log, format!("{}:{}", self.config.name, value));
        }
        if let Some(reference) = &self.config.parameter {
            let value = ctx.get_parameter(reference).unwrap_or(Value::Null);
            push(&self.log, format!("{}:{}", self.config.name, value));
        }
    }
}

/// Increments an int parameter on every update and mirrors it to an output.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub parameter: String,
    pub output: Option<String>,
}

pub struct Counter {
    config: CounterConfig,
}

impl StateBehaviour for Counter {
    fn on_update(&mut self, ctx: &mut NodeContext<'_>) {
        let reference = ParameterReference::local(&self.config.parameter);
        let next = ctx
            .get_parameter(&reference)
            .and_then(|value| i64::from_value(&value))
            .unwrap_or(0)
            + 1;
        ctx.set_parameter(&reference, next);
        if let Some(output) = &self.config.output {
            ctx.set_output(output, next);
        }
    }
}

/// A registry with the built-ins and every recording behaviour above.
pub fn registry(log: &Log) -> BehaviourRegistry {
    let mut registry = BehaviourRegistry::with_builtins();

    let l = log.clone();
    registry.register_fn("Probe", move |spec| {
        Ok(Behaviour::state(Probe {
            config: spec.parse_config()?,
            log: l.clone(),
            fired: false,
        }))
    });
    let l = log.clone();
    registry.register_fn("Script", move |spec| {
        Ok(Behaviour::action(Script {
            config: spec.parse_config()?,
            log: l.clone(),
            step: 0,
        }))
    });
    let l = log.clone();
    registry.register_fn("FlagGate", move |spec| {
        Ok(Behaviour::decorator(FlagGate {
            config: spec.parse_config()?,
            log: l.clone(),
        }))
    });
    let l = log.clone();
    registry.register_fn("Ticker", move |spec| {
        Ok(Behaviour::service(Ticker {
            config: spec.parse_config()?,
            log: l.clone(),
        }))
    });
    let l = log.clone();
    registry.register_fn("Doubler", move |_spec| Ok(Behaviour::calculator(Doubler { log: l.clone() })));
    let l = log.clone();
    registry.register_fn("Reader", move |spec| {
        Ok(Behaviour::state(Reader {
            config: spec.parse_config()?,
            log: l.clone(),
        }))
    });
    registry.register_fn("Counter", |spec| {
        Ok(Behaviour::state(Counter {
            config: spec.parse_config()?,
        }))
    });
    registry
}

// --- Behaviour specs ---

pub fn probe(name: &str) -> BehaviourSpec {
    BehaviourSpec::new("Probe").with_config(json!({ "name": name }))
}

/// A probe with extra config fields merged in.
pub fn probe_with(name: &str, extra: serde_json::Value) -> BehaviourSpec {
    let mut config = json!({ "name": name });
    if let (Some(target), Some(fields)) = (config.as_object_mut(), extra.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    BehaviourSpec::new("Probe").with_config(config)
}

pub fn script(name: &str, statuses: &[Status]) -> BehaviourSpec {
    BehaviourSpec::new("Script").with_config(json!({ "name": name, "statuses": statuses }))
}

pub fn gate(parameter: &str, flags: AbortFlags) -> BehaviourSpec {
    BehaviourSpec::new("FlagGate").with_config(json!({
        "parameter": parameter,
        "abort_flags": flags,
    }))
}

pub fn ticker(name: &str) -> BehaviourSpec {
    BehaviourSpec::new("Ticker").with_config(json!({ "name": name }))
}

pub fn trigger_transition(trigger: &str, link: &str) -> BehaviourSpec {
    BehaviourSpec::new("TriggerTransition").with_config(json!({ "trigger": trigger, "link": link }))
}

// --- Graph builders ---

/// Adds a transient state hosting `specs`.
pub fn add_state(graph: &mut NodeGraph, name: &str, specs: Vec<BehaviourSpec>) -> NodeId {
    let id = graph.create_named(name, NodeKind::state()).unwrap();
    for spec in specs {
        graph.add_behaviour(id, spec).unwrap();
    }
    id
}

pub fn add_resident(graph: &mut NodeGraph, name: &str, specs: Vec<BehaviourSpec>) -> NodeId {
    let id = graph.create_named(name, NodeKind::resident_state()).unwrap();
    for spec in specs {
        graph.add_behaviour(id, spec).unwrap();
    }
    id
}

pub fn link(graph: &mut NodeGraph, from: NodeId, name: &str, to: Option<NodeId>, timing: TransitionTiming) {
    graph.add_link(from, StateLink::new(name, to, timing)).unwrap();
}

/// Creates a tree node under `parent` with an optional behaviour.
pub fn add_child(graph: &mut NodeGraph, parent: NodeId, name: &str, kind: NodeKind, spec: Option<BehaviourSpec>) -> NodeId {
    let id = graph.create_named(name, kind).unwrap();
    if let Some(spec) = spec {
        graph.add_behaviour(id, spec).unwrap();
    }
    graph.create_branch(parent, id).unwrap();
    id
}

/// A graph with only a behaviour tree root.
pub fn tree_graph(name: &str) -> (NodeGraph, NodeId) {
    let mut graph = NodeGraph::new(name);
    let root = graph.create_named("Root", NodeKind::Root).unwrap();
    (graph, root)
}

/// The door-like machine used across the state machine tests:
/// `Idle --Start (immediate)--> Running --Stop (late update)--> Idle`.
/// Idle switches on the `Start` trigger; Running requests `Stop` on its first update.
pub fn idle_running_graph() -> (NodeGraph, NodeId, NodeId) {
    let mut graph = NodeGraph::new("idle_running");
    let idle = add_state(&mut graph, "Idle", vec![probe("idle"), trigger_transition("Start", "Start")]);
    let running = add_state(
        &mut graph,
        "Running",
        vec![probe_with("running", json!({ "on_update": "Stop", "once": true }))],
    );
    link(&mut graph, idle, "Start", Some(running), TransitionTiming::Immediate);
    link(&mut graph, running, "Stop", Some(idle), TransitionTiming::LateUpdate);
    graph.set_start_state(idle).unwrap();
    (graph, idle, running)
}

// --- Schedulers ---

pub fn scheduler(log: &Log, assets: Vec<(&str, NodeGraph)>) -> Scheduler {
    let mut builder = Scheduler::builder().with_registry(registry(log));
    for (name, graph) in assets {
        builder = builder.with_asset(name, graph);
    }
    builder.build()
}

/// Builds a scheduler around a single asset named after the graph and spawns it.
pub fn spawn(log: &Log, graph: NodeGraph) -> (Scheduler, InstanceId) {
    let name = graph.name().to_string();
    let mut scheduler = scheduler(log, vec![(name.as_str(), graph)]);
    let id = scheduler.spawn(&name).unwrap();
    (scheduler, id)
}

pub fn instance(scheduler: &Scheduler, id: InstanceId) -> &GraphInstance {
    scheduler.instance(id).unwrap()
}
