use clap::{Parser, ValueEnum};
use shikumi::prelude::*;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Which host passes run on every tick.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PassesCli {
    /// Update then LateUpdate
    Frame,
    /// FixedUpdate, Update then LateUpdate
    Full,
}

/// Runs a node graph for a number of ticks and prints what it is doing
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the graph file (.json, or bincode otherwise)
    graph_path: String,

    /// Additional graph assets for sub-graph hosts, as NAME=PATH
    #[arg(short, long = "asset", value_name = "NAME=PATH")]
    assets: Vec<String>,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 60)]
    ticks: u64,

    /// Seconds advanced per tick
    #[arg(short, long, default_value_t = 1.0 / 60.0)]
    delta: f64,

    /// Time scale applied to scaled time
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,

    /// Triggers to send, as TICK:NAME (sent before that tick's Update)
    #[arg(long = "trigger", value_name = "TICK:NAME")]
    triggers: Vec<String>,

    /// The host passes to run
    #[arg(short, long, value_enum, default_value_t = PassesCli::Frame)]
    passes: PassesCli,

    /// Only print ticks where the active path changed
    #[arg(short, long)]
    changes_only: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli);
}

fn run(cli: Cli) {
    let total_start = Instant::now();

    // --- 1. Loading ---
    let graph = NodeGraph::from_file(&cli.graph_path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to load graph '{}': {}", cli.graph_path, e))
    });
    let mut builder = Scheduler::builder().with_time_scale(cli.time_scale);
    for asset in &cli.assets {
        let (name, path) = asset
            .split_once('=')
            .unwrap_or_else(|| exit_with_error(&format!("Invalid asset '{}', expected NAME=PATH", asset)));
        let asset_graph = NodeGraph::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load asset '{}': {}", path, e)));
        builder = builder.with_asset(name, asset_graph);
    }
    let triggers = parse_triggers(&cli.triggers);

    let main_asset = graph.name().to_string();
    let mut scheduler = builder.with_asset(&main_asset, graph).build();
    let id = scheduler
        .spawn(&main_asset)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to instantiate graph: {}", e)));

    println!("Running '{}' for {} ticks (dt = {})", main_asset, cli.ticks, cli.delta);

    // --- 2. Ticking ---
    let run_start = Instant::now();
    let mut last_line = String::new();
    for tick in 1..=cli.ticks {
        for (_, name) in triggers.iter().filter(|(at, _)| *at == tick) {
            if let Err(e) = scheduler.send_trigger(id, name) {
                exit_with_error(&format!("Failed to send trigger '{}': {}", name, e));
            }
        }

        if matches!(cli.passes, PassesCli::Full) {
            scheduler.execute_fixed_update(cli.delta);
        }
        scheduler.advance(cli.delta);

        let Some(instance) = scheduler.instance(id) else {
            break;
        };
        let line = TraceFormatter::format_instance(instance);
        if !cli.changes_only || line != last_line {
            println!("{:>5}  {}", tick, line);
        }
        let stopped = instance.play_state() == PlayState::Stopped;
        last_line = line;
        if stopped {
            println!("Graph stopped after {} ticks", tick);
            break;
        }
    }
    let run_duration = run_start.elapsed();

    // --- 3. Summary ---
    let pool = scheduler.runtime().pool();
    println!("\n--- Summary ---");
    println!("Simulated time:       {:.3}s", scheduler.runtime().clock().time(TimeBase::Scaled));
    println!("Sub-graphs created:   {}", pool.created());
    println!("Sub-graphs reused:    {}", pool.reused());
    println!("Tick loop:            {:?}", run_duration);
    println!("Total execution:      {:?}", total_start.elapsed());
}

fn parse_triggers(raw: &[String]) -> Vec<(u64, String)> {
    raw.iter()
        .map(|entry| {
            let (tick, name) = entry
                .split_once(':')
                .unwrap_or_else(|| exit_with_error(&format!("Invalid trigger '{}', expected TICK:NAME", entry)));
            let tick = tick
                .parse::<u64>()
                .unwrap_or_else(|_| exit_with_error(&format!("Invalid tick in trigger '{}'", entry)));
            (tick, name.to_string())
        })
        .collect()
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
