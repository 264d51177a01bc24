//! `agerun` — demo driver and persistence CLI for the actor runtime.
//!
//! Modeled on `compiler/src/main.rs`'s `clap::Parser` + `Subcommand`
//! shape: a handful of subcommands, each delegating to a small `run_*`
//! function.

mod config;

use agerun_runtime::{persistence, Agency, Methodology, Value};
use clap::{Parser, Subcommand};
use config::RuntimeConfig;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "agerun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Actor runtime: expression/instruction interpreter with versioned methods", long_about = None)]
struct Cli {
    /// Directory containing methodology.agerun / agency.agerun
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Optional TOML file overriding persistence file names
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canonical echo/counter demo end to end and save the result
    Run,
    /// Load persisted state and print a summary
    Load,
    /// Load persisted state, then immediately re-save it
    Save,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path).unwrap_or_else(|e| {
            tracing::error!(%e, "failed to load config, using defaults");
            RuntimeConfig::default()
        }),
        None => RuntimeConfig::default(),
    };

    match cli.command {
        Commands::Run => run_demo(&cli.data_dir, &config),
        Commands::Load => run_load(&cli.data_dir, &config),
        Commands::Save => run_save(&cli.data_dir, &config),
    }
}

fn methodology_path(data_dir: &Path, config: &RuntimeConfig) -> PathBuf {
    data_dir.join(&config.methodology_file)
}

fn agency_path(data_dir: &Path, config: &RuntimeConfig) -> PathBuf {
    data_dir.join(&config.agency_file)
}

/// spec.md §6's demo entrypoint contract: create an echo method and a
/// counter method, spawn agents, send messages, process, save, shut down,
/// reload, shut down.
fn run_demo(data_dir: &Path, config: &RuntimeConfig) {
    let methodology_path = methodology_path(data_dir, config);
    let agency_path = agency_path(data_dir, config);

    let mut agency = Agency::new();
    let mut methodology = Methodology::new();

    methodology
        .register_method("echo", "send(0, message)", "1.0.0", &mut agency)
        .expect("registering echo should succeed on a fresh methodology");
    methodology
        .register_method("counter", "memory.n := memory.n + 1\nsend(0, memory.n)", "1.0.0", &mut agency)
        .expect("registering counter should succeed on a fresh methodology");

    let echo = agency.create_agent(&methodology, "echo", "1.0.0", None).expect("echo agent spawn");
    let counter = agency.create_agent(&methodology, "counter", "1.0.0", None).expect("counter agent spawn");

    agency.send(echo, Value::string("hi"));
    agency.send(counter, Value::int(0));
    agency.send(counter, Value::int(0));

    let processed = agency.process_all_messages(&mut methodology);
    info!(processed, "demo: first pass complete");

    std::fs::create_dir_all(data_dir).expect("data dir should be creatable");
    persistence::save_methodology(&methodology_path, &methodology).expect("methodology save");
    persistence::save_agency(&agency_path, &agency).expect("agency save");
    info!("demo: saved, shutting down");
    drop(agency);
    drop(methodology);

    let methodology = persistence::load_methodology(&methodology_path).expect("methodology load");
    let mut agency = persistence::load_agency(&agency_path, &methodology).expect("agency load");
    info!(
        methods = methodology.all_methods().count(),
        agents = agency.agent_count(),
        "demo: reloaded"
    );

    let mut methodology = methodology;
    agency.process_all_messages(&mut methodology);
    info!("demo: shutting down after reload");
}

fn run_load(data_dir: &Path, config: &RuntimeConfig) {
    let methodology = persistence::load_methodology(&methodology_path(data_dir, config)).expect("methodology load");
    let agency = persistence::load_agency(&agency_path(data_dir, config), &methodology).expect("agency load");
    println!("methods: {}", methodology.all_methods().count());
    println!("agents: {}", agency.agent_count());
}

fn run_save(data_dir: &Path, config: &RuntimeConfig) {
    let methodology_path = methodology_path(data_dir, config);
    let agency_path = agency_path(data_dir, config);
    let methodology = persistence::load_methodology(&methodology_path).expect("methodology load");
    let agency = persistence::load_agency(&agency_path, &methodology).expect("agency load");
    persistence::save_methodology(&methodology_path, &methodology).expect("methodology save");
    persistence::save_agency(&agency_path, &agency).expect("agency save");
    println!("saved {} method(s), {} agent(s)", methodology.all_methods().count(), agency.agent_count());
}
