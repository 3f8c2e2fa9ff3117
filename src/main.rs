mod actions;
mod gui;
mod layout;
mod network;
mod topology;

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use gui::app;
use topology::{DrawMode, EngineConfig};

/// Live view of a cloud project's network topology.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON snapshot file that is polled for the current topology.
    #[arg(long)]
    snapshot: PathBuf,

    /// Engine configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time between two fetches, e.g. "10s".
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Start with every network collapsed.
    #[arg(long)]
    collapsed: bool,

    #[arg(long, value_enum)]
    draw_mode: Option<DrawMode>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), "{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(interval) = args.poll_interval {
        config.poll_interval = interval;
    }
    if args.collapsed {
        config.collapse_by_default = true;
    }
    if let Some(mode) = args.draw_mode {
        config.draw_mode = mode;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => Arc::new(rt),
        Err(e) => {
            error!("failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    app::main(rt, config, args.snapshot);
    ExitCode::SUCCESS
}
