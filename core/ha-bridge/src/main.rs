//! pipewire-homeassistant: reports PipeWire playback to Home Assistant.
//!
//! Runs `pw-dump -m`, tracks which audio output streams are playing, and
//! keeps a `media_player.pipewire_<host>` entity in sync.
//!
//! Exit codes: 0 after SIGINT/SIGTERM, 1 on startup failure, 2 when the
//! PipeWire producer exits underneath us (no automatic restart).

mod config;
mod homeassistant;
mod logging;
mod signals;
mod sink;

use clap::Parser;
use pw_monitor::{StreamMonitor, StreamSink};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use config::{BridgeConfig, ConfigError};
use homeassistant::HomeAssistantSink;
use sink::LogSink;

const SUPERVISE_INTERVAL_MS: u64 = 200;
const EXIT_STARTUP_FAILURE: i32 = 1;
const EXIT_PRODUCER_EXITED: i32 = 2;

#[derive(Parser)]
#[command(name = "pipewire-homeassistant")]
#[command(about = "Mirror PipeWire playback state into a Home Assistant media player")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/pipewire-homeassistant/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log stream events instead of sending them to Home Assistant
    #[arg(long)]
    dry_run: bool,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let loaded = config::load(cli.config.as_deref());

    let log_dir = cli.log_dir.clone().or_else(|| {
        loaded
            .as_ref()
            .ok()
            .and_then(|(_, config)| config.logging.dir.clone())
    });
    let logging_guard = logging::init(log_dir.as_deref());

    let exit_code = run(&cli, loaded);

    // process::exit skips destructors; flush file logs first.
    drop(logging_guard);
    if exit_code != 0 {
        process::exit(exit_code);
    }
}

fn run(cli: &Cli, loaded: Result<(PathBuf, BridgeConfig), ConfigError>) -> i32 {
    let (config_path, config) = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            return EXIT_STARTUP_FAILURE;
        }
    };
    if let Err(err) = config.validate(!cli.dry_run) {
        error!(error = %err, path = %config_path.display(), "Configuration rejected");
        return EXIT_STARTUP_FAILURE;
    }
    info!(path = %config_path.display(), dry_run = cli.dry_run, "Configuration loaded");

    let sink: Arc<dyn StreamSink> = if cli.dry_run {
        Arc::new(LogSink)
    } else {
        match HomeAssistantSink::new(&config.homeassistant) {
            Ok(sink) => {
                info!(entity_id = %sink.entity_id(), "Publishing to Home Assistant");
                Arc::new(sink)
            }
            Err(err) => {
                error!(error = %err, "Failed to set up Home Assistant client");
                return EXIT_STARTUP_FAILURE;
            }
        }
    };

    let mut monitor = StreamMonitor::new(config.monitor.monitor_config(), sink);
    signals::install();
    if let Err(err) = monitor.start() {
        error!(error = %err, "Failed to start PipeWire monitor");
        return EXIT_STARTUP_FAILURE;
    }

    let exit_code = supervise(&monitor);
    monitor.stop();
    exit_code
}

/// Blocks until a shutdown signal arrives or the monitor dies on its own.
fn supervise(monitor: &StreamMonitor) -> i32 {
    loop {
        if signals::shutdown_requested() {
            info!("Shutting down...");
            return 0;
        }
        if !monitor.is_running() {
            error!("PipeWire producer exited; shutting down");
            return EXIT_PRODUCER_EXITED;
        }
        thread::sleep(Duration::from_millis(SUPERVISE_INTERVAL_MS));
    }
}
