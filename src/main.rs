//! Chiller controller entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SensorHub     RelayBank      LogEventSink   FileStore         │
//! │  (SensorPort)  (ActuatorPort) (EventSink)    (StoragePort)     │
//! │  MonotonicClock               console thread (remote link)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  Lockout · Demand · Safety · Decision                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  runtime: sensing · control · telemetry loops                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use chiller::adapters::console;
use chiller::adapters::files::{FileStore, JsonConfigFile};
use chiller::adapters::hardware::RelayBank;
use chiller::adapters::log_sink::LogEventSink;
use chiller::adapters::time::MonotonicClock;
use chiller::app::ports::{Clock, ConfigPort};
use chiller::app::service::Controller;
use chiller::config::SystemConfig;
use chiller::error::Error;
use chiller::runtime::{self, LoopPeriods, Shutdown};
use chiller::sensors::SensorHub;

/// Closed-loop controller for a chilled-water pump and condensing unit.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = "/etc/chiller/config.json")]
    config: PathBuf,

    /// Directory for persisted records (overrides the config file)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Drive in-memory relays instead of GPIO
    #[arg(long)]
    simulate: bool,
}

fn load_config(path: &std::path::Path) -> SystemConfig {
    match JsonConfigFile::new(path).load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config {}: {}, using defaults", path.display(), e);
            SystemConfig::default()
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging level depends on the config, so peek at it before the logger
    // exists; the real load below reports any problem.
    let debug_logging = std::fs::read(&cli.config)
        .ok()
        .and_then(|b| serde_json::from_slice::<SystemConfig>(&b).ok())
        .is_some_and(|c| c.debug_logging);
    init_logging(debug_logging);

    info!("Chiller controller v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&cli.config);
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    if cli.simulate {
        config.relays.simulate = true;
    }

    let clock = MonotonicClock::new();
    let storage = FileStore::new(&config.state_dir);
    let controller = Arc::new(Controller::new(&config, storage, clock.now()));

    let sensors = SensorHub::from_config(&config);
    let relays = RelayBank::from_config(&config.relays)
        .map_err(Error::from)
        .context("relay setup failed")?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Termination signal received");
            shutdown.trigger();
        })
        .context("installing signal handler")?;
    }

    // The console blocks on stdin; it is left detached and dies with the
    // process once the runtime returns.
    {
        let controller = Arc::clone(&controller);
        let shutdown = shutdown.clone();
        std::thread::Builder::new()
            .name("console".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                console::serve_lines(&*controller, &clock, stdin.lock(), &shutdown);
            })
            .context("spawning console thread")?;
    }

    runtime::run(
        &*controller,
        LoopPeriods::from_config(&config),
        sensors,
        relays,
        LogEventSink::new(),
        clock,
        &shutdown,
    );

    info!("Chiller controller exited cleanly");
    Ok(())
}
