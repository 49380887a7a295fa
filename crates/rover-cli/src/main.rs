//! `rover-cli` – Rover Supervisor entry point
//!
//! The `rover-supervisor` binary:
//!
//! 1. Installs logging (see [`rover_runtime::telemetry`]).
//! 2. Loads `~/.rover/config.toml`, writing a default template on first run,
//!    and applies `ROVER_*` environment overrides.
//! 3. Builds the event bus and the [`SupervisorLoop`] and runs it on a
//!    single-threaded Tokio runtime.
//! 4. Intercepts **Ctrl-C** to publish a kill signal and stop the loop.

mod config;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

use rover_middleware::{EventBus, Topic};
use rover_runtime::{SupervisorConfig, SupervisorLoop};
use rover_types::{Event, EventPayload, SignalKind};

const SOURCE: &str = "rover-cli";

fn main() -> ExitCode {
    let _telemetry = rover_runtime::init_tracing("rover-supervisor");

    print_banner();

    let mut cfg = load_config();
    config::apply_env_overrides(&mut cfg);

    let bus = EventBus::new(cfg.supervisor_loop.bus_capacity);
    let mut supervisor = SupervisorLoop::new(bus.clone(), cfg);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    let bus_ctrlc = bus.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – killing motion …".yellow().bold());
        let kill = Event::new(
            SOURCE,
            EventPayload::Signal {
                kind: SignalKind::Kill,
                value: true,
            },
        );
        if bus_ctrlc.publish_to(Topic::Signals, kill).is_err() {
            warn!("kill signal had no subscriber");
        }
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "  {} ticking at {:?}, Ctrl-C to stop",
        "▶".green().bold(),
        supervisor.tick_period()
    );
    runtime.block_on(supervisor.run(shutdown));

    // Drain the kill published by the Ctrl-C handler.
    let status = supervisor.cycle(Instant::now());
    info!(state = %status.state, drive_mode = ?status.drive_mode, "supervisor exited");
    println!("{}", format!("  ✓ Final state: {}", status.state).green());

    ExitCode::SUCCESS
}

/// Read the config file, falling back to defaults.
///
/// A missing file is replaced by a default template the operator can edit.
fn load_config() -> SupervisorConfig {
    match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let cfg = SupervisorConfig::default();
            match config::save(&cfg) {
                Ok(()) => info!(
                    path = %config::config_path().display(),
                    "wrote default config"
                ),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            cfg
        }
        Err(e) => {
            warn!(error = %e, "using default config");
            SupervisorConfig::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ____                        "#.bold().cyan());
    println!("{}", r#"   / __ \____ _   _____  _____  "#.bold().cyan());
    println!("{}", r#"  / /_/ / __ \ | / / _ \/ ___/  "#.bold().cyan());
    println!("{}", r#" / _, _/ /_/ / |/ /  __/ /      "#.bold().cyan());
    println!("{}", r#"/_/ |_|\____/|___/\___/_/       "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Rover Supervisor".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Stall detection and motion state control");
    println!();
}
