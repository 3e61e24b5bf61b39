//! `catapult` – interactive simulated catapult.
//!
//! 1. Loads `~/.catapult/config.toml` (writing the defaults on first run).
//! 2. Builds a simulated rig and the [`Robot`] control core, then runs both
//!    subsystem loops plus a toy plant under the [`Supervisor`].
//! 3. Prints diagnostics in the background and drops the operator into a
//!    command shell.
//! 4. Intercepts **Ctrl-C** to put the pivot in OFF_STATE and the winch in
//!    STANDBY before exiting.
//!
//! [`Supervisor`]: catapult_runtime::Supervisor

mod config;
mod repl;
mod sim_plant;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use catapult_hal::sim::SimRig;
use catapult_runtime::{Robot, init_tracing};
use catapult_types::{DiagnosticEvent, DiagnosticLevel};
use colored::Colorize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::repl::Session;
use crate::sim_plant::SimPlant;

/// Tick period of the simulated plant; faster than either subsystem.
const PLANT_PERIOD: Duration = Duration::from_millis(5);

fn main() {
    let cfg = load_config();
    let guard = init_tracing("catapult", &cfg.logging);

    print_banner();
    if guard.is_exporting() {
        println!("  {} OTLP span export enabled\n", "✓".green().bold());
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to start the async runtime".red());
            std::process::exit(1);
        }
    };
    let enter = runtime.enter();

    // ── Control core ──────────────────────────────────────────────────────
    let (pivot_hw, winch_hw, sim) = SimRig::build(&cfg.hardware);
    let robot = Arc::new(Robot::new(cfg.robot(), pivot_hw, winch_hw));

    let verbose = Arc::new(AtomicBool::new(false));
    runtime.spawn(print_diagnostics(
        robot.diagnostics().subscribe(),
        verbose.clone(),
    ));

    let mut supervisor = robot.supervisor();
    robot.register(&mut supervisor);
    supervisor.register("plant", PLANT_PERIOD, SimPlant::new(sim.clone()));
    let handle = supervisor.spawn();
    info!(loops = handle.reports().len(), "control loops running");

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let robot_ctrlc = robot.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – halting …".yellow().bold());
        robot_ctrlc.halt();
        println!("{}", "  ✓ pivot OFF_STATE, winch STANDBY.".green());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will not halt the mechanisms");
    }

    println!(
        "  Type {} for a list of commands.\n",
        "help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    let session = Session {
        robot: robot.clone(),
        sim,
        supervisor: handle,
        verbose,
    };
    repl::run(&session, shutdown);

    // The worker threads keep ticking; give the loops time to apply the halt.
    robot.halt();
    std::thread::sleep(Duration::from_millis(50));
    println!("{}", "  ✓ Exiting.".green());
    drop(enter);
    runtime.shutdown_timeout(Duration::from_millis(200));
    drop(guard);
}

fn load_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {e}", "Error saving config".red()),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostic printer
// ─────────────────────────────────────────────────────────────────────────────

async fn print_diagnostics(mut rx: broadcast::Receiver<DiagnosticEvent>, verbose: Arc<AtomicBool>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let line = event.line();
                match event.level {
                    DiagnosticLevel::Error => println!("{}", line.red()),
                    DiagnosticLevel::Warn => println!("{}", line.yellow()),
                    DiagnosticLevel::Info if verbose.load(Ordering::Relaxed) => {
                        println!("{}", line.dimmed())
                    }
                    DiagnosticLevel::Info => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                println!("{}", format!("… {skipped} diagnostic line(s) dropped").dimmed());
            }
            Err(RecvError::Closed) => break,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ______      __                    ____ "#.bold().cyan());
    println!("{}", r#"  / ____/___ _/ /_____ _____  __  __/ / /_"#.bold().cyan());
    println!("{}", r#" / /   / __ `/ __/ __ `/ __ \/ / / / / __/"#.bold().cyan());
    println!("{}", r#"/ /___/ /_/ / /_/ /_/ / /_/ / /_/ / / /_  "#.bold().cyan());
    println!("{}", r#"\____/\__,_/\__/\__,_/ .___/\__,_/_/\__/  "#.bold().cyan());
    println!("{}", r#"                    /_/                   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Catapult".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Pivot & winch control core (simulated rig)");
    println!();
}
