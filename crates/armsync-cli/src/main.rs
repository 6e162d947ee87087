//! `armsync-cli` – armsync command line interface
//!
//! This binary:
//!
//! 1. Loads `~/.armsync/config.toml`, writing the defaults on first run.
//! 2. Brings the joint group and the gripper to `Operational` on the
//!    in-process simulated bus.
//! 3. Optionally queues a gripper command (`grip_on`, `grip_off`,
//!    `neutral`) or a planned path read from a JSON file.
//! 4. Runs the fixed-rate control loop until **Ctrl-C**, then disables
//!    torque on every actuator.
//!
//! `armsync --schema` prints the JSON Schema of the actuator command set.

mod arm;
mod config;

use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use armsync_runtime::{ControlLoop, PlannedPath};
use armsync_types::ActuatorCommand;

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
enum Invocation {
    Run {
        grip: Option<String>,
        plan: Option<PathBuf>,
    },
    Schema,
    Help,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Invocation, String> {
    let mut grip = None;
    let mut plan = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schema" => return Ok(Invocation::Schema),
            "-h" | "--help" => return Ok(Invocation::Help),
            "--plan" => {
                let path = args.next().ok_or("--plan needs a file path")?;
                plan = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => return Err(format!("unknown flag '{other}'")),
            other => {
                if grip.replace(other.to_string()).is_some() {
                    return Err("only one gripper command may be given".to_string());
                }
            }
        }
    }
    Ok(Invocation::Run { grip, plan })
}

fn main() {
    let _guard = armsync_runtime::init_tracing("armsync");

    let invocation = match parse_args(std::env::args().skip(1)) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("{}: {}", "Usage error".red(), e);
            print_usage();
            std::process::exit(2);
        }
    };
    match invocation {
        Invocation::Help => print_usage(),
        Invocation::Schema => print_schema(),
        Invocation::Run { grip, plan } => {
            if let Err(e) = run(grip, plan) {
                error!(error = %e, "armsync stopped");
                eprintln!("{}: {}", "Error".red().bold(), e);
                std::process::exit(1);
            }
        }
    }
}

fn run(grip: Option<String>, plan: Option<PathBuf>) -> Result<(), String> {
    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&config::Config::default()) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Bring-up ──────────────────────────────────────────────────────────
    println!(
        "  Device {} @ {} baud {}",
        cfg.device_name.bold(),
        cfg.baud_rate,
        "(simulated bus)".dimmed()
    );
    let mut registry = arm::sim_registry(&cfg);
    arm::bring_up(&mut registry, &cfg).map_err(|e| format!("bring-up failed: {e}"))?;
    println!(
        "  {} joints {:?} and gripper {} operational",
        "✓".green().bold(),
        cfg.joint_ids,
        cfg.tool_id
    );

    let mut control = ControlLoop::new(registry, cfg.loop_config()).map_err(|e| e.to_string())?;

    if let Some(path) = plan {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read plan at {}: {}", path.display(), e))?;
        let plan: PlannedPath =
            serde_json::from_str(&raw).map_err(|e| format!("Failed to parse plan: {e}"))?;
        control.load_path(plan).map_err(|e| e.to_string())?;
    } else if let Some(command) = grip {
        control.command_gripper(&command).map_err(|e| e.to_string())?;
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the control loop …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the loop can only be stopped by killing the process");
    }

    println!(
        "  Control loop at {} Hz.  Press {} to stop.\n",
        cfg.iteration_frequency_hz,
        "Ctrl-C".bold()
    );
    let ticks = control.run(&shutdown);

    // ── Shutdown ──────────────────────────────────────────────────────────
    let failures = control.shutdown();
    for (name, e) in &failures {
        println!("  {} {}: {}", "✗".red().bold(), name, e);
    }
    if failures.is_empty() {
        println!("{}", "  ✓ Torque disabled on every actuator.".green());
    }
    println!("{}", format!("  ✓ Exiting after {ticks} ticks.").green());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "armsync".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Synchronized joint and gripper control");
    println!();
}

fn print_usage() {
    println!("{}", "Usage".bold().underline());
    println!("  {}                     run the control loop", "armsync".bold());
    println!("  {} {}", "armsync".bold(), "grip_on|grip_off|neutral   move the gripper, then hold");
    println!("  {} {}", "armsync".bold(), "--plan <path.json>         play back a planned path");
    println!("  {} {}", "armsync".bold(), "--schema                   print the command JSON Schema");
}

fn print_schema() {
    let schema = schemars::schema_for!(ActuatorCommand);
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("{}: {}", "Schema error".red(), e),
    }
}
