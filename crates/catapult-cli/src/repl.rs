//! REPL – one-line operator commands mapped onto the [`Robot`] command
//! surface.
//!
//! Supported commands:
//!   mode <pivot|winch> <STATE>   – request a mode by tag
//!   preset <index|name>          – aim at a preset and get ready to shoot
//!   presets                      – list presets
//!   offset <degrees>             – nudge the shooting angle
//!   slack <target>               – take up or pay out winch slack
//!   fire                         – arbitrated fire request
//!   override on|off              – operator manual override
//!   rollers <output|off>         – roller set point while overriding
//!   opmode <mode>                – scheduler operating-mode notification
//!   status [json]                – subsystem snapshots
//!   loops                        – supervised loop statistics
//!   ball on|off                  – simulated ball sensor
//!   fault <driver> on|off        – simulated I/O fault injection
//!   log on|off                   – echo info-level diagnostics
//!   help | quit | exit

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use catapult_hal::sim::SimHandles;
use catapult_runtime::{LoopReport, PivotSnapshot, Robot, SupervisorHandle, WinchSnapshot};
use catapult_types::{OperatingMode, SubsystemId};
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;

/// Simulated drivers that accept fault injection.
pub const FAULT_TARGETS: [&str; 14] = [
    "pivot_motor",
    "rollers",
    "pivot_encoder",
    "upper_limit",
    "lower_limit",
    "ball_present",
    "brake",
    "lower_stage",
    "upper_stage",
    "winch_motor",
    "winch_pot",
    "winch_home",
    "latch",
    "camera",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Mode(SubsystemId, String),
    Preset(String),
    Presets,
    Offset(f64),
    Slack(f64),
    Fire,
    Override(bool),
    Rollers(Option<f64>),
    OpMode(OperatingMode),
    Status { json: bool },
    Loops,
    Ball(bool),
    Fault(String, bool),
    Log(bool),
    Help,
    Quit,
}

/// Everything a command may touch.
pub struct Session {
    pub robot: Arc<Robot>,
    pub sim: SimHandles,
    pub supervisor: SupervisorHandle,
    /// Echo info-level diagnostics to the console.
    pub verbose: Arc<AtomicBool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

fn on_off(word: Option<&str>) -> Result<bool, String> {
    match word.map(str::to_ascii_lowercase).as_deref() {
        Some("on" | "true" | "1") => Ok(true),
        Some("off" | "false" | "0") => Ok(false),
        Some(other) => Err(format!("expected on|off, got '{other}'")),
        None => Err("expected on|off".to_string()),
    }
}

fn number(word: Option<&str>, what: &str) -> Result<f64, String> {
    let word = word.ok_or_else(|| format!("missing {what}"))?;
    word.parse::<f64>()
        .map_err(|_| format!("'{word}' is not a valid {what}"))
}

/// Parse one input line. Blank lines are an error the caller skips.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let cmd = match head.to_ascii_lowercase().as_str() {
        "mode" => {
            let subsystem = words
                .next()
                .ok_or("usage: mode <pivot|winch> <STATE>")?
                .parse::<SubsystemId>()
                .map_err(|e| e.to_string())?;
            let tag = words.next().ok_or("usage: mode <pivot|winch> <STATE>")?;
            Command::Mode(subsystem, tag.to_string())
        }
        "preset" => Command::Preset(words.next().ok_or("usage: preset <index|name>")?.to_string()),
        "presets" => Command::Presets,
        "offset" => Command::Offset(number(words.next(), "angle offset")?),
        "slack" => Command::Slack(number(words.next(), "slack target")?),
        "fire" | "shoot" => Command::Fire,
        "override" => Command::Override(on_off(words.next())?),
        "rollers" => Command::Rollers(match words.next() {
            Some(w) if w.eq_ignore_ascii_case("off") => None,
            word => Some(number(word, "roller output")?),
        }),
        "opmode" => Command::OpMode(
            words
                .next()
                .ok_or("usage: opmode <auto|teleop|disabled>")?
                .parse::<OperatingMode>()
                .map_err(|e| e.to_string())?,
        ),
        "status" => Command::Status {
            json: matches!(words.next(), Some("json")),
        },
        "loops" => Command::Loops,
        "ball" => Command::Ball(on_off(words.next())?),
        "fault" => {
            let target = words.next().ok_or("usage: fault <driver> on|off")?;
            if !FAULT_TARGETS.contains(&target) {
                return Err(format!(
                    "unknown driver '{target}' (one of: {})",
                    FAULT_TARGETS.join(", ")
                ));
            }
            Command::Fault(target.to_string(), on_off(words.next())?)
        }
        "log" => Command::Log(on_off(words.next())?),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(cmd)
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(session: &Session, shutdown: Arc<AtomicBool>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to open terminal".red());
            return;
        }
    };

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let prompt = if session.robot.is_ready() {
            format!("{} ", "catapult [ready]>".bold().green())
        } else {
            format!("{} ", "catapult>".bold().cyan())
        };
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "⚠  Interrupted – halting.".yellow().bold());
                session.robot.halt();
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "Read error".red());
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match parse(line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Ok(cmd) => execute(session, cmd),
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e.yellow(),
                "help".bold()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn done() {
    println!("  {}", "✓".green());
}

fn report<E: std::fmt::Display>(result: Result<(), E>) {
    match result {
        Ok(()) => done(),
        Err(e) => println!("  {} {e}", "✗".red()),
    }
}

pub fn execute(session: &Session, cmd: Command) {
    let robot = &session.robot;
    match cmd {
        Command::Mode(subsystem, tag) => report(robot.set_mode(subsystem, &tag)),
        Command::Preset(which) => match which.parse::<usize>() {
            Ok(index) => report(robot.set_preset(index)),
            Err(_) => report(robot.set_preset_named(&which)),
        },
        Command::Presets => {
            for (i, preset) in robot.presets().iter().enumerate() {
                println!("  {i}) {:<8} {:>6.1}°", preset.name.bold(), preset.angle);
            }
        }
        Command::Offset(degrees) => report(robot.add_offset(degrees)),
        Command::Slack(target) => report(robot.set_slack_target(target)),
        Command::Fire => {
            if robot.attempt_fire() {
                println!("  {}", "🚀 fired".green().bold());
            } else {
                println!("  {}", "fire refused (see diagnostics)".yellow());
            }
        }
        Command::Override(active) => {
            robot.set_manual_override(active);
            done();
        }
        Command::Rollers(output) => {
            robot.set_roller_override(output);
            let applied = robot.is_manual_override()
                && robot.operating_mode() == OperatingMode::Teleoperated;
            if output.is_some() && !applied {
                println!(
                    "  {}",
                    "roller set point stored; applied only with override on in teleop".dimmed()
                );
            }
        }
        Command::OpMode(mode) => {
            robot.set_operating_mode(mode);
            done();
        }
        Command::Status { json } => {
            let status = Status::collect(session);
            if json {
                match serde_json::to_string_pretty(&status) {
                    Ok(text) => println!("{text}"),
                    Err(e) => println!("  {} {e}", "✗".red()),
                }
            } else {
                status.print();
            }
        }
        Command::Loops => print_loops(&session.supervisor.reports()),
        Command::Ball(present) => session.sim.ball_present.set_active(present),
        Command::Fault(target, failing) => {
            inject_fault(&session.sim, &target, failing);
            done();
        }
        Command::Log(on) => session.verbose.store(on, Ordering::Relaxed),
        Command::Help => cmd_help(),
        Command::Quit => {}
    }
}

fn inject_fault(sim: &SimHandles, target: &str, failing: bool) {
    match target {
        "pivot_motor" => sim.pivot_motor.inject_fault(failing),
        "rollers" => sim.rollers.inject_fault(failing),
        "pivot_encoder" => sim.pivot_encoder.inject_fault(failing),
        "upper_limit" => sim.upper_limit.inject_fault(failing),
        "lower_limit" => sim.lower_limit.inject_fault(failing),
        "ball_present" => sim.ball_present.inject_fault(failing),
        "brake" => sim.brake.inject_fault(failing),
        "lower_stage" => sim.lower_stage.inject_fault(failing),
        "upper_stage" => sim.upper_stage.inject_fault(failing),
        "winch_motor" => sim.winch_motor.inject_fault(failing),
        "winch_pot" => sim.winch_pot.inject_fault(failing),
        "winch_home" => sim.winch_home.inject_fault(failing),
        "latch" => sim.latch.inject_fault(failing),
        "camera" => sim.camera.inject_fault(failing),
        _ => {}
    }
}

#[derive(Serialize)]
struct Status {
    operating_mode: OperatingMode,
    manual_override: bool,
    ready: bool,
    last_command_done: bool,
    pivot: PivotSnapshot,
    winch: WinchSnapshot,
}

impl Status {
    fn collect(session: &Session) -> Self {
        let robot = &session.robot;
        Self {
            operating_mode: robot.operating_mode(),
            manual_override: robot.is_manual_override(),
            ready: robot.is_ready(),
            last_command_done: robot.is_last_command_done(),
            pivot: robot.pivot(),
            winch: robot.winch(),
        }
    }

    fn print(&self) {
        let flag = |on: bool| if on { "yes".green() } else { "no".dimmed() };
        println!("{}", "Status".bold().underline());
        println!(
            "  mode {}  override {}  ready {}  done {}",
            self.operating_mode.to_string().bold(),
            flag(self.manual_override),
            flag(self.ready),
            flag(self.last_command_done)
        );
        let p = &self.pivot;
        println!(
            "  {}  {} (wanted {})  angle {:>6.1}° → {:>5.1}°  rate {:>6.1}°/s  motor {:+.2}  rollers {:+.2}  brake {}  ball {}",
            "pivot".bold().cyan(),
            p.current.to_string().yellow(),
            p.wanted,
            p.angle,
            p.wanted_angle,
            p.rate,
            p.motor_output,
            p.roller_output,
            flag(p.brake_engaged),
            flag(p.ball_present)
        );
        let w = &self.winch;
        println!(
            "  {}  {} (wanted {})  position {:>5.2}  slack → {:.2}  motor {:+.2}  latch {}  home {}{}",
            "winch".bold().cyan(),
            w.current.to_string().yellow(),
            w.wanted,
            w.position,
            w.slack_target,
            w.motor_output,
            flag(w.latch_engaged),
            flag(w.home),
            if w.faulted { "  STALL FAULT".red().bold() } else { "".normal() }
        );
    }
}

fn print_loops(reports: &[LoopReport]) {
    println!("{}", "Supervised loops".bold().underline());
    for r in reports {
        let health = if r.frozen { "frozen".red().bold() } else { "ok".green() };
        println!(
            "  {:<8} {:>3} ms  ticks {:>8}  faults {:>4}  overruns {:>4}  {}",
            r.name.bold(),
            r.period_ms,
            r.ticks,
            r.faults,
            r.overruns,
            health
        );
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Catapult Commands".bold().underline());
    let rows = [
        ("mode <pivot|winch> <STATE>", "request a mode by tag"),
        ("preset <index|name>", "aim at a preset and get ready to shoot"),
        ("presets", "list angle presets"),
        ("offset <deg>", "nudge the shooting angle"),
        ("slack <target>", "take up or pay out winch slack"),
        ("fire", "fire if the pivot is ready (or override in teleop)"),
        ("override on|off", "operator manual override"),
        ("rollers <-1..1|off>", "roller set point while overriding"),
        ("opmode <auto|teleop|disabled>", "operating-mode notification"),
        ("status [json]", "subsystem snapshots"),
        ("loops", "supervised loop statistics"),
        ("ball on|off", "simulated ball sensor"),
        ("fault <driver> on|off", "simulated I/O fault"),
        ("log on|off", "echo info-level diagnostics"),
        ("quit  exit", "halt and exit"),
    ];
    for (cmd, what) in rows {
        println!("  {:<32} – {what}", cmd.bold().cyan());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_commands() {
        assert_eq!(
            parse("mode pivot acquiring").unwrap(),
            Command::Mode(SubsystemId::Pivot, "acquiring".to_string())
        );
        assert_eq!(
            parse("MODE shooter SET_HOME").unwrap(),
            Command::Mode(SubsystemId::Winch, "SET_HOME".to_string())
        );
        assert!(parse("mode arm SAFE_STATE").is_err());
        assert!(parse("mode pivot").is_err());
    }

    #[test]
    fn parses_numeric_arguments() {
        assert_eq!(parse("offset -2.5").unwrap(), Command::Offset(-2.5));
        assert_eq!(parse("slack 4").unwrap(), Command::Slack(4.0));
        assert_eq!(parse("rollers 0.5").unwrap(), Command::Rollers(Some(0.5)));
        assert_eq!(parse("rollers off").unwrap(), Command::Rollers(None));
        assert!(parse("offset up").is_err());
        assert!(parse("slack").is_err());
    }

    #[test]
    fn parses_switches_and_modes() {
        assert_eq!(parse("override on").unwrap(), Command::Override(true));
        assert_eq!(parse("ball OFF").unwrap(), Command::Ball(false));
        assert_eq!(
            parse("opmode teleop").unwrap(),
            Command::OpMode(OperatingMode::Teleoperated)
        );
        assert!(parse("override maybe").is_err());
        assert!(parse("opmode test").is_err());
    }

    #[test]
    fn parses_fault_targets() {
        assert_eq!(
            parse("fault winch_pot on").unwrap(),
            Command::Fault("winch_pot".to_string(), true)
        );
        assert!(parse("fault flux_capacitor on").is_err());
    }

    #[test]
    fn parses_misc_commands() {
        assert_eq!(parse("status json").unwrap(), Command::Status { json: true });
        assert_eq!(parse("status").unwrap(), Command::Status { json: false });
        assert_eq!(parse("fire").unwrap(), Command::Fire);
        assert_eq!(parse("preset far").unwrap(), Command::Preset("far".to_string()));
        assert_eq!(parse("exit").unwrap(), Command::Quit);
        assert!(parse("launch").is_err());
        assert!(parse("   ").is_err());
    }
}
