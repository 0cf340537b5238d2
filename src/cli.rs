//! Operator command-line interface
//!
//! Day-to-day remediation runs headless; this CLI covers the manual
//! chores around it: inspecting and cleaning ticket locks, applying a
//! diff to a local file through the engine, and dry-run validation of
//! a patch before it is handed to a ticket.

use anyhow::{Context, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use remedy_lock::{LockManager, format_duration};
use remedy_patch::PatchEngine;
use remedy_validation::PatchValidator;
use std::time::Duration;

/// remedy - automated bug-ticket remediation
#[derive(Parser)]
#[command(name = "remedy")]
#[command(about = "Automated bug-ticket remediation with bounded retries")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect or clean ticket locks
    Locks {
        #[command(subcommand)]
        command: LocksCommand,
    },

    /// Apply a unified diff to a local file
    Apply {
        /// File to patch
        file: Utf8PathBuf,
        /// Path to the diff
        patch: Utf8PathBuf,
    },

    /// Statically validate a patch without applying it
    Validate {
        /// Repository-relative path the patch targets
        file_path: String,
        /// Path to the diff
        patch: Utf8PathBuf,
    },
}

#[derive(Subcommand)]
pub enum LocksCommand {
    /// List active ticket locks
    List,
    /// Remove stale lock artifacts
    Clean {
        /// Age beyond which an unheld lock is removed
        #[arg(long, default_value_t = 1)]
        max_age_hours: u64,
    },
}

/// Parse arguments and dispatch
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(e) = remedy_utils::logging::init_tracing(cli.verbose) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    match cli.command {
        Command::Locks { command } => run_locks(command),
        Command::Apply { file, patch } => run_apply(&file, &patch),
        Command::Validate { file_path, patch } => run_validate(&file_path, &patch),
    }
}

fn run_locks(command: LocksCommand) -> anyhow::Result<()> {
    let manager = LockManager::default();
    match command {
        LocksCommand::List => {
            let active = manager.list_active();
            if active.is_empty() {
                println!("no active locks");
                return Ok(());
            }
            for (ticket_id, stamp) in active {
                println!(
                    "{ticket_id}  pid {}  held {}",
                    stamp.pid,
                    format_duration(stamp.age())
                );
            }
        }
        LocksCommand::Clean { max_age_hours } => {
            let removed = manager.cleanup_stale(Duration::from_secs(max_age_hours * 3600));
            println!("removed {removed} stale lock(s)");
        }
    }
    Ok(())
}

fn run_apply(file: &Utf8PathBuf, patch: &Utf8PathBuf) -> anyhow::Result<()> {
    let diff = std::fs::read_to_string(patch)
        .with_context(|| format!("failed to read patch at {patch}"))?;

    let engine = PatchEngine::default();
    let applied = engine
        .apply_file(file, &diff)
        .with_context(|| format!("failed to apply patch to {file}"))?;

    if !applied.applied {
        bail!("no strategy could apply the patch to {file}");
    }
    println!(
        "{}  strategy {}  blake3 {}",
        applied.path,
        applied.strategy.as_str(),
        applied.blake3_first8
    );
    Ok(())
}

fn run_validate(file_path: &str, patch: &Utf8PathBuf) -> anyhow::Result<()> {
    let diff = std::fs::read_to_string(patch)
        .with_context(|| format!("failed to read patch at {patch}"))?;

    let report = PatchValidator::new().validate(file_path, &diff);
    if report.valid {
        println!("{file_path}: ok (confidence delta {:+})", report.confidence_delta);
        Ok(())
    } else {
        for reason in &report.reasons {
            eprintln!("{file_path}: {reason}");
        }
        bail!("patch failed validation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_locks_clean_with_age() {
        let cli = Cli::try_parse_from(["remedy", "locks", "clean", "--max-age-hours", "6"]).unwrap();
        match cli.command {
            Command::Locks {
                command: LocksCommand::Clean { max_age_hours },
            } => assert_eq!(max_age_hours, 6),
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn parses_validate() {
        let cli =
            Cli::try_parse_from(["remedy", "validate", "src/lib.rs", "/tmp/change.diff"]).unwrap();
        match cli.command {
            Command::Validate { file_path, .. } => assert_eq!(file_path, "src/lib.rs"),
            _ => panic!("wrong subcommand"),
        }
    }
}
