//! Top-level CLI definition and dispatch.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};

use snapshot_warden::core::config::Config;
use snapshot_warden::core::errors::{Result, SnwError};
use snapshot_warden::core::paths::absolutize;
use snapshot_warden::logger::jsonl::AuditLog;
use snapshot_warden::scanner::dispatch::{JobDispatcher, WorkerOutcome, WorkerStatus};
use snapshot_warden::snapshot::writer::snapshot_file_name;

/// Snapshot Warden — directory inventory snapshots with quarantine scanning.
#[derive(Debug, Parser)]
#[command(
    name = "snw",
    author,
    version,
    about = "Snapshot Warden - Directory Snapshot and Quarantine Scanner",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Snapshot target directories and quarantine suspicious files.
    Scan(ScanArgs),
    /// View and validate configuration state.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Target directories, one worker each.
    #[arg(value_name = "TARGET", num_args = 1.., required = true)]
    targets: Vec<PathBuf>,
    /// Directory snapshot files are written into (created if missing).
    #[arg(short = 'o', long, value_name = "DIR")]
    output_dir: PathBuf,
    /// Isolation directory suspicious files are moved into (must already exist).
    #[arg(short = 'q', long, value_name = "DIR")]
    quarantine_dir: PathBuf,
    /// Append every worker's segment to one shared snapshot file.
    #[arg(long)]
    shared_snapshot: bool,
    /// External verification command invoked as `CMD <file>`; non-zero exit
    /// confirms suspicion.
    #[arg(long, value_name = "CMD")]
    verifier: Option<PathBuf>,
    /// JSONL audit log path.
    #[arg(long, value_name = "PATH")]
    audit_log: Option<PathBuf>,
    /// Recursion depth ceiling.
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,
    /// Follow symbolic links (cycle-guarded).
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print the active configuration file path.
    Path,
    /// Print the effective configuration as TOML.
    Show,
    /// Check that the configuration loads and validates.
    Validate,
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<()> {
    if cli.no_color {
        control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Scan(args) => run_scan(config, args),
        Command::Config(args) => run_config(&config, args),
    }
}

fn run_scan(mut config: Config, args: &ScanArgs) -> Result<()> {
    if args.shared_snapshot {
        config.snapshot.shared = true;
    }
    if let Some(verifier) = &args.verifier {
        config.quarantine.verifier = Some(verifier.clone());
    }
    if let Some(audit_log) = &args.audit_log {
        config.audit.log_path = Some(audit_log.clone());
    }
    if let Some(max_depth) = args.max_depth {
        config.scanner.max_depth = max_depth;
    }
    if args.follow_symlinks {
        config.scanner.follow_symlinks = true;
    }
    config.validate()?;

    if args.targets.len() > config.scanner.max_targets {
        return Err(SnwError::Usage {
            details: format!(
                "at most {} target directories per run, got {}",
                config.scanner.max_targets,
                args.targets.len()
            ),
        });
    }

    let targets: Vec<PathBuf> = args.targets.iter().map(|t| absolutize(t)).collect();
    let output_dir = absolutize(&args.output_dir);
    let isolation_dir = absolutize(&args.quarantine_dir);

    // Each worker must own its target exclusively; a repeated target would
    // put two writers on the same snapshot segment.
    let mut seen: HashSet<&PathBuf> = HashSet::new();
    for target in &targets {
        if !seen.insert(target) {
            return Err(SnwError::Usage {
                details: format!("target {} given more than once", target.display()),
            });
        }
    }
    if !config.snapshot.shared {
        let mut names: HashMap<String, &PathBuf> = HashMap::new();
        for target in &targets {
            if let Some(previous) = names.insert(snapshot_file_name(target), target) {
                return Err(SnwError::Usage {
                    details: format!(
                        "targets {} and {} map to the same snapshot file name",
                        previous.display(),
                        target.display()
                    ),
                });
            }
        }
    }

    // The isolation directory is deliberately not created on the fly: moving
    // files into a mistyped path would scatter quarantined material.
    if !isolation_dir.is_dir() {
        return Err(SnwError::Usage {
            details: format!(
                "quarantine directory {} does not exist or is not a directory",
                isolation_dir.display()
            ),
        });
    }
    fs::create_dir_all(&output_dir).map_err(|e| SnwError::io(&output_dir, e))?;

    let audit = AuditLog::from_config(&config.audit);
    let dispatcher = JobDispatcher::new(config, output_dir, isolation_dir, audit);
    let report = dispatcher.run(&targets)?;

    for outcome in &report.outcomes {
        print_outcome(outcome);
    }
    if let Some(err) = &report.spawn_failure {
        println!(
            "{} fan-out stopped early: {}",
            "warning:".yellow(),
            err.code()
        );
    }

    let quarantined: usize = report.outcomes.iter().map(|o| o.quarantined).sum();
    let entries: usize = report.outcomes.iter().map(|o| o.entries).sum();
    println!(
        "{} {} worker(s), {} entries recorded, {} quarantined",
        "scan complete:".bold(),
        report.outcomes.len(),
        entries,
        quarantined
    );
    Ok(())
}

fn print_outcome(outcome: &WorkerOutcome) {
    let status = match &outcome.status {
        WorkerStatus::Completed => "done".green(),
        WorkerStatus::SnapshotFailed(code) => format!("snapshot failed [{code}]").red(),
    };
    let quarantined = if outcome.quarantined > 0 {
        outcome.quarantined.to_string().yellow()
    } else {
        outcome.quarantined.to_string().normal()
    };
    println!(
        "[{status}] {}: {} entries, {} quarantined, {} recovered failure(s) in {:.2?} -> {}",
        outcome.target.display(),
        outcome.entries,
        quarantined,
        outcome.recovered_failures,
        outcome.duration,
        outcome.snapshot_path.display()
    );
}

fn run_config(config: &Config, args: &ConfigArgs) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Path => {
            println!("{}", config.paths.config_file.display());
        }
        ConfigCommand::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigCommand::Validate => {
            // Load already validated; make the verdict explicit.
            config.validate()?;
            println!("{} configuration is valid", "ok:".green());
        }
    }
    Ok(())
}
