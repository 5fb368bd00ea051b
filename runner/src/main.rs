mod batch;
mod cleanup;
mod collector;
mod combine;
mod config;
mod executors;
mod planner;
mod script;
mod sweep;

#[cfg(test)]
mod combine_test;
#[cfg(test)]
mod planner_test;
#[cfg(test)]
mod test_util;

use clap::{Args, Parser, Subcommand};
use combine::CombineError;
use config::{ConfigErrors, PlannerConfig, SortOrder};
use executors::{CommandRunner, DryRunner, ProcessRunner};
use planner::{Planner, PlannerError, SubmissionReport};
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Bundle MCNP input decks into Slurm batch scripts and submit them
struct Cli {
    /// YAML config file, `./volley.yaml` is used when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity, ignored when RUST_LOG is set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy, Default)]
struct PlanOverrides {
    /// Number of input decks per batch script
    #[arg(long)]
    chunk_size: Option<NonZeroUsize>,

    /// Order input decks descending instead of ascending
    #[arg(long)]
    reverse: bool,
}

impl PlanOverrides {
    fn apply(self, config: &mut PlannerConfig) {
        if let Some(size) = self.chunk_size {
            config.artifact.chunk_size = size;
        }

        if self.reverse {
            config.discovery.order = SortOrder::Descending;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Remove stale files and write one batch script per chunk of input decks
    Plan {
        /// Directory holding the input decks, defaults to the current one
        dir: Option<PathBuf>,
        /// Submit the scripts right after writing them
        #[arg(long)]
        submit: bool,
        /// Keep files of an earlier run
        #[arg(long)]
        no_clean: bool,
        /// Log external commands instead of running them
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        overrides: PlanOverrides,
    },
    /// Hand previously written batch scripts to the scheduler
    Submit {
        dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Only remove files of an earlier run
    Clean {
        dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Copy support files into every sweep directory and plan each of them
    Sweep {
        #[arg(long)]
        submit: bool,
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        overrides: PlanOverrides,
    },
    /// Concatenate the result files of all sweep directories
    Combine {
        /// Defaults to `sweep.output` from the config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

impl Commands {
    fn dry_run(&self) -> bool {
        match self {
            Self::Plan { dry_run, .. }
            | Self::Submit { dry_run, .. }
            | Self::Clean { dry_run, .. }
            | Self::Sweep { dry_run, .. } => *dry_run,
            Self::Combine { .. } | Self::Config => false,
        }
    }

    fn overrides(&self) -> Option<PlanOverrides> {
        match self {
            Self::Plan { overrides, .. } | Self::Sweep { overrides, .. } => Some(*overrides),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Combine(#[from] CombineError),
    #[error("Unable to resolve directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to render config: {0}")]
    Render(#[from] serde_yaml::Error),
    #[error("Could not hand {0:?} to the scheduler")]
    Unsubmitted(Vec<String>),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

/// canonical form of `dir` (or the current directory), artifacts `cd` into it
fn resolve_dir(dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));

    dir.canonicalize()
        .map_err(|source| CliError::Directory { path: dir, source })
}

fn check_submissions(reports: &[SubmissionReport]) -> Result<(), CliError> {
    let rejected: usize = reports.iter().map(SubmissionReport::rejected).sum();

    if rejected > 0 {
        warn!("The scheduler rejected {rejected} batch script(s), see its output above");
    }

    let unspawned = reports
        .iter()
        .flat_map(|report| report.submissions.iter())
        .filter(|submission| submission.outcome.is_err())
        .map(|submission| submission.artifact.name.clone())
        .collect::<Vec<_>>();

    if unspawned.is_empty() {
        Ok(())
    } else {
        Err(CliError::Unsubmitted(unspawned))
    }
}

fn execute<R: CommandRunner>(
    command: Commands,
    config: PlannerConfig,
    runner: R,
) -> Result<(), CliError> {
    let mut planner = Planner::new(config, runner);

    match command {
        Commands::Plan {
            dir,
            submit,
            no_clean,
            ..
        } => {
            let dir = resolve_dir(dir)?;
            let summary = planner.plan(&dir, !no_clean)?;

            if submit {
                check_submissions(&[planner.submit(&dir)?])?;
            } else if !summary.artifacts.is_empty() {
                info!(
                    "Wrote {} batch script(s) for {} input deck(s) after removing {} stale file(s). \
                     Inspect them, then run `volley submit` to queue them",
                    summary.artifacts.len(),
                    summary.items,
                    summary.removed
                );
            }
        }
        Commands::Submit { dir, .. } => {
            let dir = resolve_dir(dir)?;
            check_submissions(&[planner.submit(&dir)?])?;
        }
        Commands::Clean { dir, .. } => {
            let dir = resolve_dir(dir)?;
            planner.cleanup(&dir)?;
        }
        Commands::Sweep { submit, .. } => {
            let root = resolve_dir(None)?;
            let report = sweep::sweep(&mut planner, &root, submit)?;
            check_submissions(&report.submissions)?;
        }
        Commands::Combine { output } => {
            let root = resolve_dir(None)?;
            let config = planner.config();
            let output = root.join(output.as_ref().unwrap_or(&config.sweep.output));

            combine::combine(&root, &config.sweep, &output)?;
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(planner.config())?);
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = PlannerConfig::load(cli.config.as_deref())?;

    if let Some(overrides) = cli.command.overrides() {
        overrides.apply(&mut config);
    }

    if !matches!(cli.command, Commands::Config) && config.preflight_checks() {
        return Err(ConfigErrors::Preflight.into());
    }

    if cli.command.dry_run() {
        execute(cli.command, config, DryRunner::new())
    } else {
        execute(cli.command, config, ProcessRunner)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");

            ExitCode::FAILURE
        }
    }
}
