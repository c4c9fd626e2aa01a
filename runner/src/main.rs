use clap::{Parser, Subcommand};
use decoy_analysis::{top, RankedEntry};
use decoy_ingest::ScoreTable;
use decoy_runner::{
    compose::compose,
    config::{ConfigErrors, RunnerConfig},
    diagnostics::Diagnostics,
    executors::Dispatcher,
    RunnerError,
};
use itertools::Itertools;
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "decoy-runner", version, about = "Compose, dispatch and rank decoy generation jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the base command of a job
    Compose { config: PathBuf },
    /// Run a job and summarize every task
    Run {
        config: PathBuf,
        /// rank this many decoys from the score directory afterwards
        #[arg(long)]
        top: Option<usize>,
    },
    /// Print the best decoys of a score file or directory as YAML
    Rank {
        path: PathBuf,
        #[arg(long, default_value_t = 1)]
        top: usize,
        /// column to rank by, `total_score` if unset
        #[arg(long)]
        term: Option<String>,
    },
}

fn load_config(path: &Path) -> Result<RunnerConfig, RunnerError> {
    let config = RunnerConfig::load(path)?;

    if config.preflight_checks() {
        return Err(ConfigErrors::PreflightFailed.into());
    }

    Ok(config)
}

fn print_ranking(entries: &[RankedEntry]) -> Result<(), RunnerError> {
    print!("{}", serde_yaml::to_string(entries)?);

    Ok(())
}

fn compose_command(path: &Path) -> Result<bool, RunnerError> {
    let config = load_config(path)?;
    let command = compose(
        &config.job_spec()?,
        config.executor.missing_flags,
        &mut Diagnostics::new(),
    )?;

    println!("{}", command.iter().join(" "));

    Ok(true)
}

fn run(path: &Path, rank: Option<usize>) -> Result<bool, RunnerError> {
    let config = load_config(path)?;
    let spec = config.job_spec()?;
    let inputs = config.task_inputs()?;

    let mut diagnostics = Diagnostics::new();
    let allocation = config.allocation(&mut diagnostics)?;

    let dispatch = Dispatcher::new(config.executor.clone())
        .with_allocation(allocation)
        .run(&spec, &inputs, config.nstruct)?;

    for record in &dispatch.records {
        match record.outcome {
            Ok(ref output) => info!(
                task = record.label,
                "Finished in {} ms, runtime dir {}",
                output.runtime.as_millis(),
                record.runtime_dir.to_string_lossy()
            ),
            Err(ref e) => error!(
                task = record.label,
                "{e}, see {}",
                record.runtime_dir.to_string_lossy()
            ),
        }
    }

    info!(
        "{} of {} tasks succeeded with {} warnings",
        dispatch.records.len() - dispatch.failed().count(),
        dispatch.records.len(),
        diagnostics.len() + dispatch.diagnostics.len()
    );

    if let Some(rank) = rank {
        if spec.output_dir().is_some() {
            let table = ScoreTable::load(spec.score_dir()?)?;
            print_ranking(&top(&table, rank, None)?)?;
        } else {
            warn!("job.output is not set, there are no score files to rank");
        }
    }

    Ok(dispatch.is_success())
}

fn rank(path: &Path, rank: usize, term: Option<&str>) -> Result<bool, RunnerError> {
    let table = ScoreTable::load(path)?;
    print_ranking(&top(&table, rank, term)?)?;

    Ok(true)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Compose { ref config } => compose_command(config),
        Command::Run { ref config, top } => run(config, top),
        Command::Rank {
            ref path,
            top,
            ref term,
        } => rank(path, top, term.as_deref()),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
