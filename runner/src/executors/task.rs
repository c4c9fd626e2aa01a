use crate::distributed::util::unique_name;
use itertools::Itertools;
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, info, trace};
use wait_timeout::ChildExt;

/// combined stdout and stderr of a task, inside its runtime directory
pub const OUTPUT_LOG: &str = "output.log";

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Task has an empty command")]
    EmptyCommand,
    #[error("Failed to prepare runtime directory {path:?}: {source}")]
    RuntimeDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to wait for a child process: {0}")]
    Wait(#[source] io::Error),
    #[error("Command failed with return code {code:?}")]
    NonZeroExit { code: Option<i32>, output: String },
    #[error("Command did not finish within {timeout:?}")]
    Timeout { timeout: Duration, output: String },
}

impl ExecutionError {
    /// output captured before the task failed, if it got that far
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { output, .. } | Self::Timeout { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// One fully expanded command line with the directory it runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTask {
    pub label: String,
    pub command: Vec<String>,
    pub runtime_dir: PathBuf,
    /// run with `runtime_dir` as working directory
    pub isolated: bool,
}

impl ExecutionTask {
    pub fn new(label: impl Into<String>, command: Vec<String>, base_dir: &Path, isolated: bool) -> Self {
        let label = label.into();
        let runtime_dir = base_dir.join(unique_name(&format!("{label}-"), ""));

        Self {
            label,
            command,
            runtime_dir,
            isolated,
        }
    }
}

/// container for information extracted from running a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub runtime: Duration,
    pub status: i32,
    pub output: String,
}

/// Outcome of one task, the runtime directory is left on disk for inspection
#[derive(Debug)]
pub struct ExecutionRecord {
    pub label: String,
    pub command: Vec<String>,
    pub runtime_dir: PathBuf,
    pub outcome: Result<RunOutput, ExecutionError>,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&str> {
        match self.outcome {
            Ok(ref run) => Some(&run.output),
            Err(ref error) => error.output(),
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            Ok(ref run) => Some(run.status),
            Err(ExecutionError::NonZeroExit { code, .. }) => code,
            Err(_) => None,
        }
    }
}

fn read_log(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// launch a task and block until it exits or `timeout` passes
///
/// stdout and stderr share one log file so their interleaving is kept. Nothing is retried.
pub fn execute(task: &ExecutionTask, timeout: Option<Duration>) -> Result<RunOutput, ExecutionError> {
    let (program, args) = task
        .command
        .split_first()
        .ok_or(ExecutionError::EmptyCommand)?;

    let runtime_error = |source: io::Error| ExecutionError::RuntimeDir {
        path: task.runtime_dir.clone(),
        source,
    };

    fs::create_dir_all(&task.runtime_dir).map_err(runtime_error)?;
    let log_path = task.runtime_dir.join(OUTPUT_LOG);
    let log = File::create(&log_path).map_err(runtime_error)?;
    let log_err = log.try_clone().map_err(runtime_error)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));

    if task.isolated {
        command.current_dir(&task.runtime_dir);
    }

    info!(task = task.label, "Launching command: {}", task.command.iter().join(" "));
    let start = Instant::now();

    let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
        program: program.clone(),
        source,
    })?;

    let status = match timeout {
        Some(timeout) => match child.wait_timeout(timeout).map_err(ExecutionError::Wait)? {
            Some(status) => status,
            None => {
                // child hasn't exited yet
                debug!(task = task.label, "Killing task after {timeout:?}");
                child.kill().map_err(ExecutionError::Wait)?;
                child.wait().map_err(ExecutionError::Wait)?;

                return Err(ExecutionError::Timeout {
                    timeout,
                    output: read_log(&log_path),
                });
            }
        },
        None => child.wait().map_err(ExecutionError::Wait)?,
    };

    let runtime = start.elapsed();
    let output = read_log(&log_path);

    debug!(
        task = task.label,
        "Finished in {} ms | status: {}",
        runtime.as_millis(),
        status.success()
    );
    trace!("Output: {output}");

    if status.success() {
        Ok(RunOutput {
            runtime,
            status: status.code().unwrap_or(0),
            output,
        })
    } else {
        Err(ExecutionError::NonZeroExit {
            code: status.code(),
            output,
        })
    }
}
