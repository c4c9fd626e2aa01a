mod local;
mod mpi;
mod task;

#[cfg(test)]
mod dispatch_test;

pub use local::LocalExecutor;
pub use mpi::{MpiExecutor, ALLOW_ROOT_FLAG, NSTRUCT_FLAG};
pub use task::{execute, ExecutionError, ExecutionRecord, ExecutionTask, RunOutput, OUTPUT_LOG};

use crate::{
    compose::{compose, JobSpec},
    config::{ConfigErrors, ExecutorConfig},
    diagnostics::{Diagnostic, Diagnostics},
    distributed::{util::current_user, NodeAllocation},
    options::JobOption,
};
use nix::unistd::Uid;
use std::io;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("Failed to write host file: {0}")]
    HostFile(#[source] io::Error),
}

/// How a job is spread over processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// one process per task on a local thread pool
    Local,
    /// a single launch through the MPI launcher
    Mpi,
}

impl Strategy {
    /// pick the strategy from the binary and the allocation alone
    pub fn select(spec: &JobSpec, allocation: Option<&NodeAllocation>) -> Result<Self, ConfigErrors> {
        let binary = spec.binary();

        match allocation {
            Some(_) if binary.supports_mpi() => Ok(Self::Mpi),
            Some(_) => Err(ConfigErrors::UnsupportedDispatch {
                binary: binary.path().to_path_buf(),
                mode: binary.mode(),
            }),
            None => Ok(Self::Local),
        }
    }
}

#[derive(Debug)]
pub enum Executors<'a> {
    Local(LocalExecutor),
    Mpi(MpiExecutor<'a>),
}

impl<'a> Executors<'a> {
    pub fn execute(
        &self,
        spec: &JobSpec,
        command: &[String],
        inputs: &[Vec<JobOption>],
        nstruct: Option<usize>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ExecutionRecord>, ExecutorError> {
        match self {
            Self::Local(executor) => executor.execute(spec, command, inputs, nstruct, diagnostics),
            Self::Mpi(executor) => executor.execute(spec, command, inputs, nstruct, diagnostics),
        }
    }
}

/// Records of one dispatch in task order, plus everything worth a warning
#[derive(Debug)]
pub struct Dispatch {
    pub records: Vec<ExecutionRecord>,
    pub diagnostics: Diagnostics,
}

impl Dispatch {
    pub fn failed(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter().filter(|record| !record.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Runs a job with the strategy its binary and allocation call for
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: ExecutorConfig,
    allocation: Option<NodeAllocation>,
    user: Uid,
}

impl Dispatcher {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            allocation: None,
            user: current_user(),
        }
    }

    pub fn with_allocation(mut self, allocation: Option<NodeAllocation>) -> Self {
        self.allocation = allocation;
        self
    }

    /// user the MPI launcher runs as, the effective user unless overridden
    pub fn with_user(mut self, user: Uid) -> Self {
        self.user = user;
        self
    }

    #[instrument(skip_all, fields(job = spec.job_id()), level = "info")]
    pub fn run(
        &self,
        spec: &JobSpec,
        inputs: &[Vec<JobOption>],
        nstruct: Option<usize>,
    ) -> Result<Dispatch, ExecutorError> {
        // decided before anything touches the disk
        let strategy = Strategy::select(spec, self.allocation.as_ref())?;
        let mut diagnostics = Diagnostics::new();
        let command = compose(spec, self.config.missing_flags, &mut diagnostics)?;

        let executor = match (strategy, self.allocation.as_ref()) {
            (Strategy::Mpi, Some(allocation)) => {
                Executors::Mpi(MpiExecutor::new(allocation, self.config.timeout(), self.user))
            }
            _ => {
                if spec.binary().supports_mpi() {
                    diagnostics.push(Diagnostic::MpiBinaryRunLocally {
                        binary: spec.binary().path().to_path_buf(),
                    });
                }

                Executors::Local(LocalExecutor::new(self.config.threads(), self.config.timeout()))
            }
        };

        info!("Dispatching with {strategy:?} strategy");
        let records = executor.execute(spec, &command, inputs, nstruct, &mut diagnostics)?;

        Ok(Dispatch {
            records,
            diagnostics,
        })
    }
}
