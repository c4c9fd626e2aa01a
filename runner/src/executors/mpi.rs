use super::{
    task::{execute, ExecutionRecord, ExecutionTask},
    ExecutorError,
};
use crate::{
    compose::JobSpec,
    diagnostics::{Diagnostic, Diagnostics},
    distributed::NodeAllocation,
    options::{expand, JobOption},
};
use nix::unistd::Uid;
use std::time::Duration;
use tracing::{error, instrument};

/// lets the launcher run as root
pub const ALLOW_ROOT_FLAG: &str = "--allow-run-as-root";
pub const NSTRUCT_FLAG: &str = "-nstruct";

/// Executor handing the whole job to the MPI launcher in one go
#[derive(Debug, Clone)]
pub struct MpiExecutor<'a> {
    allocation: &'a NodeAllocation,
    timeout: Option<Duration>,
    user: Uid,
}

impl<'a> MpiExecutor<'a> {
    pub fn new(allocation: &'a NodeAllocation, timeout: Option<Duration>, user: Uid) -> Self {
        Self {
            allocation,
            timeout,
            user,
        }
    }

    /// the command handed to the launcher, without the launcher prefix
    pub fn plan(
        &self,
        command: &[String],
        inputs: &[Vec<JobOption>],
        nstruct: Option<usize>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<String> {
        let mut full = Vec::with_capacity(command.len() + 3);

        if self.user.is_root() {
            diagnostics.push(Diagnostic::RunningAsRoot);
            full.push(ALLOW_ROOT_FLAG.to_string());
        }

        full.extend_from_slice(command);

        if !inputs.is_empty() {
            diagnostics.push(Diagnostic::MpiIncompatibleInput {
                tasks: inputs.len(),
            });
            full.extend(inputs.iter().flat_map(|input| expand(input)));
        }

        if let Some(repetitions) = nstruct.filter(|repetitions| *repetitions > 0) {
            full.push(NSTRUCT_FLAG.to_string());
            full.push(repetitions.to_string());
        }

        full
    }

    /// launch once, any failure of that launch fails the whole job
    #[instrument(skip_all, fields(processes = self.allocation.processes()), level = "info")]
    pub fn execute(
        &self,
        spec: &JobSpec,
        command: &[String],
        inputs: &[Vec<JobOption>],
        nstruct: Option<usize>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ExecutionRecord>, ExecutorError> {
        let command = self.plan(command, inputs, nstruct, diagnostics);
        let base_dir = spec.runtime_base_dir();

        let (task, outcome) = self
            .allocation
            .with_scoped_host_file(&command, |launch| {
                let task = ExecutionTask::new("mpi", launch.to_vec(), &base_dir, spec.isolation());
                let outcome = execute(&task, self.timeout);

                (task, outcome)
            })
            .map_err(ExecutorError::HostFile)?;

        let outcome = outcome.map_err(|e| {
            error!("MPI launch failed: {e}");
            e
        })?;

        Ok(vec![ExecutionRecord {
            label: task.label,
            command: task.command,
            runtime_dir: task.runtime_dir,
            outcome: Ok(outcome),
        }])
    }
}
