use super::{
    task::{execute, ExecutionRecord, ExecutionTask},
    ExecutorError,
};
use crate::{
    compose::JobSpec,
    diagnostics::{Diagnostic, Diagnostics},
    options::{expand, JobOption},
};
use rayon::{prelude::*, ThreadPoolBuilder};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

/// Executor that works on a local thread pool
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    threads: usize,
    timeout: Option<Duration>,
}

fn padded(index: usize) -> String {
    format!("{index:05}")
}

impl LocalExecutor {
    pub fn new(threads: usize, timeout: Option<Duration>) -> Self {
        Self { threads, timeout }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// expand the base command into one task per input, per repetition or a single task
    pub fn plan(
        &self,
        spec: &JobSpec,
        command: &[String],
        inputs: &[Vec<JobOption>],
        nstruct: Option<usize>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ExecutionTask> {
        let base_dir = spec.runtime_base_dir();
        let task = |label: String, command: Vec<String>| {
            ExecutionTask::new(label, command, &base_dir, spec.isolation())
        };

        // zero repetitions means none were asked for
        match nstruct.filter(|repetitions| *repetitions > 0) {
            Some(repetitions) => {
                let mut shared = command.to_vec();

                if !inputs.is_empty() {
                    diagnostics.push(Diagnostic::OverridesFlattened {
                        tasks: inputs.len(),
                    });
                    shared.extend(inputs.iter().flat_map(|input| expand(input)));
                }

                (1..=repetitions)
                    .map(|index| {
                        let index = padded(index);
                        let mut command = shared.clone();
                        command.extend([
                            "-suffix".to_string(),
                            format!("_{index}"),
                            "-no_nstruct_label".to_string(),
                            "-out:file:scorefile".to_string(),
                            format!("{}.score.{index}.sc", spec.job_id()),
                        ]);

                        task(format!("nstruct_{index}"), command)
                    })
                    .collect()
            }
            None if !inputs.is_empty() => inputs
                .iter()
                .enumerate()
                .map(|(index, input)| {
                    let mut command = command.to_vec();
                    command.extend(expand(input));

                    task(format!("input_{}", padded(index + 1)), command)
                })
                .collect(),
            None => {
                diagnostics.push(Diagnostic::SingleJobFallback);
                vec![task("single".to_string(), command.to_vec())]
            }
        }
    }

    /// execute tasks concurrently with a thread pool, records keep the task order
    #[instrument(skip_all, fields(threads = self.threads), level = "info")]
    pub fn execute(
        &self,
        spec: &JobSpec,
        command: &[String],
        inputs: &[Vec<JobOption>],
        nstruct: Option<usize>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ExecutionRecord>, ExecutorError> {
        let tasks = self.plan(spec, command, inputs, nstruct, diagnostics);

        debug!("Starting thread pool with {} threads", self.threads);
        let pool = ThreadPoolBuilder::new().num_threads(self.threads).build()?;

        // general counters to provide progress
        let total = tasks.len() as u64;
        let processed = AtomicU64::new(0);

        let records = pool.install(|| {
            tasks
                .into_par_iter()
                .map(|task| {
                    let outcome = execute(&task, self.timeout);

                    if let Err(ref e) = outcome {
                        warn!(task = task.label, "Task failed: {e}");
                    }

                    info!(
                        "Done with {}/{total}",
                        processed.fetch_add(1, Ordering::SeqCst) + 1
                    );

                    ExecutionRecord {
                        label: task.label,
                        command: task.command,
                        runtime_dir: task.runtime_dir,
                        outcome,
                    }
                })
                .collect::<Vec<_>>()
        });

        info!("Done with processing");

        Ok(records)
    }
}
