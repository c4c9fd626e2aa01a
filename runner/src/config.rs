use crate::{
    binary::{BinaryDescriptor, BinaryResolver, DirectoryResolver, ExecutionMode},
    compose::{JobSpec, MissingFlagPolicy},
    diagnostics::Diagnostics,
    distributed::{NodeAllocation, DEFAULT_LAUNCHER},
    options::{JobOption, OptionError},
    RunnerError,
};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{error, warn};

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("File {0:?} not found")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("Failed to read config {path:?}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("Failed to parse config: {0}")]
    ParseConfig(#[from] serde_yaml::Error),
    #[error("Config failed preflight checks")]
    PreflightFailed,
    #[error(transparent)]
    InvalidOption(#[from] OptionError),
    #[error("Option value for {0} must be a string, number or bool")]
    InvalidOptionValue(String),
    #[error("Output directory not set")]
    OutputDirUnset,
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("Flag file {0:?} not found")]
    MissingFlagFile(PathBuf),
    #[error("MPI nodes are given yet {binary:?} is a {mode} build without MPI support")]
    UnsupportedDispatch { binary: PathBuf, mode: ExecutionMode },
    #[error("A node allocation needs at least one process")]
    EmptyAllocation,
    #[error("Slot counts of the node allocation overflow")]
    SlotOverflow,
    #[error("Exactly one of nodes.local, nodes.hosts and nodes.slurm must be set")]
    AmbiguousNodes,
    #[error("Binary needs either binary.path or binary.name")]
    MissingBinary,
}

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Environment variable {0} not set")]
    MissingVariable(String),
    #[error("Environment variable {variable} has invalid value {value:?}")]
    InvalidVariable { variable: String, value: String },
    #[error("Failed to get node list: {0}")]
    ClusterQuery(String),
    #[error("Binary {0} not found")]
    BinaryNotFound(String),
    #[error("Binary name {name} is not a valid pattern: {source}")]
    InvalidBinaryName {
        name: String,
        #[source]
        source: globset::Error,
    },
    #[error("File name of {0:?} does not follow <app>[.<mode>].<os><compiler><build>")]
    UnrecognizedBinaryName(PathBuf),
    #[error("Failed to resolve current directory: {0}")]
    CurrentDir(#[source] Error),
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
    pub binary: BinaryConfig,
    pub job: JobConfig,
    // per task overrides, one mapping of option -> value per task
    #[serde(default)]
    pub tasks: Vec<Mapping>,
    // number of repetitions of the job
    pub nstruct: Option<usize>,
    pub nodes: Option<NodesConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    // worker threads for local dispatch, all cpus if unset
    pub threads: Option<usize>,
    // per task timeout in seconds, tasks may run forever if unset
    pub timeout: Option<u64>,
    #[serde(default = "default_launcher")]
    pub launcher: String,
    #[serde(default)]
    pub missing_flags: MissingFlagPolicy,
    // directory for host files, $TMPDIR if unset
    pub scratch: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: None,
            timeout: None,
            launcher: default_launcher(),
            missing_flags: MissingFlagPolicy::default(),
            scratch: None,
        }
    }
}

impl ExecutorConfig {
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct BinaryConfig {
    pub path: Option<PathBuf>,
    pub name: Option<String>,
    // searched for `name`, $ROSETTA_BIN if unset
    pub directory: Option<PathBuf>,
    pub mode: Option<ExecutionMode>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(default = "default_job_id")]
    pub id: String,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub merge: bool,
    #[serde(default)]
    pub isolation: bool,
    #[serde(default)]
    pub flags: Vec<PathBuf>,
    #[serde(default)]
    pub options: Vec<OptionConfig>,
}

/// An option as written in the config file
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum OptionConfig {
    Scalar { key: String, value: Value },
    Group { group: Mapping },
    Token(Value),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct NodesConfig {
    pub local: Option<usize>,
    pub hosts: Option<BTreeMap<String, usize>>,
    #[serde(default)]
    pub slurm: bool,
}

fn yaml_scalar(name: &str, value: &Value) -> Result<String, ConfigErrors> {
    match value {
        Value::String(string) => Ok(string.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(boolean) => Ok(boolean.to_string()),
        _ => Err(ConfigErrors::InvalidOptionValue(name.to_string())),
    }
}

fn group_from_mapping(name: &str, mapping: &Mapping) -> Result<JobOption, ConfigErrors> {
    let pairs = mapping
        .iter()
        .map(|(key, value)| Ok((yaml_scalar(name, key)?, yaml_scalar(name, value)?)))
        .collect::<Result<Vec<(String, String)>, ConfigErrors>>()?;

    Ok(JobOption::group(pairs)?)
}

impl OptionConfig {
    pub fn to_option(&self) -> Result<JobOption, ConfigErrors> {
        match self {
            Self::Scalar { key, value } => Ok(JobOption::scalar(key, yaml_scalar(key, value)?)),
            Self::Group { group } => group_from_mapping("group", group),
            Self::Token(value) => Ok(JobOption::token(yaml_scalar("token", value)?)),
        }
    }
}

/// turn one `tasks` entry into options, mapping values become variable groups
pub fn task_options(task: &Mapping) -> Result<Vec<JobOption>, ConfigErrors> {
    task.iter()
        .map(|(key, value)| {
            let key = yaml_scalar("task key", key)?;

            match value {
                Value::Mapping(group) => group_from_mapping(&key, group),
                value => Ok(JobOption::scalar(key.clone(), yaml_scalar(&key, value)?)),
            }
        })
        .collect()
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let content = fs::read_to_string(path).map_err(|source| ConfigErrors::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn binary(&self) -> Result<BinaryDescriptor, RunnerError> {
        let binary = &self.binary;

        match (&binary.path, &binary.name) {
            (Some(path), _) => Ok(match binary.mode {
                Some(mode) => BinaryDescriptor::new(path, mode)?,
                None => BinaryDescriptor::from_path(path)?,
            }),
            (None, Some(name)) => {
                let resolver = match binary.directory {
                    Some(ref directory) => DirectoryResolver::new(directory),
                    None => DirectoryResolver::from_env()?,
                };
                let resolver = match binary.mode {
                    Some(mode) => resolver.prefer(mode),
                    None => resolver,
                };

                Ok(resolver.resolve(name)?)
            }
            (None, None) => Err(ConfigErrors::MissingBinary.into()),
        }
    }

    pub fn job_spec(&self) -> Result<JobSpec, RunnerError> {
        let options = self
            .job
            .options
            .iter()
            .map(OptionConfig::to_option)
            .collect::<Result<Vec<_>, _>>()?;

        let spec = JobSpec::new(self.binary()?)
            .with_job_id(&self.job.id)
            .with_flags(self.job.flags.iter().cloned())
            .with_options(options)
            .merge_outputs(self.job.merge)
            .isolated(self.job.isolation);

        Ok(match self.job.output {
            Some(ref output) => spec.with_output_dir(output),
            None => spec,
        })
    }

    pub fn task_inputs(&self) -> Result<Vec<Vec<JobOption>>, ConfigErrors> {
        self.tasks.iter().map(task_options).collect()
    }

    /// node allocation for MPI dispatch, `None` runs the job locally
    pub fn allocation(
        &self,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<NodeAllocation>, RunnerError> {
        let Some(ref nodes) = self.nodes else {
            return Ok(None);
        };

        let allocation = match (nodes.local, &nodes.hosts, nodes.slurm) {
            (Some(processes), None, false) => NodeAllocation::local(processes)?,
            (None, Some(hosts), false) => NodeAllocation::cluster(hosts.clone())?,
            (None, None, true) => NodeAllocation::from_cluster_environment(diagnostics)?,
            _ => return Err(ConfigErrors::AmbiguousNodes.into()),
        };

        let allocation = allocation.with_launcher(&self.executor.launcher);

        Ok(Some(match self.executor.scratch {
            Some(ref scratch) => allocation.with_scratch_dir(scratch),
            None => allocation,
        }))
    }

    /// log every problem of the config, returns true if any was found
    pub fn preflight_checks(&self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        if self.job.id.is_empty() || self.job.id.contains('/') {
            error!("job.id '{}' must be a non-empty name without '/'", self.job.id);
            contains_error = true;
        }

        match (&self.binary.path, &self.binary.name) {
            (Some(path), _) => match check_executable(path) {
                Ok(true) => {}
                Ok(false) => {
                    error!(
                        "binary.path {} is not executable",
                        path.to_string_lossy()
                    );
                    contains_error = true;
                }
                Err(e) => {
                    error!(
                        "Failed to determine if binary.path ({}) is an executable: {e}",
                        path.to_string_lossy()
                    );
                    contains_error = true;
                }
            },
            (None, Some(_)) => {}
            (None, None) => {
                error!("Either binary.path or binary.name must be set");
                contains_error = true;
            }
        }

        if self.binary.path.is_some() && self.binary.name.is_some() {
            warn!("binary.path and binary.name are both set, binary.name is ignored");
        }

        for flag in self.job.flags.iter().filter(|flag| !flag.is_file()) {
            match self.executor.missing_flags {
                MissingFlagPolicy::Skip => {
                    warn!("Flag file {} not found, it will be skipped", flag.to_string_lossy())
                }
                MissingFlagPolicy::Error => {
                    error!("Flag file {} not found", flag.to_string_lossy());
                    contains_error = true;
                }
            }
        }

        for (index, option) in self.job.options.iter().enumerate() {
            if let Err(e) = option.to_option() {
                error!("job.options[{index}] is invalid: {e}");
                contains_error = true;
            }
        }

        for (index, task) in self.tasks.iter().enumerate() {
            if let Err(e) = task_options(task) {
                error!("tasks[{index}] is invalid: {e}");
                contains_error = true;
            }
        }

        if self.nstruct == Some(0) {
            error!("nstruct cannot be 0, leave it unset to run a single job");
            contains_error = true;
        }

        if self.executor.threads == Some(0) {
            error!("executor.threads cannot be 0");
            contains_error = true;
        }

        if self.executor.timeout == Some(0) {
            error!("executor.timeout cannot be 0, leave it unset to disable timeouts");
            contains_error = true;
        }

        if let Some(ref nodes) = self.nodes {
            let selected = [nodes.local.is_some(), nodes.hosts.is_some(), nodes.slurm]
                .into_iter()
                .filter(|selected| *selected)
                .count();

            if selected != 1 {
                error!("{}", ConfigErrors::AmbiguousNodes);
                contains_error = true;
            }
        }

        contains_error
    }
}

fn default_launcher() -> String {
    DEFAULT_LAUNCHER.to_string()
}

fn default_job_id() -> String {
    "default".to_string()
}
