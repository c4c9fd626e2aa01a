use crate::{
    binary::BinaryDescriptor,
    config::ConfigErrors,
    diagnostics::{Diagnostic, Diagnostics},
    distributed::util::{absolute, scratch_dir},
    options::{expand, JobOption},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error};

pub const PDB_PATH_FLAG: &str = "-out:path:pdb";
pub const SCORE_PATH_FLAG: &str = "-out:path:score";

/// What to do with flag files that are not on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFlagPolicy {
    /// leave them out of the command
    #[default]
    Skip,
    /// refuse to compose the command
    Error,
}

/// Kind of output the binary writes into its own directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Pdb,
    Scorefile,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pdb => "pdb",
            Self::Scorefile => "scorefile",
        })
    }
}

/// Template for every task of one job, owns no live resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    binary: BinaryDescriptor,
    flags: Vec<PathBuf>,
    options: Vec<JobOption>,
    output_dir: Option<PathBuf>,
    job_id: String,
    merge_outputs: bool,
    isolation: bool,
}

impl JobSpec {
    pub fn new(binary: BinaryDescriptor) -> Self {
        Self {
            binary,
            flags: Vec::new(),
            options: Vec::new(),
            output_dir: None,
            job_id: "default".to_string(),
            merge_outputs: false,
            isolation: false,
        }
    }

    pub fn with_flags<I, P>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.flags = flags.into_iter().map(|flag| anchored(flag.into())).collect();
        self
    }

    pub fn with_options(mut self, options: Vec<JobOption>) -> Self {
        self.options = options;
        self
    }

    /// relative directories are anchored at the current directory, isolated tasks run elsewhere
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(anchored(output_dir.into()));
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    /// write all kinds of output into a single `all` directory
    pub fn merge_outputs(mut self, merge: bool) -> Self {
        self.merge_outputs = merge;
        self
    }

    /// run every task inside its own runtime directory
    pub fn isolated(mut self, isolation: bool) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn binary(&self) -> &BinaryDescriptor {
        &self.binary
    }

    pub fn flags(&self) -> &[PathBuf] {
        &self.flags
    }

    pub fn options(&self) -> &[JobOption] {
        &self.options
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn isolation(&self) -> bool {
        self.isolation
    }

    /// `<output>/<job id>/<kind or all>`, created if missing
    pub fn output_path(&self, kind: OutputKind) -> Result<PathBuf, ConfigErrors> {
        let output_dir = self.output_dir.as_ref().ok_or(ConfigErrors::OutputDirUnset)?;
        let path = if self.merge_outputs {
            output_dir.join(&self.job_id).join("all")
        } else {
            output_dir.join(&self.job_id).join(kind.to_string())
        };

        create_dir(&path)?;

        Ok(path)
    }

    pub fn pdb_dir(&self) -> Result<PathBuf, ConfigErrors> {
        self.output_path(OutputKind::Pdb)
    }

    pub fn score_dir(&self) -> Result<PathBuf, ConfigErrors> {
        self.output_path(OutputKind::Scorefile)
    }

    /// parent of every task's runtime directory
    pub fn runtime_base_dir(&self) -> PathBuf {
        match self.output_dir {
            Some(ref output_dir) => output_dir.join(&self.job_id).join("runtime"),
            None => scratch_dir().join("decoy").join(&self.job_id),
        }
    }
}

// keeps the path as given if the current directory is gone
fn anchored(path: PathBuf) -> PathBuf {
    absolute(&path).unwrap_or(path)
}

pub(crate) fn create_dir(path: &Path) -> Result<(), ConfigErrors> {
    fs::create_dir_all(path).map_err(|source| {
        error!(path = ?path, "Failed to create directory: {source}");

        ConfigErrors::CreateDirectory {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// build the base command line of a job
///
/// Order: binary, `@flag` files, every non group option, every variable group, output paths.
pub fn compose(
    spec: &JobSpec,
    policy: MissingFlagPolicy,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<String>, ConfigErrors> {
    let mut command = vec![spec.binary.full_path()];

    for flag in &spec.flags {
        if flag.is_file() {
            command.push(format!("@{}", flag.to_string_lossy()));
        } else {
            match policy {
                MissingFlagPolicy::Skip => diagnostics.push(Diagnostic::FlagFileMissing {
                    path: flag.clone(),
                }),
                MissingFlagPolicy::Error => return Err(ConfigErrors::MissingFlagFile(flag.clone())),
            }
        }
    }

    let (groups, plain): (Vec<JobOption>, Vec<JobOption>) =
        spec.options.iter().cloned().partition(JobOption::is_group);

    command.extend(expand(&plain));

    if !groups.is_empty() {
        let tokens = expand(&groups);
        debug!("Composing command with {}", tokens.iter().join(" "));
        command.extend(tokens);
    }

    if spec.output_dir.is_some() {
        command.push(PDB_PATH_FLAG.to_string());
        command.push(spec.pdb_dir()?.to_string_lossy().into_owned());
        command.push(SCORE_PATH_FLAG.to_string());
        command.push(spec.score_dir()?.to_string_lossy().into_owned());
    }

    Ok(command)
}
