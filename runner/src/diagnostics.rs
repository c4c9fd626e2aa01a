use std::{fmt, path::PathBuf};
use tracing::warn;

/// Non-fatal conditions noticed while composing or dispatching a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// a script variable has no `%%key%%` marker in the template
    TemplateVariableUnused { key: String },
    /// a flag file was skipped since it does not exist
    FlagFileMissing { path: PathBuf },
    /// per task inputs were flattened into the single MPI launch
    MpiIncompatibleInput { tasks: usize },
    /// per task inputs were flattened into every repetition of a local batch
    OverridesFlattened { tasks: usize },
    RunningAsRoot,
    /// neither inputs nor a repetition count were given
    SingleJobFallback,
    /// an MPI build runs without a node allocation
    MpiBinaryRunLocally { binary: PathBuf },
    /// a cluster count below one was raised to one
    ClusterCountClamped { variable: String, value: i64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateVariableUnused { key } => {
                write!(f, "Variable {key} not in script content")
            }
            Self::FlagFileMissing { path } => {
                write!(f, "Flag file {path:?} not found, skipping it")
            }
            Self::MpiIncompatibleInput { tasks } => write!(
                f,
                "Customized inputs of {tasks} tasks will be flattened and passed to the master node"
            ),
            Self::OverridesFlattened { tasks } => write!(
                f,
                "Inputs of {tasks} tasks are shared by every repetition of the job"
            ),
            Self::RunningAsRoot => f.write_str("Running the MPI launcher as root user"),
            Self::SingleJobFallback => f.write_str("No inputs are given, running a single job"),
            Self::MpiBinaryRunLocally { binary } => {
                write!(f, "MPI binary {binary:?} runs without node allocation")
            }
            Self::ClusterCountClamped { variable, value } => {
                write!(f, "Fixing ${variable} from {value} to 1")
            }
        }
    }
}

/// Ordered list of diagnostics, every entry is also logged as a warning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.0.push(diagnostic);
    }

    /// append already logged diagnostics
    pub fn append(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.0.iter().filter(|diagnostic| predicate(diagnostic)).count()
    }
}
