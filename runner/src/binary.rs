use crate::{
    config::{check_executable, EnvironmentError},
    distributed::util::absolute,
};
use globset::GlobBuilder;
use ignore::WalkBuilder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, warn};

/// environment variable pointing at the directory holding the installed binaries
pub const BINARY_DIR_VARIABLE: &str = "ROSETTA_BIN";

const OPERATING_SYSTEMS: [&str; 2] = ["linux", "macos"];
const COMPILERS: [&str; 3] = ["gcc", "clang", "icc"];
const BUILDS: [&str; 2] = ["release", "debug"];

/// How a binary was built, decides whether it can be launched through MPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Default,
    Static,
    Mpi,
    Cxx11ThreadMpi,
    Cxx11ThreadSerialization,
}

impl ExecutionMode {
    pub fn supports_mpi(self) -> bool {
        matches!(self, Self::Mpi | Self::Cxx11ThreadMpi)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Static => "static",
            Self::Mpi => "mpi",
            Self::Cxx11ThreadMpi => "cxx11threadmpi",
            Self::Cxx11ThreadSerialization => "cxx11threadserialization",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "static" => Ok(Self::Static),
            "mpi" => Ok(Self::Mpi),
            "cxx11threadmpi" => Ok(Self::Cxx11ThreadMpi),
            "cxx11threadserialization" => Ok(Self::Cxx11ThreadSerialization),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform suffix of a binary, e.g. `linuxgccrelease`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub compiler: String,
    pub build: String,
}

impl Platform {
    fn parse(suffix: &str) -> Option<Self> {
        let os = OPERATING_SYSTEMS
            .iter()
            .find(|os| suffix.starts_with(*os))?;
        let rest = &suffix[os.len()..];
        let compiler = COMPILERS.iter().find(|compiler| rest.starts_with(*compiler))?;
        let build = &rest[compiler.len()..];

        BUILDS.contains(&build).then(|| Self {
            os: os.to_string(),
            compiler: compiler.to_string(),
            build: build.to_string(),
        })
    }
}

/// A resolved binary, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryDescriptor {
    path: PathBuf,
    name: String,
    mode: ExecutionMode,
    platform: Option<Platform>,
}

impl BinaryDescriptor {
    /// describe an arbitrary executable with an explicit mode
    pub fn new(path: impl Into<PathBuf>, mode: ExecutionMode) -> Result<Self, EnvironmentError> {
        let path: PathBuf = path.into();
        let path = absolute(&path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path,
            name,
            mode,
            platform: None,
        })
    }

    /// describe a binary following the `<app>[.<mode>].<os><compiler><build>` naming scheme
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, EnvironmentError> {
        let path: PathBuf = path.into();
        let path = absolute(&path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match parse_file_name(&file_name) {
            Some((name, mode, platform)) => Ok(Self {
                path,
                name,
                mode,
                platform: Some(platform),
            }),
            None => Err(EnvironmentError::UnrecognizedBinaryName(path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn full_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    pub fn supports_mpi(&self) -> bool {
        self.mode.supports_mpi()
    }
}

fn parse_file_name(file_name: &str) -> Option<(String, ExecutionMode, Platform)> {
    let parts = file_name.split('.').collect_vec();

    let (name, mode, suffix) = match parts.as_slice() {
        [name, suffix] => (*name, ExecutionMode::Default, *suffix),
        [name, mode, suffix] => (*name, mode.parse().ok()?, *suffix),
        _ => return None,
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    Some((name.to_string(), mode, Platform::parse(suffix)?))
}

/// Turns a logical binary name into a descriptor
pub trait BinaryResolver {
    fn resolve(&self, name: &str) -> Result<BinaryDescriptor, EnvironmentError>;
}

/// Searches a single directory for `<name>.*` builds
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
    prefer: Option<ExecutionMode>,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefer: None,
        }
    }

    /// search the directory named by `$ROSETTA_BIN`
    pub fn from_env() -> Result<Self, EnvironmentError> {
        env::var(BINARY_DIR_VARIABLE)
            .map(Self::new)
            .map_err(|_| EnvironmentError::MissingVariable(BINARY_DIR_VARIABLE.to_string()))
    }

    /// pick a build of this mode if several are installed
    pub fn prefer(mut self, mode: ExecutionMode) -> Self {
        self.prefer = Some(mode);
        self
    }
}

impl BinaryResolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Result<BinaryDescriptor, EnvironmentError> {
        let matcher = GlobBuilder::new(&format!("{name}.*"))
            .literal_separator(true)
            .build()
            .map_err(|source| EnvironmentError::InvalidBinaryName {
                name: name.to_string(),
                source,
            })?
            .compile_matcher();

        let candidates = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .max_depth(Some(1))
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
            .filter(|entry| matcher.is_match(entry.file_name()))
            .map(|entry| entry.into_path())
            .sorted()
            .filter_map(|path| match check_executable(&path) {
                Ok(true) => BinaryDescriptor::from_path(path).ok(),
                Ok(false) => {
                    warn!(path = ?path, "Skipping binary that is not executable");
                    None
                }
                Err(_) => None,
            })
            .collect_vec();

        debug!("Found {} builds of {name} in {:?}", candidates.len(), self.root);

        let preferred = self.prefer.and_then(|mode| {
            candidates
                .iter()
                .find(|descriptor| descriptor.mode() == mode)
                .cloned()
        });

        preferred
            .or_else(|| candidates.into_iter().next())
            .ok_or_else(|| EnvironmentError::BinaryNotFound(name.to_string()))
    }
}
