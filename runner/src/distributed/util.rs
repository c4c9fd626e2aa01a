use crate::config::EnvironmentError;
use nix::unistd::{geteuid, Uid};
use std::{
    env,
    path::{Path, PathBuf},
};
use uuid::Uuid;

/// primitve way to retrieve the tmp dir from the environment with default to /tmp
pub fn scratch_dir() -> PathBuf {
    env::var("TMPDIR")
        .map(PathBuf::from)
        .unwrap_or(PathBuf::from("/tmp"))
}

/// file or directory name that will not collide with concurrent batches
pub fn unique_name(prefix: &str, suffix: &str) -> String {
    format!("{prefix}{}{suffix}", Uuid::new_v4().simple())
}

/// user the launcher will run as
pub fn current_user() -> Uid {
    geteuid()
}

/// anchor a relative path at the current directory
pub fn absolute(path: &Path) -> Result<PathBuf, EnvironmentError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        env::current_dir()
            .map(|dir| dir.join(path))
            .map_err(EnvironmentError::CurrentDir)
    }
}
