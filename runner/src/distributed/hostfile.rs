use super::util::unique_name;
use std::{
    fs::OpenOptions,
    io::{self, ErrorKind, Write},
    ops::Deref,
    path::{Path, PathBuf},
};
use tracing::{debug, error};

/// Host file handed to the MPI launcher, removed from disk when dropped
#[derive(Debug)]
pub struct HostFile {
    path: PathBuf,
}

impl Drop for HostFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "Removed host file"),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "Host file was already gone")
            }
            Err(error) => error!(error = ?error, path = ?self.path, "Failed to remove host file"),
        }
    }
}

impl HostFile {
    /// write one `<host> slots=<n>` line per host to a freshly named file in `dir`
    pub fn create(dir: &Path, hosts: &[(String, usize)]) -> io::Result<Self> {
        let path = dir.join(unique_name("nodefile_", ".txt"));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        // from here on the guard owns the file, a failed write still removes it
        let host_file = Self { path };

        for (host, slots) in hosts {
            writeln!(file, "{host} slots={slots}")?;
        }
        file.flush()?;

        debug!(path = ?host_file.path, hosts = hosts.len(), "Wrote host file");

        Ok(host_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// remove the file now instead of at the end of the scope
    pub fn release(self) {
        drop(self)
    }
}

impl Deref for HostFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

/// A launcher command together with the host file it references, if any
#[derive(Debug)]
pub struct ScopedCommand {
    command: Vec<String>,
    host_file: Option<HostFile>,
}

impl ScopedCommand {
    pub fn new(command: Vec<String>, host_file: Option<HostFile>) -> Self {
        Self { command, host_file }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn host_file(&self) -> Option<&Path> {
        self.host_file.as_deref()
    }

    /// drop the host file, the command must not be launched afterwards
    pub fn release(self) {
        drop(self)
    }
}
