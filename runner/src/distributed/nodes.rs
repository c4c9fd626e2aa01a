use super::{
    hostfile::{HostFile, ScopedCommand},
    util::scratch_dir,
};
use crate::config::ConfigErrors;
use std::{io, path::PathBuf};
use tracing::debug;

pub const DEFAULT_LAUNCHER: &str = "mpirun";

/// Processes available to a single MPI launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAllocation {
    processes: usize,
    // insertion ordered, as reported by the resource manager
    hosts: Option<Vec<(String, usize)>>,
    launcher: String,
    scratch: PathBuf,
}

impl NodeAllocation {
    /// `processes` ranks on this machine
    pub fn local(processes: usize) -> Result<Self, ConfigErrors> {
        if processes == 0 {
            return Err(ConfigErrors::EmptyAllocation);
        }

        Ok(Self {
            processes,
            hosts: None,
            launcher: DEFAULT_LAUNCHER.to_string(),
            scratch: scratch_dir(),
        })
    }

    /// ranks spread over hosts, the process count is always the sum of all slots
    ///
    /// A host listed more than once gets the sum of its slots, as if its entries were
    /// separate allocations on the same machine.
    pub fn cluster<I, H>(hosts: I) -> Result<Self, ConfigErrors>
    where
        I: IntoIterator<Item = (H, usize)>,
        H: Into<String>,
    {
        let mut merged: Vec<(String, usize)> = Vec::new();

        for (host, slots) in hosts {
            let host = host.into();

            match merged.iter_mut().find(|(known, _)| *known == host) {
                Some((_, known_slots)) => {
                    *known_slots = known_slots
                        .checked_add(slots)
                        .ok_or(ConfigErrors::SlotOverflow)?
                }
                None => merged.push((host, slots)),
            }
        }

        let processes = merged
            .iter()
            .try_fold(0usize, |total, (_, slots)| total.checked_add(*slots))
            .ok_or(ConfigErrors::SlotOverflow)?;

        if processes == 0 {
            return Err(ConfigErrors::EmptyAllocation);
        }

        Ok(Self {
            processes,
            hosts: Some(merged),
            launcher: DEFAULT_LAUNCHER.to_string(),
            scratch: scratch_dir(),
        })
    }

    /// launcher executable, `mpirun` unless overridden
    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    /// directory host files are written to
    pub fn with_scratch_dir(mut self, scratch: impl Into<PathBuf>) -> Self {
        self.scratch = scratch.into();
        self
    }

    pub fn processes(&self) -> usize {
        self.processes
    }

    pub fn hosts(&self) -> Option<&[(String, usize)]> {
        self.hosts.as_deref()
    }

    pub fn is_cluster(&self) -> bool {
        self.hosts.is_some()
    }

    pub fn launcher(&self) -> &str {
        &self.launcher
    }

    pub fn local_prefix(&self) -> Vec<String> {
        vec![
            self.launcher.clone(),
            "--use-hwthread-cpus".to_string(),
            "-np".to_string(),
            self.processes.to_string(),
        ]
    }

    pub fn cluster_prefix(&self, host_file: &HostFile) -> Vec<String> {
        vec![
            self.launcher.clone(),
            "--hostfile".to_string(),
            host_file.path().to_string_lossy().into_owned(),
        ]
    }

    /// prefix `command` with the launcher, writing a host file for cluster allocations
    ///
    /// The host file lives as long as the returned `ScopedCommand`.
    pub fn scoped_host_file(&self, command: &[String]) -> io::Result<ScopedCommand> {
        match self.hosts {
            Some(ref hosts) => {
                let host_file = HostFile::create(&self.scratch, hosts)?;
                let mut full = self.cluster_prefix(&host_file);
                full.extend_from_slice(command);

                Ok(ScopedCommand::new(full, Some(host_file)))
            }
            None => {
                let mut full = self.local_prefix();
                full.extend_from_slice(command);

                Ok(ScopedCommand::new(full, None))
            }
        }
    }

    /// run `f` with the launcher command, the host file is removed once `f` returns or unwinds
    pub fn with_scoped_host_file<T>(
        &self,
        command: &[String],
        f: impl FnOnce(&[String]) -> T,
    ) -> io::Result<T> {
        let scoped = self.scoped_host_file(command)?;
        let result = f(scoped.command());
        debug!("Releasing launcher scope");
        scoped.release();

        Ok(result)
    }
}
