use super::nodes::NodeAllocation;
use crate::{
    config::EnvironmentError,
    diagnostics::{Diagnostic, Diagnostics},
};
use std::{env, path::PathBuf, process::Command};
use tracing::{debug, info};

pub const NODE_LIST: &str = "SLURM_JOB_NODELIST";
pub const CPUS_PER_TASK: &str = "SLURM_CPUS_PER_TASK";
pub const TASKS_PER_NODE: &str = "SLURM_NTASKS_PER_NODE";

/// Slurm variables describing the allocation this process runs in
#[derive(Debug, Clone, Default)]
pub struct SlurmEnvironment {
    pub node_list: Option<String>,
    pub cpus_per_task: Option<String>,
    pub tasks_per_node: Option<String>,
    /// used to expand the compressed node list, `scontrol` from `$PATH` by default
    pub scontrol: Option<PathBuf>,
}

impl SlurmEnvironment {
    pub fn from_env() -> Self {
        Self {
            node_list: env::var(NODE_LIST).ok(),
            cpus_per_task: env::var(CPUS_PER_TASK).ok(),
            tasks_per_node: env::var(TASKS_PER_NODE).ok(),
            scontrol: None,
        }
    }

    /// one host entry per allocated node with `cpus per task * tasks per node` slots each
    pub fn allocation(
        &self,
        diagnostics: &mut Diagnostics,
    ) -> Result<NodeAllocation, EnvironmentError> {
        let node_list = self
            .node_list
            .as_deref()
            .ok_or_else(|| EnvironmentError::MissingVariable(NODE_LIST.to_string()))?;

        let hosts = self.hostnames(node_list)?;
        let cpus_per_task = count(CPUS_PER_TASK, self.cpus_per_task.as_deref(), diagnostics)?;
        let tasks_per_node = count(TASKS_PER_NODE, self.tasks_per_node.as_deref(), diagnostics)?;
        let slots = cpus_per_task.checked_mul(tasks_per_node).ok_or_else(|| {
            EnvironmentError::InvalidVariable {
                variable: TASKS_PER_NODE.to_string(),
                value: tasks_per_node.to_string(),
            }
        })?;

        info!(
            nodes = hosts.len(),
            slots = slots,
            "Read node allocation from Slurm"
        );

        NodeAllocation::cluster(hosts.into_iter().map(|host| (host, slots)))
            .map_err(|error| EnvironmentError::ClusterQuery(error.to_string()))
    }

    fn hostnames(&self, node_list: &str) -> Result<Vec<String>, EnvironmentError> {
        let scontrol = self
            .scontrol
            .clone()
            .unwrap_or_else(|| PathBuf::from("scontrol"));

        let output = Command::new(&scontrol)
            .args(["show", "hostnames", node_list])
            .output()
            .map_err(|error| {
                EnvironmentError::ClusterQuery(format!("failed to run {scontrol:?}: {error}"))
            })?;

        if !output.status.success() {
            return Err(EnvironmentError::ClusterQuery(format!(
                "{scontrol:?} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let hosts: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        debug!(hosts = ?hosts, "Expanded node list");

        if hosts.is_empty() {
            Err(EnvironmentError::ClusterQuery(format!(
                "node list {node_list} expanded to no hosts"
            )))
        } else {
            Ok(hosts)
        }
    }
}

/// parse a per node count, anything below one is raised to one
fn count(
    variable: &str,
    value: Option<&str>,
    diagnostics: &mut Diagnostics,
) -> Result<usize, EnvironmentError> {
    let Some(value) = value else {
        return Ok(1);
    };

    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| EnvironmentError::InvalidVariable {
            variable: variable.to_string(),
            value: value.to_string(),
        })?;

    if parsed < 1 {
        diagnostics.push(Diagnostic::ClusterCountClamped {
            variable: variable.to_string(),
            value: parsed,
        });

        Ok(1)
    } else {
        Ok(parsed as usize)
    }
}

impl NodeAllocation {
    /// allocation granted to the Slurm job this process runs in
    pub fn from_cluster_environment(
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, EnvironmentError> {
        SlurmEnvironment::from_env().allocation(diagnostics)
    }
}
