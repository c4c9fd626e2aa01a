pub mod hostfile;
pub mod nodes;
pub mod slurm;
pub mod util;

#[cfg(test)]
mod nodes_test;
#[cfg(test)]
mod slurm_test;

/*
 * Two ways of spreading work over processes:
 * -> local: a single launcher call with `-np N` on this machine
 * -> cluster: the launcher reads a host file listing `<host> slots=<n>`
 *
 * The host file only lives for the duration of one launch, see `hostfile::HostFile`.
 * Allocations themselves are never scheduled here, they are read from the resource manager
 * (Slurm) that already granted them.
 */

pub use hostfile::{HostFile, ScopedCommand};
pub use nodes::{NodeAllocation, DEFAULT_LAUNCHER};
pub use slurm::SlurmEnvironment;
