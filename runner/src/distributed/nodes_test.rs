use super::nodes::NodeAllocation;
use crate::{config::ConfigErrors, test_util::host_files};
use std::{
    cell::RefCell,
    fs,
    panic::{catch_unwind, AssertUnwindSafe},
    path::PathBuf,
};
use tempfile::TempDir;

fn command() -> Vec<String> {
    vec!["/opt/bin/relax.mpi.linuxgccrelease".to_string(), "-nstruct".to_string(), "2".to_string()]
}

#[test]
pub fn local_prefix() {
    let allocation = NodeAllocation::local(4).unwrap();

    assert_eq!(allocation.processes(), 4);
    assert!(!allocation.is_cluster());
    assert_eq!(
        allocation.local_prefix(),
        vec!["mpirun", "--use-hwthread-cpus", "-np", "4"]
    );
}

#[test]
pub fn empty_allocations_are_rejected() {
    assert!(matches!(
        NodeAllocation::local(0),
        Err(ConfigErrors::EmptyAllocation)
    ));
    assert!(matches!(
        NodeAllocation::cluster(Vec::<(String, usize)>::new()),
        Err(ConfigErrors::EmptyAllocation)
    ));
}

#[test]
pub fn cluster_process_count_is_sum_of_slots() {
    let allocation = NodeAllocation::cluster([("node1", 2), ("node2", 3)]).unwrap();

    assert_eq!(allocation.processes(), 5);
    assert_eq!(
        allocation
            .hosts()
            .unwrap()
            .iter()
            .map(|(_, slots)| slots)
            .sum::<usize>(),
        allocation.processes()
    );
}

#[test]
pub fn cluster_merges_repeated_hosts() {
    let allocation = NodeAllocation::cluster([("a", 1), ("b", 2), ("a", 3)]).unwrap();

    assert_eq!(
        allocation.hosts().unwrap(),
        &[("a".to_string(), 4), ("b".to_string(), 2)]
    );
    assert_eq!(allocation.processes(), 6);
}

#[test]
pub fn local_scope_writes_no_host_file() {
    let scratch = TempDir::new().unwrap();
    let allocation = NodeAllocation::local(2)
        .unwrap()
        .with_launcher("/usr/bin/mpirun")
        .with_scratch_dir(scratch.path());

    let scoped = allocation.scoped_host_file(&command()).unwrap();

    assert!(scoped.host_file().is_none());
    assert_eq!(
        scoped.command(),
        &[
            "/usr/bin/mpirun",
            "--use-hwthread-cpus",
            "-np",
            "2",
            "/opt/bin/relax.mpi.linuxgccrelease",
            "-nstruct",
            "2"
        ]
    );
    assert!(host_files(scratch.path()).is_empty());
}

#[test]
pub fn cluster_scope_writes_and_removes_host_file() {
    let scratch = TempDir::new().unwrap();
    let allocation = NodeAllocation::cluster([("node1", 2), ("node2", 2)])
        .unwrap()
        .with_scratch_dir(scratch.path());

    let scoped = allocation.scoped_host_file(&command()).unwrap();
    let host_file = scoped.host_file().unwrap().to_path_buf();

    assert_eq!(&scoped.command()[..2], &["mpirun", "--hostfile"]);
    assert_eq!(PathBuf::from(&scoped.command()[2]), host_file);
    assert_eq!(&scoped.command()[3..], command().as_slice());
    assert_eq!(
        fs::read_to_string(&host_file).unwrap(),
        "node1 slots=2\nnode2 slots=2\n"
    );

    scoped.release();

    assert!(!host_file.exists());
    assert!(host_files(scratch.path()).is_empty());
}

#[test]
pub fn host_file_names_are_unique() {
    let scratch = TempDir::new().unwrap();
    let allocation = NodeAllocation::cluster([("node1", 1)])
        .unwrap()
        .with_scratch_dir(scratch.path());

    let first = allocation.scoped_host_file(&command()).unwrap();
    let second = allocation.scoped_host_file(&command()).unwrap();

    assert_ne!(first.host_file(), second.host_file());
    assert_eq!(host_files(scratch.path()).len(), 2);
}

#[test]
pub fn host_file_removed_when_scope_fails() {
    let scratch = TempDir::new().unwrap();
    let allocation = NodeAllocation::cluster([("node1", 2)])
        .unwrap()
        .with_scratch_dir(scratch.path());

    let result: Result<(), PathBuf> = allocation
        .with_scoped_host_file(&command(), |full| {
            let host_file = PathBuf::from(&full[2]);
            assert!(host_file.exists());

            Err(host_file)
        })
        .unwrap();

    let host_file = result.unwrap_err();
    assert!(!host_file.exists());
}

#[test]
pub fn host_file_removed_when_scope_panics() {
    let scratch = TempDir::new().unwrap();
    let allocation = NodeAllocation::cluster([("node1", 2)])
        .unwrap()
        .with_scratch_dir(scratch.path());
    let seen = RefCell::new(None);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        allocation.with_scoped_host_file(&command(), |full| {
            *seen.borrow_mut() = Some(PathBuf::from(&full[2]));
            panic!("launch blew up");
        })
    }));

    assert!(outcome.is_err());
    assert!(!seen.into_inner().unwrap().exists());
    assert!(host_files(scratch.path()).is_empty());
}

#[test]
pub fn cluster_rejects_overflowing_slots() {
    assert!(matches!(
        NodeAllocation::cluster([("a", usize::MAX), ("a", 1)]),
        Err(ConfigErrors::SlotOverflow)
    ));
    assert!(matches!(
        NodeAllocation::cluster([("a", usize::MAX), ("b", 1)]),
        Err(ConfigErrors::SlotOverflow)
    ));
}
