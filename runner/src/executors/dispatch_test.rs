use super::{Dispatcher, ExecutorError, Strategy};
use crate::{
    binary::{BinaryDescriptor, ExecutionMode},
    compose::{JobSpec, MissingFlagPolicy},
    config::{ConfigErrors, ExecutorConfig},
    distributed::NodeAllocation,
    test_util::fixtures,
};
use tempfile::TempDir;

fn spec(mode: ExecutionMode) -> JobSpec {
    JobSpec::new(BinaryDescriptor::new(fixtures().app(), mode).unwrap())
}

#[test]
pub fn strategy_follows_binary_and_allocation() {
    let allocation = NodeAllocation::local(2).unwrap();

    assert_eq!(
        Strategy::select(&spec(ExecutionMode::Mpi), Some(&allocation)).unwrap(),
        Strategy::Mpi
    );
    assert_eq!(
        Strategy::select(&spec(ExecutionMode::Cxx11ThreadMpi), Some(&allocation)).unwrap(),
        Strategy::Mpi
    );
    assert_eq!(
        Strategy::select(&spec(ExecutionMode::Mpi), None).unwrap(),
        Strategy::Local
    );
    assert_eq!(
        Strategy::select(&spec(ExecutionMode::Static), None).unwrap(),
        Strategy::Local
    );
    assert!(matches!(
        Strategy::select(&spec(ExecutionMode::Static), Some(&allocation)),
        Err(ConfigErrors::UnsupportedDispatch {
            mode: ExecutionMode::Static,
            ..
        })
    ));
}

#[test]
pub fn unsupported_dispatch_fails_before_launch() {
    let output = TempDir::new().unwrap();
    let spec = spec(ExecutionMode::Default).with_output_dir(output.path());
    let dispatcher = Dispatcher::new(ExecutorConfig::default())
        .with_allocation(Some(NodeAllocation::local(2).unwrap()));

    let error = dispatcher.run(&spec, &[], Some(2)).unwrap_err();

    assert!(matches!(
        error,
        ExecutorError::Config(ConfigErrors::UnsupportedDispatch { .. })
    ));
    // not even the output directories were created
    assert!(!output.path().join("default").exists());
}

#[test]
pub fn missing_flag_file_policy_is_applied() {
    let output = TempDir::new().unwrap();
    let spec = spec(ExecutionMode::Default)
        .with_output_dir(output.path())
        .with_flags([output.path().join("absent.flags")]);

    let strict = Dispatcher::new(ExecutorConfig {
        missing_flags: MissingFlagPolicy::Error,
        ..ExecutorConfig::default()
    });
    assert!(matches!(
        strict.run(&spec, &[], None),
        Err(ExecutorError::Config(ConfigErrors::MissingFlagFile(_)))
    ));

    let lenient = Dispatcher::new(ExecutorConfig {
        threads: Some(1),
        ..ExecutorConfig::default()
    });
    let dispatch = lenient.run(&spec, &[], None).unwrap();

    assert!(dispatch.is_success());
    // flag file skipped plus the single job fallback
    assert_eq!(dispatch.diagnostics.len(), 2);
}
