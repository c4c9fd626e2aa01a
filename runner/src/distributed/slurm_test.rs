use super::slurm::{SlurmEnvironment, CPUS_PER_TASK, NODE_LIST, TASKS_PER_NODE};
use crate::{
    config::EnvironmentError,
    diagnostics::{Diagnostic, Diagnostics},
    test_util::fixtures,
};

fn environment(cpus: Option<&str>, tasks: Option<&str>) -> SlurmEnvironment {
    SlurmEnvironment {
        node_list: Some("node[01-02]".to_string()),
        cpus_per_task: cpus.map(str::to_string),
        tasks_per_node: tasks.map(str::to_string),
        scontrol: Some(fixtures().scontrol()),
    }
}

#[test]
pub fn missing_node_list_is_named() {
    let environment = SlurmEnvironment {
        node_list: None,
        ..environment(Some("2"), Some("1"))
    };

    let error = environment
        .allocation(&mut Diagnostics::new())
        .unwrap_err();

    assert!(matches!(error, EnvironmentError::MissingVariable(ref name) if name == NODE_LIST));
    assert!(error.to_string().contains("SLURM_JOB_NODELIST"));
}

#[test]
pub fn allocation_from_node_list() {
    let mut diagnostics = Diagnostics::new();

    let allocation = environment(Some("2"), Some("1"))
        .allocation(&mut diagnostics)
        .unwrap();

    assert_eq!(
        allocation.hosts().unwrap(),
        &[("node01".to_string(), 2), ("node02".to_string(), 2)]
    );
    assert_eq!(allocation.processes(), 4);
    assert!(diagnostics.is_empty());
}

#[test]
pub fn missing_counts_default_to_one() {
    let allocation = environment(None, None)
        .allocation(&mut Diagnostics::new())
        .unwrap();

    assert_eq!(allocation.processes(), 2);
}

#[test]
pub fn non_positive_counts_are_clamped() {
    let mut diagnostics = Diagnostics::new();

    let allocation = environment(Some("0"), Some("-3"))
        .allocation(&mut diagnostics)
        .unwrap();

    assert_eq!(allocation.processes(), 2);
    assert_eq!(
        diagnostics.iter().cloned().collect::<Vec<_>>(),
        vec![
            Diagnostic::ClusterCountClamped {
                variable: CPUS_PER_TASK.to_string(),
                value: 0
            },
            Diagnostic::ClusterCountClamped {
                variable: TASKS_PER_NODE.to_string(),
                value: -3
            },
        ]
    );
}

#[test]
pub fn invalid_count_is_named() {
    let error = environment(Some("two"), None)
        .allocation(&mut Diagnostics::new())
        .unwrap_err();

    assert!(matches!(
        error,
        EnvironmentError::InvalidVariable { ref variable, ref value }
            if variable == CPUS_PER_TASK && value == "two"
    ));
}

#[test]
pub fn failing_node_query() {
    let environment = SlurmEnvironment {
        scontrol: Some(fixtures().failing_scontrol()),
        ..environment(Some("1"), Some("1"))
    };

    let error = environment
        .allocation(&mut Diagnostics::new())
        .unwrap_err();

    assert!(matches!(error, EnvironmentError::ClusterQuery(ref message) if message.contains("invalid node list")));
}

#[test]
pub fn missing_scontrol() {
    let environment = SlurmEnvironment {
        scontrol: Some(fixtures().app().with_file_name("no_such_scontrol")),
        ..environment(Some("1"), Some("1"))
    };

    assert!(matches!(
        environment.allocation(&mut Diagnostics::new()),
        Err(EnvironmentError::ClusterQuery(_))
    ));
}

#[test]
pub fn overflowing_slot_count_is_named() {
    let error = environment(Some("9223372036854775807"), Some("4"))
        .allocation(&mut Diagnostics::new())
        .unwrap_err();

    assert!(matches!(
        error,
        EnvironmentError::InvalidVariable { ref variable, ref value }
            if variable == TASKS_PER_NODE && value == "4"
    ));
}
