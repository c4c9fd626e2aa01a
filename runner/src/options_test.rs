use crate::{
    diagnostics::{Diagnostic, Diagnostics},
    options::{expand, JobOption, OptionError, VariableGroup, SCRIPT_VARS_FLAG},
};

#[test]
pub fn group_tokens_keep_input_order() {
    let group = VariableGroup::new([("pdb", "1abc.pdb"), ("chain", "A"), ("cycles", "3")]).unwrap();

    assert_eq!(
        group.tokens(),
        vec![
            SCRIPT_VARS_FLAG,
            "pdb=1abc.pdb",
            SCRIPT_VARS_FLAG,
            "chain=A",
            SCRIPT_VARS_FLAG,
            "cycles=3"
        ]
    );
}

#[test]
pub fn empty_group_is_rejected() {
    assert_eq!(
        VariableGroup::new(Vec::<(String, String)>::new()),
        Err(OptionError::EmptyGroup)
    );
    assert_eq!(
        JobOption::group(Vec::<(&str, &str)>::new()),
        Err(OptionError::EmptyGroup)
    );
}

#[test]
pub fn expand_flattens_in_order() {
    let options = vec![
        JobOption::scalar("-nstruct", "1"),
        JobOption::token("-overwrite"),
        JobOption::group([("chain", "B")]).unwrap(),
        JobOption::scalar("-in:file:s", "input.pdb"),
    ];

    assert_eq!(
        expand(&options),
        vec![
            "-nstruct",
            "1",
            "-overwrite",
            SCRIPT_VARS_FLAG,
            "chain=B",
            "-in:file:s",
            "input.pdb"
        ]
    );
    assert!(expand(&[]).is_empty());
}

#[test]
pub fn apply_substitutes_every_marker() {
    let group = VariableGroup::new([("chain", "A"), ("cycles", "5")]).unwrap();
    let mut diagnostics = Diagnostics::new();

    let content = group.apply_to(
        "<Chain name=\"%%chain%%\"/> <Repeat n=\"%%cycles%%\"/> <Also chain=\"%%chain%%\"/>",
        &mut diagnostics,
    );

    assert_eq!(
        content,
        "<Chain name=\"A\"/> <Repeat n=\"5\"/> <Also chain=\"A\"/>"
    );
    assert!(diagnostics.is_empty());
}

#[test]
pub fn apply_reports_unused_variables() {
    let group = VariableGroup::new([("chain", "A"), ("ligand", "ATP")]).unwrap();
    let mut diagnostics = Diagnostics::new();

    let content = group.apply_to("<Chain name=\"%%chain%%\"/>", &mut diagnostics);

    assert_eq!(content, "<Chain name=\"A\"/>");
    assert_eq!(
        diagnostics.iter().cloned().collect::<Vec<_>>(),
        vec![Diagnostic::TemplateVariableUnused {
            key: "ligand".to_string()
        }]
    );
}
