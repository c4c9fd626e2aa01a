use crate::diagnostics::{Diagnostic, Diagnostics};
use thiserror::Error;

/// flag prefixing every script variable on the command line
pub const SCRIPT_VARS_FLAG: &str = "-parser:script_vars";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("A variable group needs at least one variable")]
    EmptyGroup,
}

/// A single script variable, substituted for `%%key%%`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub key: String,
    pub value: String,
}

impl Variable {
    pub fn tokens(&self) -> [String; 2] {
        [
            SCRIPT_VARS_FLAG.to_string(),
            format!("{}={}", self.key, self.value),
        ]
    }

    fn marker(&self) -> String {
        format!("%%{}%%", self.key)
    }
}

/// Non-empty, ordered set of script variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableGroup {
    variables: Vec<Variable>,
}

impl VariableGroup {
    pub fn new<I, K, V>(pairs: I) -> Result<Self, OptionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let variables: Vec<Variable> = pairs
            .into_iter()
            .map(|(key, value)| Variable {
                key: key.into(),
                value: value.into(),
            })
            .collect();

        if variables.is_empty() {
            Err(OptionError::EmptyGroup)
        } else {
            Ok(Self { variables })
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn tokens(&self) -> Vec<String> {
        self.variables
            .iter()
            .flat_map(|variable| variable.tokens())
            .collect()
    }

    /// substitute every variable into a copy of `template`
    ///
    /// A variable without a marker in the template is reported and skipped, the template is left
    /// untouched for that key.
    pub fn apply_to(&self, template: &str, diagnostics: &mut Diagnostics) -> String {
        let mut content = template.to_string();

        for variable in &self.variables {
            let marker = variable.marker();

            if content.contains(&marker) {
                content = content.replace(&marker, &variable.value);
            } else {
                diagnostics.push(Diagnostic::TemplateVariableUnused {
                    key: variable.key.clone(),
                });
            }
        }

        content
    }
}

/// One entry of a job's option list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOption {
    /// passed through as is, e.g. a bare switch
    Token(String),
    Scalar { key: String, value: String },
    Group(VariableGroup),
}

impl JobOption {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    pub fn scalar(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Scalar {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn group<I, K, V>(pairs: I) -> Result<Self, OptionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        VariableGroup::new(pairs).map(Self::Group)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub fn tokens(&self) -> Vec<String> {
        match self {
            Self::Token(token) => vec![token.clone()],
            Self::Scalar { key, value } => vec![key.clone(), value.clone()],
            Self::Group(group) => group.tokens(),
        }
    }
}

/// flatten options into command line tokens, keeping their order
pub fn expand(options: &[JobOption]) -> Vec<String> {
    options.iter().flat_map(JobOption::tokens).collect()
}
