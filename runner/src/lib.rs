pub mod binary;
pub mod compose;
pub mod config;
pub mod diagnostics;
pub mod distributed;
pub mod executors;
pub mod options;

#[cfg(test)]
mod options_test;
#[cfg(test)]
pub(crate) mod test_util;

use thiserror::Error;

/// Every error the runner can surface to a caller
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] config::ConfigErrors),
    #[error(transparent)]
    Environment(#[from] config::EnvironmentError),
    #[error(transparent)]
    Executor(#[from] executors::ExecutorError),
    #[error(transparent)]
    Score(#[from] decoy_ingest::ScoreError),
    #[error(transparent)]
    Rank(#[from] decoy_analysis::RankError),
    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_yaml::Error),
}
