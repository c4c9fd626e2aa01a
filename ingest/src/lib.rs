pub mod parse;
pub mod table;


pub use table::{ScoreTable, Value};

use std::path::PathBuf;
use thiserror::Error;

/// column every score file carries to identify the decoy a row belongs to
pub const DECOY_COLUMN: &str = "description";
/// default column used to rank decoys
pub const DEFAULT_SCORE_TERM: &str = "total_score";
/// only files ending with this suffix are picked up when loading a directory
pub const SCORE_FILE_SUFFIX: &str = ".sc";

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Score file {0:?} not found")]
    MissingScoreFile(PathBuf),
    #[error("Failed to read score file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Score file {0:?} has no header line")]
    MissingHeader(PathBuf),
    #[error("Row {line} of {path:?} has {found} fields, header has {expected}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Score file {path:?} does not share the schema of previously loaded files")]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Column \"{0}\" not found in score table")]
    MissingColumn(String),
}
