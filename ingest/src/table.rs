use crate::{
    parse::{parse_scores, ParsedScores},
    ScoreError, DECOY_COLUMN, DEFAULT_SCORE_TERM, SCORE_FILE_SUFFIX,
};
use itertools::Itertools;
use serde::Serialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// A single cell of a score table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn parse(field: &str) -> Self {
        match field.parse::<f64>() {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Text(field.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Rows parsed from one or more score files sharing one schema
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    score_term: String,
}

impl ScoreTable {
    /// load a score file or every score file inside a directory, ranked by `total_score`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScoreError> {
        Self::load_with_term(path, DEFAULT_SCORE_TERM)
    }

    pub fn load_with_term(path: impl AsRef<Path>, score_term: &str) -> Result<Self, ScoreError> {
        let path = path.as_ref();

        let parsed = if path.is_file() {
            read_score_file(path)?
        } else if path.is_dir() {
            read_score_dir(path)?
        } else {
            return Err(ScoreError::MissingScoreFile(path.to_path_buf()));
        };

        Self::new(parsed.columns, parsed.rows, score_term)
    }

    /// build a table from already parsed rows, validating the identifier and score columns
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        score_term: &str,
    ) -> Result<Self, ScoreError> {
        // an empty directory yields a table without any schema, nothing to validate there
        if !columns.is_empty() {
            for required in [DECOY_COLUMN, score_term] {
                if !columns.iter().any(|column| column == required) {
                    return Err(ScoreError::MissingColumn(required.to_string()));
                }
            }
        }

        Ok(Self {
            columns,
            rows,
            score_term: score_term.to_string(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// default column used for ranking
    pub fn score_term(&self) -> &str {
        &self.score_term
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// identifier of the decoy in row `row`
    pub fn decoy(&self, row: usize) -> Option<String> {
        let index = self.column_index(DECOY_COLUMN)?;

        self.rows
            .get(row)
            .and_then(|row| row.get(index))
            .map(Value::to_string)
    }
}

fn read_score_file(path: &Path) -> Result<ParsedScores, ScoreError> {
    let content = fs::read_to_string(path).map_err(|source| ScoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = parse_scores(&content, path)?;
    debug!(path = ?path, rows = parsed.rows.len(), "Parsed score file");

    Ok(parsed)
}

fn read_score_dir(path: &Path) -> Result<ParsedScores, ScoreError> {
    let io_error = |source| ScoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    // sorted so concatenation order does not depend on the directory listing
    let files: Vec<PathBuf> = fs::read_dir(path)
        .map_err(io_error)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?
        .into_iter()
        .filter(|file| {
            file.is_file()
                && file
                    .file_name()
                    .map(|name| name.to_string_lossy().ends_with(SCORE_FILE_SUFFIX))
                    .unwrap_or(false)
        })
        .sorted()
        .collect();

    info!("Concatenating {} score files from {:?}", files.len(), path);

    let mut merged: Option<ParsedScores> = None;

    for file in files {
        let parsed = read_score_file(&file)?;

        match merged {
            None => merged = Some(parsed),
            Some(ref mut merged) => {
                if merged.columns != parsed.columns {
                    return Err(ScoreError::SchemaMismatch {
                        path: file,
                        expected: merged.columns.clone(),
                        found: parsed.columns,
                    });
                }

                merged.rows.extend(parsed.rows);
            }
        }
    }

    Ok(merged.unwrap_or(ParsedScores {
        columns: Vec::new(),
        rows: Vec::new(),
    }))
}
