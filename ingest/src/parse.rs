use crate::{table::Value, ScoreError, DECOY_COLUMN};
use std::path::Path;
use tracing::trace;

/// marker line written by the binary above the header
const BANNER_PREFIX: &str = "SEQUENCE:";
/// leading marker column on the header and on every row
const ROW_MARKER: &str = "SCORE:";

/// Raw content of a single score file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScores {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

fn fields(line: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = line.split_whitespace().collect();

    if fields.first() == Some(&ROW_MARKER) {
        fields.remove(0);
    }

    fields
}

/// parse the content of one score file
///
/// Banner lines are skipped wherever they show up, the first remaining line is the header and
/// repeated headers (files appended to by several runs) are dropped. Every row must carry exactly
/// as many fields as the header.
pub fn parse_scores(content: &str, path: &Path) -> Result<ParsedScores, ScoreError> {
    let mut columns: Option<Vec<String>> = None;
    // decoy ids are names even when they look numeric
    let mut decoy_index = None;
    let mut rows = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() || line.starts_with(BANNER_PREFIX) {
            continue;
        }

        let row = fields(line);

        match columns {
            None => {
                decoy_index = row.iter().position(|field| *field == DECOY_COLUMN);
                columns = Some(row.iter().map(|field| field.to_string()).collect());
            }
            Some(ref header) => {
                if row.iter().copied().eq(header.iter().map(String::as_str)) {
                    trace!(line = number + 1, "Skipping repeated header");
                    continue;
                }

                if row.len() != header.len() {
                    return Err(ScoreError::MalformedRow {
                        path: path.to_path_buf(),
                        line: number + 1,
                        expected: header.len(),
                        found: row.len(),
                    });
                }

                rows.push(
                    row.into_iter()
                        .enumerate()
                        .map(|(index, field)| match decoy_index {
                            Some(decoy) if decoy == index => Value::Text(field.to_string()),
                            _ => Value::parse(field),
                        })
                        .collect(),
                );
            }
        }
    }

    match columns {
        Some(columns) => Ok(ParsedScores { columns, rows }),
        None => Err(ScoreError::MissingHeader(path.to_path_buf())),
    }
}
