use crate::RankError;
use decoy_ingest::{ScoreTable, DECOY_COLUMN};
use serde::Serialize;
use tracing::debug;

/// A decoy together with the value it was ranked by
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub decoy: String,
    pub score: f64,
}

/// return the `rank` lowest scoring decoys by `score_term`
///
/// Falls back to the table's own score term if `score_term` is `None` or not a column of the
/// table. Ties keep the order the rows were loaded in.
pub fn top(
    table: &ScoreTable,
    rank: usize,
    score_term: Option<&str>,
) -> Result<Vec<RankedEntry>, RankError> {
    if rank == 0 {
        return Err(RankError::InvalidRank);
    }

    if table.is_empty() {
        return Ok(Vec::new());
    }

    let term = match score_term {
        Some(term) if table.column_index(term).is_some() => term,
        Some(term) => {
            debug!(
                "Score term {term} not in table, falling back to {}",
                table.score_term()
            );
            table.score_term()
        }
        None => table.score_term(),
    };

    // both columns are validated when the table is built
    let (Some(score_index), Some(decoy_index)) =
        (table.column_index(term), table.column_index(DECOY_COLUMN))
    else {
        return Ok(Vec::new());
    };

    let mut entries = table
        .rows()
        .iter()
        .map(|row| {
            let decoy = row[decoy_index].to_string();

            match row[score_index].as_number() {
                Some(score) => Ok(RankedEntry { decoy, score }),
                None => Err(RankError::NonNumeric {
                    column: term.to_string(),
                    decoy,
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    // sort_by is stable
    entries.sort_by(|a, b| a.score.total_cmp(&b.score));
    entries.truncate(rank);

    Ok(entries)
}

/// the single lowest scoring decoy, `None` for an empty table
pub fn best(table: &ScoreTable) -> Result<Option<RankedEntry>, RankError> {
    Ok(top(table, 1, None)?.into_iter().next())
}
