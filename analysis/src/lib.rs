pub mod rank;


pub use rank::{best, top, RankedEntry};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RankError {
    #[error("Rank must be greater than 0")]
    InvalidRank,
    #[error("Column \"{column}\" of decoy {decoy} is not numeric")]
    NonNumeric { column: String, decoy: String },
}
