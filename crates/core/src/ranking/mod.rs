//! Candidate ranking: filename similarity plus optional quality scores.

mod ranker;
mod similarity;

pub use ranker::{rank_by_filename, CandidateRanker, RankOutcome, RankedCandidate};
pub use similarity::{filename_similarity, normalize_name};
