//! Subtitle search abstraction.
//!
//! This module provides a `SubtitleIndex` trait for querying a remote
//! subtitle index, the Thunder implementation, and helpers for ordering and
//! filtering the returned candidates.

mod filter;
mod thunder;
mod types;

pub use filter::{
    apply_filters, dedup_by_identity, search_items, sort_by_score_desc, SearchOptions,
    MAX_SEARCH_LIMIT,
};
pub use thunder::{ThunderClient, DEFAULT_BASE_URL};
pub use types::{compute_item_id, Candidate, RemoteError, SubtitleIndex};
