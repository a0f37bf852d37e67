//! Choosing which search results to download.

use std::collections::HashSet;
use thiserror::Error;

use crate::searcher::{compute_item_id, Candidate, MAX_SEARCH_LIMIT};

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Invalid selection '{0}': expected indices like 1,3,5 or 1-4,9")]
    InvalidSpec(String),

    #[error("Selection input failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One selected candidate with its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedItem {
    pub id: String,
    pub candidate: Candidate,
}

/// Selected candidates in selection order, at most one per identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    items: Vec<SelectedItem>,
    ids: HashSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `candidate` unless its identity is already selected. Returns
    /// whether it was added.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        let id = candidate.id();
        if !self.ids.insert(id.clone()) {
            return false;
        }
        self.items.push(SelectedItem { id, candidate });
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedItem> {
        self.items.iter()
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.items.iter().map(|s| s.candidate.clone()).collect()
    }
}

impl FromIterator<Candidate> for Selection {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let mut selection = Self::new();
        for candidate in iter {
            selection.insert(candidate);
        }
        selection
    }
}

/// Chooses candidates for one query.
pub trait Selector {
    fn select(&self, query: &str, items: &[Candidate]) -> Result<Selection, SelectError>;
}

/// Parse `"1,3,5"`, `"1-4,9"` or `"4-1"` into unique ascending indices.
///
/// Blank parts are ignored and reversed ranges are normalised. Ranges stop
/// at [`MAX_SEARCH_LIMIT`], since no result list is longer.
pub fn parse_select_spec(spec: &str) -> Result<Vec<usize>, SelectError> {
    let invalid = || SelectError::InvalidSpec(spec.to_string());
    let parse = |s: &str| s.trim().parse::<usize>().map_err(|_| invalid());

    let mut out = std::collections::BTreeSet::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                let (a, b) = (parse(a)?, parse(b)?);
                let (lo, hi) = (a.min(b), a.max(b).min(MAX_SEARCH_LIMIT));
                if lo <= hi {
                    out.extend(lo..=hi);
                }
            }
            None => {
                out.insert(parse(part)?);
            }
        }
    }
    Ok(out.into_iter().collect())
}

/// Non-interactive selection by zero-based index or by identity.
///
/// When ids are given they take precedence: matching candidates are
/// returned in id order. Otherwise indices are applied in the given order
/// and out-of-range indices are skipped.
#[derive(Debug, Clone, Default)]
pub struct DeterministicSelector {
    indices: Vec<usize>,
    ids: Vec<String>,
}

impl DeterministicSelector {
    pub fn new(indices: Vec<usize>, ids: Vec<String>) -> Self {
        Self { indices, ids }
    }

    pub fn by_indices(indices: Vec<usize>) -> Self {
        Self::new(indices, Vec::new())
    }

    pub fn by_ids(ids: Vec<String>) -> Self {
        Self::new(Vec::new(), ids)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.ids.is_empty()
    }
}

impl Selector for DeterministicSelector {
    fn select(&self, _query: &str, items: &[Candidate]) -> Result<Selection, SelectError> {
        if !self.ids.is_empty() {
            return Ok(self
                .ids
                .iter()
                .filter_map(|id| items.iter().find(|c| &c.id() == id))
                .cloned()
                .collect());
        }

        Ok(self
            .indices
            .iter()
            .filter_map(|&i| items.get(i))
            .cloned()
            .collect())
    }
}

/// How a single download picks its candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleChoice {
    Id(String),
    Index(usize),
    /// The first (highest scored) item.
    Best,
    Nothing,
}

/// Apply `choice` to `items`, already sorted best first.
pub fn choose_one<'a>(items: &'a [Candidate], choice: &SingleChoice) -> Option<&'a Candidate> {
    match choice {
        SingleChoice::Id(id) => items.iter().find(|c| compute_item_id(&c.gcid, &c.cid) == *id),
        SingleChoice::Index(i) => items.get(*i),
        SingleChoice::Best => items.first(),
        SingleChoice::Nothing => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn items() -> Vec<Candidate> {
        vec![
            fixtures::candidate("a", "A"),
            fixtures::candidate("b", "B"),
            fixtures::candidate("c", "C"),
        ]
    }

    fn names(selection: &Selection) -> Vec<String> {
        selection.iter().map(|s| s.candidate.name.clone()).collect()
    }

    #[test]
    fn test_parse_select_spec() {
        assert_eq!(parse_select_spec("1,3,5").unwrap(), vec![1, 3, 5]);
        assert_eq!(parse_select_spec("1-4,9").unwrap(), vec![1, 2, 3, 4, 9]);
        assert_eq!(parse_select_spec("3-1").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_select_spec(" 5, ,2,5 ").unwrap(), vec![2, 5]);
        assert!(parse_select_spec("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_select_spec_bounds_huge_ranges() {
        let all = parse_select_spec("0-4000000000").unwrap();
        assert_eq!(all.len(), MAX_SEARCH_LIMIT + 1);
        assert_eq!(all.last(), Some(&MAX_SEARCH_LIMIT));

        assert!(parse_select_spec("4000000000-4000000005").unwrap().is_empty());
        assert_eq!(parse_select_spec("3,999999").unwrap(), vec![3, 999999]);
    }

    #[test]
    fn test_parse_select_spec_rejects_garbage() {
        assert!(matches!(parse_select_spec("1,x"), Err(SelectError::InvalidSpec(_))));
        assert!(parse_select_spec("1-").is_err());
        assert!(parse_select_spec("-2").is_err());
    }

    #[test]
    fn test_indices_keep_given_order_and_skip_out_of_range() {
        let selector = DeterministicSelector::by_indices(vec![2, 7, 0]);
        let selection = selector.select("q", &items()).unwrap();
        assert_eq!(names(&selection), vec!["C", "A"]);
    }

    #[test]
    fn test_ids_keep_id_order_and_take_precedence() {
        let all = items();
        let selector = DeterministicSelector::new(
            vec![0],
            vec![all[2].id(), "missing".to_string(), all[1].id()],
        );
        let selection = selector.select("q", &all).unwrap();
        assert_eq!(names(&selection), vec!["C", "B"]);
    }

    #[test]
    fn test_selection_ignores_repeated_identity() {
        let selector = DeterministicSelector::by_indices(vec![1, 1, 0]);
        let selection = selector.select("q", &items()).unwrap();
        assert_eq!(selection.len(), 2);

        let mut dup = fixtures::candidate("a", "A again");
        dup.score = 9.0;
        let mut selection = Selection::new();
        assert!(selection.insert(fixtures::candidate("a", "A")));
        assert!(!selection.insert(dup));
        assert_eq!(names(&selection), vec!["A"]);
    }

    #[test]
    fn test_choose_one() {
        let all = items();
        assert_eq!(choose_one(&all, &SingleChoice::Best).unwrap().name, "A");
        assert_eq!(choose_one(&all, &SingleChoice::Index(1)).unwrap().name, "B");
        assert!(choose_one(&all, &SingleChoice::Index(3)).is_none());
        assert_eq!(choose_one(&all, &SingleChoice::Id(all[2].id())).unwrap().name, "C");
        assert!(choose_one(&all, &SingleChoice::Nothing).is_none());
        assert!(choose_one(&[], &SingleChoice::Best).is_none());
    }
}
