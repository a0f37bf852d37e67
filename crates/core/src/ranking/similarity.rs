//! Filename similarity between a video and a candidate subtitle.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashSet;

static KNOWN_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(mp4|avi|mkv|mov|wmv|flv|webm|m4v|rmvb|rm|ts|m2ts|strm|srt|ass|ssa|sub)$")
        .unwrap()
});

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._\-\[\]()（）\s]+").unwrap());

const SHARED_YEAR_BONUS: f64 = 10.0;
const YEAR_MISMATCH_PENALTY: f64 = 20.0;
const CONTAINMENT_FLOOR: f64 = 80.0;
const COMPACT_CONTAINMENT_FLOOR: f64 = 85.0;

/// Normalise a file name for comparison.
///
/// Lowercases, strips one known video/subtitle extension, turns separator
/// runs into single spaces and splits letter/digit boundaries so that
/// `S01E02` becomes `s 01 e 02`.
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = KNOWN_EXTENSION.replace(&lower, "");
    let spaced = SEPARATORS.replace_all(&stripped, " ");

    let mut out = String::with_capacity(spaced.len() + 8);
    let mut prev: Option<char> = None;
    for c in spaced.chars() {
        if let Some(p) = prev {
            let letter_digit = p.is_ascii_lowercase() && c.is_ascii_digit();
            let digit_letter = p.is_ascii_digit() && c.is_ascii_lowercase();
            if letter_digit || digit_letter {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn years(tokens: &HashSet<&str>) -> HashSet<u16> {
    tokens
        .iter()
        .filter(|t| t.len() == 4 && (t.starts_with("19") || t.starts_with("20")))
        .filter_map(|t| t.parse().ok())
        .collect()
}

/// Score in `[0, 100]` for how well `candidate_name` matches `source_name`.
///
/// Token overlap is measured as recall against the source tokens. A shared
/// year adds a bonus, disjoint years a penalty, and containment of one name
/// in the other sets a floor. Names that normalise to nothing score 0.
pub fn filename_similarity(source_name: &str, candidate_name: &str) -> f64 {
    let source = normalize_name(source_name);
    let candidate = normalize_name(candidate_name);

    if source.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if source == candidate {
        return 100.0;
    }

    let source_tokens: HashSet<&str> = source.split(' ').collect();
    let candidate_tokens: HashSet<&str> = candidate.split(' ').collect();
    let common = source_tokens.intersection(&candidate_tokens).count();
    let mut score = common as f64 / source_tokens.len() as f64 * 100.0;

    let source_years = years(&source_tokens);
    let candidate_years = years(&candidate_tokens);
    if !source_years.is_empty() && !candidate_years.is_empty() {
        if source_years.is_disjoint(&candidate_years) {
            score -= YEAR_MISMATCH_PENALTY;
        } else {
            score += SHARED_YEAR_BONUS;
        }
    }

    if source.contains(&candidate) || candidate.contains(&source) {
        score = score.max(CONTAINMENT_FLOOR);
    }

    let source_compact = source.replace(' ', "");
    let candidate_compact = candidate.replace(' ', "");
    if source_compact == candidate_compact {
        score = 100.0;
    } else if source_compact.contains(&candidate_compact) || candidate_compact.contains(&source_compact)
    {
        score = score.max(COMPACT_CONTAINMENT_FLOOR);
    }

    score.clamp(0.0, 100.0)
}
