//! Human and machine readable output.

use serde_json::Value;

use subgrab_core::history::HistoryEntry;
use subgrab_core::{metrics, Candidate};

const NAME_WIDTH: usize = 60;

/// Candidate as JSON with its identity added under `id`.
pub fn candidate_json(candidate: &Candidate) -> Value {
    let mut value = serde_json::to_value(candidate).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("id".to_string(), Value::String(candidate.id()));
    }
    value
}

pub fn candidates_json(items: &[Candidate]) -> Value {
    Value::Array(items.iter().map(candidate_json).collect())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Table of candidates with zero-based positions.
pub fn candidate_table(items: &[Candidate]) -> String {
    let mut out = format!(
        "{:>3}  {:>6}  {:<4}  {:<12}  {}\n",
        "#", "score", "ext", "languages", "name"
    );
    for (i, c) in items.iter().enumerate() {
        let mut name = c.name.clone();
        if !c.extra_name.trim().is_empty() {
            name.push_str(" · ");
            name.push_str(c.extra_name.trim());
        }
        out.push_str(&format!(
            "{:>3}  {:>6.2}  {:<4}  {:<12}  {}\n",
            i,
            c.score,
            truncate(&c.ext, 4),
            truncate(&c.languages.join(","), 12),
            truncate(&name, NAME_WIDTH)
        ));
    }
    out
}

pub fn history_table(entries: &[HistoryEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let source = entry
            .source
            .map(|s| match s {
                subgrab_core::HistorySource::Watcher => "watcher",
                subgrab_core::HistorySource::Smb => "smb",
            })
            .unwrap_or("manual");
        out.push_str(&format!(
            "{}  {:<8}  {}  ({})\n",
            entry.time, source, entry.name, entry.path
        ));
    }
    out
}

/// Counters collected during this run, Prometheus text format.
pub fn metrics_report() -> String {
    format!("# subgrab metrics\n{}", metrics::gather_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use subgrab_core::testing::fixtures;

    #[test]
    fn test_candidate_json_has_id() {
        let c = fixtures::candidate("g", "Name");
        let json = candidate_json(&c);
        assert_eq!(json["id"], c.id());
        assert_eq!(json["name"], "Name");
        assert_eq!(json["gcid"], "g");
    }

    #[test]
    fn test_table_rows_are_zero_based() {
        let items = vec![
            fixtures::candidate("a", "First"),
            fixtures::candidate("b", "Second"),
        ];
        let table = candidate_table(&items);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].trim_start().starts_with("0 "));
        assert!(lines[2].contains("Second"));
    }

    #[test]
    fn test_truncate_long_names() {
        let long = "x".repeat(100);
        assert_eq!(truncate(&long, 10).chars().count(), 10);
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_metrics_report_lists_counters() {
        metrics::DOWNLOADS_COMPLETED.inc();
        metrics::SEARCHES.with_label_values(&["ok"]).inc();

        let report = metrics_report();
        assert!(report.starts_with("# subgrab metrics\n"));
        assert!(report.contains("subgrab_downloads_completed_total"));
        assert!(report.contains("subgrab_searches_total{result=\"ok\"}"));
    }
}
