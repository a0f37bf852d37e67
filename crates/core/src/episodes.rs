//! Episode file listing for numbered series such as `第0001话 标题.mp4`.

use regex_lite::Regex;
use std::path::Path;

/// Whether `name` (trimmed) is an episode file.
pub fn match_episode_filename(pattern: &Regex, name: &str) -> bool {
    pattern.is_match(name.trim())
}

/// Episode number captured by the first group of `pattern`.
pub fn extract_episode_num(pattern: &Regex, name: &str) -> Option<u32> {
    pattern
        .captures(name.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Keep episode files, trimmed, sorted by episode number and then name.
/// `.git` entries are skipped.
pub fn filter_and_sort_episode_files<I, S>(pattern: &Regex, names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<(u32, String)> = names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| n != ".git" && match_episode_filename(pattern, n))
        .map(|n| (extract_episode_num(pattern, &n).unwrap_or(u32::MAX), n))
        .collect();
    out.sort();
    out.into_iter().map(|(_, n)| n).collect()
}

/// Write one name per line, newline terminated. Parent directories are
/// created.
pub fn write_episode_list(path: &Path, names: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = names.join("\n");
    if !names.is_empty() {
        text.push('\n');
    }
    std::fs::write(path, text)
}

/// File names in `dir` (non-recursive) that are episode files, sorted.
pub fn list_episode_files(pattern: &Regex, dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(filter_and_sort_episode_files(pattern, names))
}
