//! Filesystem-safe naming and collision avoidance.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::searcher::Candidate;

use super::DownloadError;

/// Maximum disambiguator tried before giving up on a name.
pub const MAX_UNIQUE_ATTEMPTS: usize = 10_000;

/// Length cap for display-name components.
pub const NAME_MAX_LEN: usize = 120;
/// Length cap for extension components.
pub const EXT_MAX_LEN: usize = 10;
/// Length cap for per-query directory names.
pub const QUERY_DIR_MAX_LEN: usize = 80;

/// How a taken file name is disambiguated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UniqueNameStyle {
    /// `name (1).srt`
    #[default]
    Parenthesized,
    /// `name_1.srt`
    Underscore,
}

impl UniqueNameStyle {
    fn apply(self, stem: &str, suffix: &str, n: usize) -> String {
        match self {
            Self::Parenthesized => format!("{} ({}){}", stem, n, suffix),
            Self::Underscore => format!("{}_{}{}", stem, n, suffix),
        }
    }
}

/// Make a single filesystem-safe path component.
///
/// Control characters are removed, path separators and characters reserved
/// on Windows become `_`, whitespace runs collapse to one space. An empty
/// result becomes `untitled`. The result is at most `max_len` characters.
pub fn sanitize_component(value: &str, max_len: usize) -> String {
    let stripped: String = value.chars().filter(|c| !is_control(*c)).collect();

    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;
    for c in stripped.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(match c {
            '\\' | '/' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            other => other,
        });
    }

    if out.is_empty() {
        out.push_str("untitled");
    }

    out.chars()
        .take(max_len)
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}')
}

/// File name a candidate is saved under: `{name}.{ext}`, `srt` when the
/// index gave no extension.
pub fn candidate_file_name(candidate: &Candidate) -> String {
    let ext = if candidate.ext.trim().is_empty() {
        "srt"
    } else {
        candidate.ext.as_str()
    };
    format!(
        "{}.{}",
        sanitize_component(&candidate.name, NAME_MAX_LEN),
        sanitize_component(ext, EXT_MAX_LEN)
    )
}

fn split_name(path: &Path) -> (PathBuf, String, String) {
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (parent, stem, suffix)
}

/// Iterate over `path` followed by its disambiguated variants.
fn name_variants(path: &Path, style: UniqueNameStyle) -> impl Iterator<Item = PathBuf> + '_ {
    let (parent, stem, suffix) = split_name(path);
    std::iter::once(path.to_path_buf()).chain(
        (1..MAX_UNIQUE_ATTEMPTS).map(move |n| parent.join(style.apply(&stem, &suffix, n))),
    )
}

/// Return `path` if nothing exists there yet, otherwise the first free
/// disambiguated variant.
pub fn ensure_unique_path(path: &Path, style: UniqueNameStyle) -> Result<PathBuf, DownloadError> {
    name_variants(path, style)
        .find(|p| !p.exists())
        .ok_or_else(|| DownloadError::NoUniqueName(path.to_path_buf()))
}

/// Create the directory (and parents) if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), DownloadError> {
    std::fs::create_dir_all(dir).map_err(|source| DownloadError::DirectoryCreationFailed {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `bytes` to `path` or its first free variant.
///
/// Files are opened with create-new semantics, so a name claimed by another
/// writer between the existence check and the write is skipped rather than
/// overwritten.
pub fn write_unique(
    path: &Path,
    bytes: &[u8],
    style: UniqueNameStyle,
) -> Result<PathBuf, DownloadError> {
    for candidate in name_variants(path, style) {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(bytes).map_err(|e| io_error(&candidate, e))?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(io_error(&candidate, e)),
        }
    }
    Err(DownloadError::NoUniqueName(path.to_path_buf()))
}

/// Write `bytes` to `path`, replacing any existing file.
pub fn write_overwrite(path: &Path, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
    std::fs::write(path, bytes).map_err(|e| io_error(path, e))?;
    Ok(path.to_path_buf())
}

fn io_error(path: &Path, source: std::io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.to_path_buf(),
        source,
    }
}
