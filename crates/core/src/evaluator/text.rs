//! Subtitle decoding and dialogue text extraction.

use encoding_rs::{Encoding, BIG5, GB18030};
use std::borrow::Cow;
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Legacy encodings tried, in order, when the bytes are not UTF-8.
/// GB18030 decodes GBK and GB2312 as well.
const LEGACY_ENCODINGS: &[&Encoding] = &[GB18030, BIG5];

pub(crate) fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_private_use(c: char) -> bool {
    ('\u{e000}'..='\u{f8ff}').contains(&c)
}

/// Decode with the first legacy encoding that yields clean Chinese text:
/// no malformed sequences, no private-use code points and at least one
/// CJK ideograph.
fn decode_legacy(bytes: &[u8]) -> Option<String> {
    LEGACY_ENCODINGS.iter().find_map(|encoding| {
        let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
        let clean = text.chars().any(is_cjk) && !text.chars().any(is_private_use);
        if !clean {
            return None;
        }
        debug!(encoding = encoding.name(), "Decoded subtitle from legacy encoding");
        Some(text.into_owned())
    })
}

/// Decode subtitle bytes to text.
///
/// UTF-8 (with or without a BOM) is used as is. Otherwise GBK/GB18030 and
/// then Big5 are tried; if neither gives clean Chinese text the bytes are
/// decoded as lossy UTF-8.
pub fn decode_subtitle_bytes(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    match decode_legacy(bytes) {
        Some(text) => Cow::Owned(text),
        None => String::from_utf8_lossy(bytes),
    }
}

/// Convert subtitle bytes in a legacy Chinese encoding to UTF-8.
///
/// UTF-8 input and bytes in no recognised encoding are returned unchanged.
pub fn to_utf8_bytes(bytes: &[u8]) -> Cow<'_, [u8]> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if std::str::from_utf8(body).is_ok() {
        return Cow::Borrowed(bytes);
    }
    match decode_legacy(body) {
        Some(text) => Cow::Owned(text.into_bytes()),
        None => Cow::Borrowed(bytes),
    }
}

/// Guess the subtitle format from its content: `ass`, `ssa` or `srt`.
pub fn detect_subtitle_format(bytes: &[u8]) -> &'static str {
    let text = decode_subtitle_bytes(bytes);
    let head = text.trim_start();
    if head.starts_with("[Script Info]") {
        "ass"
    } else if head.starts_with("{\\") {
        "ssa"
    } else {
        "srt"
    }
}

/// Extract dialogue text, one line per cue line.
pub fn extract_text(content: &str, format_hint: &str) -> String {
    let format = format_hint.trim().trim_start_matches('.').to_ascii_lowercase();
    match format.as_str() {
        "ass" | "ssa" => extract_text_from_ass(content),
        _ => extract_text_from_srt(content),
    }
}

/// SRT-like content: drop blank lines, cue numbers and timing lines.
pub fn extract_text_from_srt(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.chars().all(|c| c.is_ascii_digit()))
        .filter(|line| !line.contains("-->"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// ASS/SSA content: the text field of `Dialogue:` lines in `[Events]`,
/// with override blocks removed and `\N` turned into line breaks.
pub fn extract_text_from_ass(content: &str) -> String {
    let mut out = Vec::new();
    let mut in_events = false;

    for line in content.lines().map(str::trim) {
        if line.starts_with("[Events]") {
            in_events = true;
            continue;
        }
        if !in_events {
            continue;
        }
        if line.starts_with('[') {
            break;
        }
        let Some(rest) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        let Some(text) = rest.splitn(10, ',').nth(9) else {
            continue;
        };
        let text = strip_override_blocks(text).replace("\\N", "\n");
        let text = text.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
    }

    out.join("\n")
}

fn strip_override_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        match rest[start..].find('}') {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + len + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}
