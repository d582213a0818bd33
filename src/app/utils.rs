// src/app/utils.rs
use std::cmp::Ordering;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Playable extensions (lowercase, no dot).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "mpeg4"];

static PAREN_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));
static BRACKET_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));

pub fn is_video_ext(p: &Path) -> bool {
    let ext = p
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// Turn a raw folder name into a search title.
///
/// Order matters: `(...)` groups, then `[...]` groups, then one trailing media
/// extension, then `.`/`_` become spaces, then trim.
/// `"The.Matrix.(1999).[1080p].mkv"` becomes `"The Matrix"`.
pub fn build_search_query(raw: &str) -> String {
    let no_parens = PAREN_GROUP.replace_all(raw, "");
    let no_brackets = BRACKET_GROUP.replace_all(&no_parens, "");
    let no_ext = strip_media_extension(&no_brackets);
    no_ext.replace(['.', '_'], " ").trim().to_string()
}

fn strip_media_extension(s: &str) -> &str {
    let lower = s.to_ascii_lowercase();
    for ext in VIDEO_EXTENSIONS {
        let suffix_len = ext.len() + 1;
        if lower.len() >= suffix_len
            && lower.ends_with(ext)
            && lower.as_bytes()[lower.len() - suffix_len] == b'.'
        {
            return &s[..s.len() - suffix_len];
        }
    }
    s
}

/// Card label: separators shown as spaces, nothing else dropped.
pub fn display_title(raw: &str) -> String {
    let spaced = raw.replace(['.', '_'], " ");
    let trimmed = spaced.trim();
    if trimmed.is_empty() {
        raw.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Case-insensitive alphabetical order, raw byte order breaks ties.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
