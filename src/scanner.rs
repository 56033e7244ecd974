//! Content scanner: pure text checks over a message body.
//!
//! - Line segmentation (trimmed, blank lines dropped)
//! - Level-1 heading + at least one body line
//! - Whole-token, case-insensitive banned word matching
//! - Markdown `[label](target)` link extraction

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// First line must start with a single `#` followed by a space.
static LEVEL1_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*# ").expect("heading pattern"));

/// `[label](target)`, non-greedy on both parts. Also matches `![alt](src)`.
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").expect("link pattern"));

/// Split a body into trimmed, non-empty lines.
pub fn segment_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check that the segmented body has a level-1 heading and a body line.
pub fn check_structure(lines: &[String]) -> Result<()> {
    let Some(first) = lines.first() else {
        return Err(Error::MalformedContent("message body is empty".into()));
    };
    if !LEVEL1_HEADING.is_match(first) {
        return Err(Error::MalformedContent("missing level-1 heading".into()));
    }
    if lines.len() < 2 {
        return Err(Error::MalformedContent("missing body paragraph".into()));
    }
    Ok(())
}

/// Segment and structurally validate a body in one step.
pub fn parse_body(body: &str) -> Result<Vec<String>> {
    let lines = segment_lines(body);
    check_structure(&lines)?;
    Ok(lines)
}

/// Return the tokens of `line` that are banned, in first-seen order, or
/// `None` when nothing matched. `banned` must already be lowercased.
pub fn match_banned_words(line: &str, banned: &HashSet<String>) -> Option<Vec<String>> {
    let mut seen = HashSet::new();
    let matched: Vec<String> = line
        .split_whitespace()
        .filter(|token| {
            let lower = token.to_lowercase();
            banned.contains(&lower) && seen.insert(lower)
        })
        .map(str::to_string)
        .collect();

    if matched.is_empty() { None } else { Some(matched) }
}

/// Lowercase a banned word list into a lookup set.
pub fn banned_set<S: AsRef<str>>(words: &[S]) -> HashSet<String> {
    words
        .iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// A markdown link found on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub label: String,
    pub target: String,
}

impl Link {
    /// Whether the target points at a remote http(s) resource.
    pub fn is_external(&self) -> bool {
        is_external(&self.target)
    }
}

/// Whether a line contains at least one markdown link.
pub fn has_link(line: &str) -> bool {
    MARKDOWN_LINK.is_match(line)
}

/// Every `[label](target)` on the line, in order of appearance.
pub fn extract_links(line: &str) -> Vec<Link> {
    MARKDOWN_LINK
        .captures_iter(line)
        .map(|caps| Link {
            label: caps[1].to_string(),
            target: caps[2].trim().to_string(),
        })
        .collect()
}

/// True for `http://` and `https://` targets, case-insensitively.
pub fn is_external(target: &str) -> bool {
    let lower = target.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
