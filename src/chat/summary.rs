//! Summary excerpt selection.
//!
//! Only a short excerpt of the document is sent for summarisation: the
//! section that opens with an abstract, introduction or summary heading,
//! or the opening lines when no such heading exists.

use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(abstract|introduction|summary)\b").unwrap());

/// Lines kept from the first matching line onward.
pub const SECTION_LINES: usize = 10;

/// Lines kept from the top of the document when no section matches.
pub const FALLBACK_LINES: usize = 5;

/// Select the text that will be summarised.
///
/// Starts at the first line matching [`SECTION_MARKER`] and takes at most
/// [`SECTION_LINES`] contiguous lines; without a match, the first
/// [`FALLBACK_LINES`] lines. `#` characters are removed and the result is
/// trimmed.
pub fn select_excerpt(content: &str) -> String {
    let lines: Vec<&str> = content.trim().lines().collect();

    let selected = match lines.iter().position(|l| SECTION_MARKER.is_match(l)) {
        Some(start) => &lines[start..(start + SECTION_LINES).min(lines.len())],
        None => &lines[..FALLBACK_LINES.min(lines.len())],
    };

    selected.join("\n").replace('#', "").trim().to_string()
}
