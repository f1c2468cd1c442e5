//! Text normalisation for extracted page text and table cells.
//!
//! pdfium returns text with hard line breaks, runs of spaces from column
//! layout, and the occasional invisible code point (BOM, zero-width joiners,
//! soft hyphens). Each rule below is a pure `&str → String` pass.
//!
//! ## Rule Order
//!
//! Invisible characters go first so that a zero-width space between two
//! words cannot survive as a word boundary once whitespace is collapsed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise a page's raw text.
///
/// Returns `None` when nothing but whitespace remains, so empty pages emit no
/// text element.
pub fn clean_text(raw: &str) -> Option<String> {
    let s = remove_invisible_chars(raw);
    let s = collapse_whitespace(&s);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Normalise a table cell. Empty cells become `None`.
pub fn clean_cell(raw: &str) -> Option<String> {
    clean_text(raw)
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{FEFF}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{00AD}',
        ],
        "",
    )
}

// ── Rule 2: Collapse whitespace runs ────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_newlines_and_runs() {
        assert_eq!(
            clean_text("  Quarterly\n\nreport   for\t2024 \r\n").as_deref(),
            Some("Quarterly report for 2024")
        );
    }

    #[test]
    fn removes_bom_and_zero_width() {
        assert_eq!(
            clean_text("\u{FEFF}Hello\u{200B} world").as_deref(),
            Some("Hello world")
        );
        assert_eq!(clean_text("co\u{00AD}operate").as_deref(), Some("cooperate"));
    }

    #[test]
    fn whitespace_only_is_none() {
        assert_eq!(clean_text(""), None);
        assert_eq!(clean_text(" \n\t \u{FEFF} "), None);
        assert_eq!(clean_cell("   "), None);
    }
}
