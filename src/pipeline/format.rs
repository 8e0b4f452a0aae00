//! Structural markdown formatting.
//!
//! Three strategies, chosen by caller context:
//!
//! - [`format_line_blocks`] — geometry-driven, for line-box OCR output.
//!   The only structural signal per-line OCR gives us is vertical spacing,
//!   so paragraph breaks come from bounding-box gaps and nothing else.
//! - [`minimal_cleanup`] — for typed text and full-page recognizer
//!   markdown. The source may already carry structure; never re-interpret
//!   it, only normalise whitespace.
//! - [`heuristic_headings`] — whole-notebook assembly only: minimal cleanup
//!   plus short ALL-CAPS lines promoted to level-3 headings. Never applied
//!   to per-line OCR fragments.
//!
//! [`assemble_notebook`] stitches converted pages into one document with
//! YAML front-matter.

use crate::output::NotebookMetadata;
use crate::pipeline::recognize::OcrLine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

/// A vertical gap larger than this multiple of the current line's height is
/// a paragraph break. Compared against the *current* line height.
pub const PARAGRAPH_GAP_FACTOR: f32 = 1.5;

/// Heading heuristic: ALL-CAPS lines at or above this length stay body text.
const HEADING_MAX_LEN: usize = 50;

static RE_ORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s").unwrap());

/// Whether a line is a markdown/handwriting list item: `- `, `* `, `• `,
/// `1. `, `1) `.
pub fn is_list_item(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("- ") || t.starts_with("* ") || t.starts_with("• ") || RE_ORDERED_ITEM.is_match(t)
}

/// Geometry-driven formatting of line-box OCR output.
///
/// Lines are sorted by `bbox.top` ascending, then emitted with a blank line
/// wherever the vertical gap to the previous line exceeds
/// [`PARAGRAPH_GAP_FACTOR`] × the current line's height. Line content —
/// list markers included — passes through unchanged; per-line handwriting
/// OCR cannot reliably signal heading intent, so there is no heading
/// inference here.
pub fn format_line_blocks(lines: &[OcrLine]) -> String {
    let mut sorted: Vec<&OcrLine> = lines.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .top
            .partial_cmp(&b.bbox.top)
            .unwrap_or(Ordering::Equal)
    });

    let mut out: Vec<&str> = Vec::new();
    let mut prev_bottom = 0.0f32;

    for line in sorted {
        if line.text.is_empty() {
            continue;
        }
        let gap = line.bbox.top - prev_bottom;
        if prev_bottom > 0.0 && gap > PARAGRAPH_GAP_FACTOR * line.bbox.height {
            out.push("");
        }
        out.push(&line.text);
        prev_bottom = line.bbox.top + line.bbox.height;
    }

    out.join("\n")
}

/// Minimal cleanup of text that may already carry markdown structure.
///
/// Lines are trimmed, runs of blank lines collapse to one separator, and
/// everything else is preserved as-is.
pub fn minimal_cleanup(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if matches!(out.last(), Some(prev) if !prev.is_empty()) {
                out.push("");
            }
            continue;
        }
        out.push(line);
    }
    while out.last() == Some(&"") {
        out.pop();
    }
    out.join("\n")
}

/// Minimal cleanup plus heading promotion, for whole-notebook assembly.
///
/// A line that is entirely upper-case and under 50 characters becomes a
/// level-3 heading in title case. List items are never promoted — list
/// syntax survives assembly intact.
pub fn heuristic_headings(text: &str) -> String {
    minimal_cleanup(text)
        .lines()
        .map(|line| {
            if is_heading_candidate(line) {
                format!("### {}", title_case(line))
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_heading_candidate(line: &str) -> bool {
    if line.is_empty() || line.chars().count() >= HEADING_MAX_LEN || is_list_item(line) {
        return false;
    }
    // Entirely upper-case: at least one cased character, none lower-case.
    let has_cased = line.chars().any(|c| c.is_uppercase() || c.is_lowercase());
    has_cased && !line.chars().any(|c| c.is_lowercase())
}

fn title_case(line: &str) -> String {
    line.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assemble converted pages into one notebook document.
///
/// YAML front-matter, a top-level title heading, then each page through the
/// heuristic-heading strategy. `## Page N` headers appear only when the
/// notebook has more than one page.
pub fn assemble_notebook(meta: &NotebookMetadata, pages: &[&str]) -> String {
    let mut parts: Vec<String> = vec![front_matter(meta), format!("# {}", meta.title), String::new()];

    for (i, page_text) in pages.iter().enumerate() {
        if pages.len() > 1 {
            parts.push(format!("## Page {}", i + 1));
            parts.push(String::new());
        }
        parts.push(heuristic_headings(page_text));
        parts.push(String::new());
    }

    parts.join("\n")
}

fn front_matter(meta: &NotebookMetadata) -> String {
    format!(
        "---\ntitle: \"{}\"\nsource: tablet\nsynced: {}\npages: {}\n---\n",
        meta.title,
        meta.synced_at.to_rfc3339(),
        meta.page_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::recognize::BoundingBox;
    use chrono::{TimeZone, Utc};

    fn line(text: &str, top: f32, height: f32) -> OcrLine {
        OcrLine {
            text: text.into(),
            confidence: 95.0,
            bbox: BoundingBox {
                top,
                left: 0.1,
                height,
                width: 0.5,
            },
        }
    }

    // ── Geometry-driven strategy ─────────────────────────────────────────

    #[test]
    fn wide_gap_inserts_paragraph_break() {
        // Gap 0.08 > 1.5 × 0.02 ⇒ break.
        let md = format_line_blocks(&[line("First", 0.1, 0.02), line("Second", 0.2, 0.02)]);
        assert_eq!(md, "First\n\nSecond");
    }

    #[test]
    fn narrow_gap_keeps_lines_adjacent() {
        // Gap 0.0 ≤ 1.5 × 0.02 ⇒ no break.
        let md = format_line_blocks(&[line("First", 0.1, 0.02), line("Second", 0.12, 0.02)]);
        assert_eq!(md, "First\nSecond");
    }

    #[test]
    fn lines_are_sorted_by_top_before_formatting() {
        let md = format_line_blocks(&[line("below", 0.5, 0.02), line("above", 0.1, 0.02)]);
        assert!(md.find("above").unwrap() < md.find("below").unwrap());
    }

    #[test]
    fn line_content_passes_through_unchanged() {
        let md = format_line_blocks(&[
            line("- first item", 0.1, 0.02),
            line("• second item", 0.12, 0.02),
            line("MEETING NOTES", 0.14, 0.02),
        ]);
        // No heading inference, no marker rewriting.
        assert_eq!(md, "- first item\n• second item\nMEETING NOTES");
    }

    #[test]
    fn no_lines_formats_to_empty() {
        assert_eq!(format_line_blocks(&[]), "");
    }

    // ── Minimal cleanup strategy ─────────────────────────────────────────

    #[test]
    fn minimal_cleanup_collapses_blank_runs() {
        assert_eq!(minimal_cleanup("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn minimal_cleanup_trims_lines_and_trailing_blanks() {
        assert_eq!(minimal_cleanup("  hello  \nworld \n\n"), "hello\nworld");
        assert_eq!(minimal_cleanup("   "), "");
        assert_eq!(minimal_cleanup(""), "");
    }

    #[test]
    fn minimal_cleanup_preserves_existing_structure() {
        let text = "# Title\n\n- a\n- b";
        assert_eq!(minimal_cleanup(text), text);
    }

    // ── Heuristic-heading strategy ───────────────────────────────────────

    #[test]
    fn all_caps_short_line_becomes_heading() {
        let md = heuristic_headings("MEETING NOTES\nSome content here");
        assert_eq!(md, "### Meeting Notes\nSome content here");
    }

    #[test]
    fn long_all_caps_line_stays_body_text() {
        let long = "A".repeat(50);
        let md = heuristic_headings(&long);
        assert_eq!(md, long);
    }

    #[test]
    fn list_items_are_never_promoted() {
        assert_eq!(heuristic_headings("- TODO ITEM"), "- TODO ITEM");
        assert_eq!(heuristic_headings("1. FIRST STEP"), "1. FIRST STEP");
    }

    #[test]
    fn numbers_only_line_is_not_a_heading() {
        assert_eq!(heuristic_headings("2025"), "2025");
    }

    #[test]
    fn list_marker_detection() {
        assert!(is_list_item("- a"));
        assert!(is_list_item("* a"));
        assert!(is_list_item("• a"));
        assert!(is_list_item("1. a"));
        assert!(is_list_item("12) a"));
        assert!(!is_list_item("plain text"));
        assert!(!is_list_item("-not a list"));
        assert!(!is_list_item("3.14 is pi"));
    }

    // ── Notebook assembly ────────────────────────────────────────────────

    fn meta(title: &str, page_count: usize) -> NotebookMetadata {
        NotebookMetadata {
            title: title.into(),
            synced_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
            page_count,
        }
    }

    #[test]
    fn notebook_front_matter_and_page_headers() {
        let md = assemble_notebook(&meta("Test Notebook", 2), &["Hello world", "Page two content"]);
        assert!(md.contains("title: \"Test Notebook\""));
        assert!(md.contains("source: tablet"));
        assert!(md.contains("synced: 2025-01-01T12:00:00"));
        assert!(md.contains("pages: 2"));
        assert!(md.contains("# Test Notebook"));
        assert!(md.contains("## Page 1"));
        assert!(md.contains("Hello world"));
        assert!(md.contains("## Page 2"));
        assert!(md.contains("Page two content"));
    }

    #[test]
    fn single_page_notebook_has_no_page_header() {
        let md = assemble_notebook(&meta("Single Page", 1), &["Just one page"]);
        assert!(!md.contains("## Page 1"));
        assert!(md.contains("Just one page"));
    }

    #[test]
    fn assembly_applies_heading_heuristic_to_page_text() {
        let md = assemble_notebook(&meta("N", 1), &["MEETING NOTES\ncontent"]);
        assert!(md.contains("### Meeting Notes"));
    }
}
