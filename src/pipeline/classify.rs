//! Classification of the vision recognizer's free-form reply.
//!
//! The recognizer is a non-deterministic vision model, not a
//! structured-output engine. Instead of hoping it obeys the prompt, this
//! boundary converts its known failure modes into a reliable signal:
//!
//! - the literal `[HAS_DRAWINGS]` marker becomes a boolean flag,
//! - the `NO_TEXT_FOUND` sentinel becomes an empty transcription,
//! - a reply that *describes* the image instead of transcribing it
//!   ("I can see a sketch of …") is forced to an empty transcription.
//!
//! The last case is a defined outcome, not an error.

use crate::prompts::{HAS_DRAWINGS_MARKER, NO_TEXT_SENTINEL};

/// Phrases that signal the recognizer described the image rather than
/// transcribing it. Configuration data, not control flow: an ordered set of
/// case-insensitive substrings, tunable independently of the classifier.
pub const NON_TEXT_INDICATORS: &[&str] = &[
    "no text found",
    "i can see",
    "appears to be",
    "there is no",
    "cannot extract",
    "cannot make out",
    "no text content",
    "no readable text",
];

/// Outcome of classifying one recognizer reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The extracted text; empty when the page has no readable text or the
    /// recognizer produced a description instead of a transcription.
    pub text: String,
    /// Whether the recognizer flagged drawing content on the page.
    pub has_drawings: bool,
}

/// Classify a raw recognizer reply into `(text, drawing flag)`.
pub fn classify(raw: &str) -> Classification {
    let has_drawings = raw.contains(HAS_DRAWINGS_MARKER);
    let cleaned = raw.replace(HAS_DRAWINGS_MARKER, "");
    let cleaned = cleaned.trim();

    if cleaned == NO_TEXT_SENTINEL {
        return Classification {
            text: String::new(),
            has_drawings,
        };
    }

    let lowered = cleaned.to_lowercase();
    if NON_TEXT_INDICATORS.iter().any(|p| lowered.contains(p)) {
        return Classification {
            text: String::new(),
            has_drawings,
        };
    }

    Classification {
        text: cleaned.to_string(),
        has_drawings,
    }
}

/// Wrap a raw illustration caption for inclusion in markdown output:
/// lower-cased, trimmed, `[illustration: …]`.
pub fn illustration_tag(caption: &str) -> String {
    format!("[illustration: {}]", caption.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_text_passes_through_verbatim() {
        let c = classify("Hello world");
        assert_eq!(c.text, "Hello world");
        assert!(!c.has_drawings);

        let c = classify("# My Notes\n- Item 1");
        assert_eq!(c.text, "# My Notes\n- Item 1");
        assert!(!c.has_drawings);
    }

    #[test]
    fn no_text_sentinel_yields_empty() {
        let c = classify("NO_TEXT_FOUND");
        assert_eq!(c.text, "");
        assert!(!c.has_drawings);
    }

    #[test]
    fn drawings_marker_sets_flag_and_is_stripped() {
        let c = classify("NO_TEXT_FOUND\n[HAS_DRAWINGS]");
        assert_eq!(c.text, "");
        assert!(c.has_drawings);
    }

    #[test]
    fn marker_after_real_text_keeps_the_text() {
        let c = classify("# My Notes\n\nSome text here\n[HAS_DRAWINGS]");
        assert_eq!(c.text, "# My Notes\n\nSome text here");
        assert!(c.has_drawings);
    }

    #[test]
    fn descriptive_replies_force_empty_text() {
        let descriptions = [
            "I can see this appears to be a simple line drawing or sketch.",
            "I cannot make out any readable text in this image.",
            "This appears to be a drawing with some geometric shapes.",
            "There is no readable text in this image.",
            "The image contains no text content to extract.",
        ];
        for desc in descriptions {
            let c = classify(desc);
            assert_eq!(c.text, "", "should filter: {desc}");
        }
    }

    #[test]
    fn indicator_match_is_case_insensitive() {
        let c = classify("I CAN SEE a sketch");
        assert_eq!(c.text, "");
        let c = classify("notes mention that i can see a sketch later");
        assert_eq!(c.text, "");
    }

    #[test]
    fn illustration_tag_lowercases_and_wraps() {
        assert_eq!(illustration_tag("Smiling Face"), "[illustration: smiling face]");
        assert_eq!(illustration_tag("  Sad Robot Face \n"), "[illustration: sad robot face]");
    }
}
