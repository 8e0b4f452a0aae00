//! Prompts for the vision recognition collaborator.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the markers or the extraction
//!    rules requires editing exactly one place, and the classifier constants
//!    in [`crate::pipeline::classify`] reference the same tokens.
//!
//! 2. **Testability** — unit tests can import and inspect prompts directly
//!    without spinning up a real vision model.

/// Marker the recognizer is instructed to append when the page contains
/// drawing content. Stripped (and turned into a flag) by the classifier.
pub const HAS_DRAWINGS_MARKER: &str = "[HAS_DRAWINGS]";

/// Sentinel the recognizer is instructed to return when the page contains
/// no readable text at all.
pub const NO_TEXT_SENTINEL: &str = "NO_TEXT_FOUND";

/// Prompt for the full-page transcription call.
pub const EXTRACTION_PROMPT: &str = r#"Extract all handwritten and typed text from this image.

Return only the extracted text as clean markdown, preserving the document structure:
- Use headings (##) only if the text clearly indicates section titles
- Preserve lists (-, *, 1.) if present
- Separate paragraphs with blank lines

Do not include any explanations, commentary, or descriptions of the image.
If the image is blank or contains no readable text, return exactly NO_TEXT_FOUND.
If the image also contains drawings, sketches, or diagrams, append [HAS_DRAWINGS] on its own line after the extracted text (or after NO_TEXT_FOUND)."#;

/// Prompt for the follow-up illustration-caption call.
pub const CAPTION_PROMPT: &str = "Describe the drawing in this image in five words or fewer. \
Respond with only the description, no punctuation or commentary.";
