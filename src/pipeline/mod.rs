//! Pipeline stages for page-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch recognition collaborator) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ decode ──▶ raster ──▶ recognize ──▶ classify ──▶ format ──▶ merge
//! (scene)   (blocks)   (PNG)      (VLM/OCR)     (clean)      (markdown)  (page result)
//! ```
//!
//! 1. [`decode`]    — parse raw scene bytes into a canonical [`decode::SceneDocument`];
//!    malformed input becomes an empty document, never an error
//! 2. [`raster`]    — draw the document's strokes onto a fixed-size white
//!    canvas and PNG-encode it
//! 3. [`recognize`] — collaborator traits plus the bundled VLM-backed
//!    recognizer; the only stage with network I/O
//! 4. [`classify`]  — convert the vision model's free-form reply into a
//!    reliable (text, drawing-flag) pair
//! 5. [`format`]    — structural markdown formatting (geometry-driven,
//!    minimal cleanup, heuristic headings) and notebook assembly
//! 6. [`merge`]     — the per-page state machine that decides which paths
//!    run and merges typed + handwritten content with a confidence score

pub mod classify;
pub mod decode;
pub mod format;
pub mod merge;
pub mod raster;
pub mod recognize;
