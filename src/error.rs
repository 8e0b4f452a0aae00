//! Error types for the ink2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Ink2MdError`] — **Fatal**: the conversion cannot proceed at all
//!   (empty batch, batch over the request limit, bad configuration).
//!   Returned as `Err(Ink2MdError)` from the top-level `convert*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (recognizer call
//!   error, page over the size limit) but all other pages are fine. Collected
//!   into [`crate::output::BatchOutput::failed_pages`] so callers can inspect
//!   partial success rather than losing the whole batch to one bad page.
//!
//! Note what is deliberately *not* an error: malformed scene bytes are
//! recovered inside the decoder as an empty document, and a recognizer
//! describing an image instead of transcribing it is a defined empty-text
//! outcome. Neither ever reaches these types.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ink2md library.
///
/// Page-level failures use [`PageError`] and are reported through
/// [`crate::output::BatchOutput::failed_pages`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Ink2MdError {
    // ── Request errors ───────────────────────────────────────────────────
    /// The batch contained no pages at all.
    #[error("No pages provided")]
    NoPages,

    /// The batch exceeds the per-request page limit.
    #[error("Too many pages: {count} (max {max})")]
    TooManyPages { count: usize, max: usize },

    // ── Recognizer errors ────────────────────────────────────────────────
    /// The named vision provider could not be initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page in the batch failed; output would be empty.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── I/O errors ───────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which of the recognition collaborator calls failed for a page.
///
/// The two-call pattern (transcribe, then conditionally caption) is explicit
/// sequential composition; keeping the stage in the error preserves failure
/// attribution per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RecognitionStage {
    /// The full-page vision transcription call.
    Transcription,
    /// The follow-up illustration-caption call.
    Caption,
    /// The line-box OCR detection call.
    LineDetection,
}

impl std::fmt::Display for RecognitionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionStage::Transcription => write!(f, "transcription"),
            RecognitionStage::Caption => write!(f, "caption"),
            RecognitionStage::LineDetection => write!(f, "line detection"),
        }
    }
}

/// A non-fatal error for a single page.
///
/// Reported as an id in [`crate::output::BatchOutput::failed_pages`] when a
/// page fails. The overall conversion continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page payload was empty.
    #[error("Page {id}: empty page data")]
    EmptyPageData { id: String },

    /// The page payload exceeds the per-page size limit.
    #[error("Page {id}: {bytes} bytes exceeds the {limit} byte limit")]
    PageTooLarge { id: String, bytes: usize, limit: usize },

    /// PNG encoding of the stroke raster failed. Not expected on valid
    /// decoded input; an occurrence is a defect, not a runtime condition.
    #[error("Page {id}: rasterisation failed: {detail}")]
    RenderFailed { id: String, detail: String },

    /// Handwriting is present but no recognition collaborator is configured.
    ///
    /// Deliberately distinct from a legitimately empty page: the page *has*
    /// content we cannot read, and silently returning "" would hide it.
    #[error("Page {id}: handwriting present but no recognizer is configured")]
    RecognizerUnavailable { id: String },

    /// A recognition collaborator call failed. No retry happens at this
    /// layer; timeout/retry policy belongs to the collaborator integration.
    #[error("Page {id}: {stage} failed: {detail}")]
    RecognitionFailed {
        id: String,
        stage: RecognitionStage,
        detail: String,
    },
}

impl PageError {
    /// The id of the page this error belongs to.
    pub fn page_id(&self) -> &str {
        match self {
            PageError::EmptyPageData { id }
            | PageError::PageTooLarge { id, .. }
            | PageError::RenderFailed { id, .. }
            | PageError::RecognizerUnavailable { id }
            | PageError::RecognitionFailed { id, .. } => id,
        }
    }
}
