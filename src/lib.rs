//! # ink2md
//!
//! Convert tablet ink note pages to clean Markdown.
//!
//! ## Why this crate?
//!
//! A tablet note page mixes typed text with freehand ink. The typed part can
//! be extracted directly from the page's scene stream — no recognition
//! needed, full confidence. The handwritten part cannot: this crate
//! rasterises the strokes into a PNG and lets a vision model (or a line-box
//! OCR service) read it as a human would, then merges both parts into one
//! markdown result with an honest confidence score.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page bytes
//!  │
//!  ├─ 1. Decode    scene stream → typed text blocks + stroke blocks
//!  ├─ 2. Raster    strokes → 1404×1872 PNG (only when ink is present)
//!  ├─ 3. Recognize vision model or line-box OCR reads the raster
//!  ├─ 4. Classify  free-form recognizer reply → (text, drawing flag)
//!  ├─ 5. Format    geometry breaks / minimal cleanup / heading heuristic
//!  └─ 6. Merge     typed + handwritten → PageResult{id, markdown, confidence}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ink2md::{convert_pages, ConversionConfig, PageInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from ANTHROPIC_API_KEY / OPENAI_API_KEY / …
//!     let config = ConversionConfig::default();
//!     let pages = vec![PageInput::new("page-1", std::fs::read("page-1.rm")?)];
//!     let output = convert_pages(&pages, &config).await?;
//!     for page in &output.pages {
//!         println!("{} ({:.0}%)\n{}", page.id, page.confidence * 100.0, page.markdown);
//!     }
//!     eprintln!("failed: {:?}", output.failed_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ink2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! ink2md = { version = "0.3", default-features = false }
//! ```
//!
//! ## Failure model
//!
//! A batch response always succeeds structurally: converted pages come back
//! in input order, failed page ids come back in `failed_pages`. A corrupt
//! page decodes to an empty page rather than failing; a page whose
//! handwriting cannot be recognised (no provider configured, API error)
//! fails individually without touching its neighbours.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert_notebook, convert_notebook_to_file, convert_pages, convert_pages_sync};
pub use error::{Ink2MdError, PageError, RecognitionStage};
pub use output::{BatchOutput, BatchStats, NotebookMetadata, NotebookOutput, PageInput, PageResult};
pub use pipeline::recognize::{
    BoundingBox, LineOcr, OcrLine, RecognizerError, VisionRecognizer, VlmRecognizer,
};
pub use stream::{convert_pages_stream, PageStream};
