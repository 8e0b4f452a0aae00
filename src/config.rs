//! Configuration types for page-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Ink2MdError;
use crate::pipeline::recognize::{LineOcr, VisionRecognizer};
use std::fmt;
use std::sync::Arc;

/// Configuration for a batch conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use ink2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .concurrency(8)
///     .model("claude-sonnet-4-20250514")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Number of pages processed concurrently. Default: 4.
    ///
    /// Recognition calls are network-bound, not CPU-bound; each page's own
    /// pipeline stays single-threaded, so pages are the natural unit of
    /// parallelism. Lower this if the recognition API rate-limits you.
    pub concurrency: usize,

    /// Maximum pages accepted in one batch. Default: 20.
    ///
    /// A request-level limit carried over from the hosted service so an
    /// unbounded batch cannot tie up the recognizer for minutes.
    pub max_pages: usize,

    /// Maximum size of a single page's scene bytes. Default: 5 MiB.
    ///
    /// Oversized pages fail individually (they land in `failed_pages`);
    /// they do not abort the batch.
    pub max_page_bytes: usize,

    /// Request a short illustration caption when the recognizer flags
    /// drawing content. Default: true.
    ///
    /// Costs one extra recognizer round-trip per page that contains
    /// drawings; the caption appears as `[illustration: …]` in the output.
    pub describe_illustrations: bool,

    /// Vision model identifier, e.g. "claude-sonnet-4-20250514".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Vision provider name (e.g. "anthropic", "openai", "ollama").
    /// If None along with `vision`, the provider is auto-detected from the
    /// environment.
    pub vision_provider: Option<String>,

    /// Pre-constructed vision recognizer. Takes precedence over
    /// `vision_provider`. Useful in tests and when the caller needs custom
    /// middleware around the recognition calls.
    pub vision: Option<Arc<dyn VisionRecognizer>>,

    /// Line-box OCR collaborator. Used only when no vision recognizer is
    /// available; produces per-line confidence and geometry.
    pub line_ocr: Option<Arc<dyn LineOcr>>,

    /// Sampling temperature for the vision completion. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what is on the page,
    /// which is exactly what transcription needs.
    pub temperature: f32,

    /// Maximum tokens the vision model may generate per page. Default: 4096.
    pub max_tokens: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_pages: 20,
            max_page_bytes: 5 * 1024 * 1024,
            describe_illustrations: true,
            model: None,
            vision_provider: None,
            vision: None,
            line_ocr: None,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("concurrency", &self.concurrency)
            .field("max_pages", &self.max_pages)
            .field("max_page_bytes", &self.max_page_bytes)
            .field("describe_illustrations", &self.describe_illustrations)
            .field("model", &self.model)
            .field("vision_provider", &self.vision_provider)
            .field("vision", &self.vision.as_ref().map(|_| "<dyn VisionRecognizer>"))
            .field("line_ocr", &self.line_ocr.as_ref().map(|_| "<dyn LineOcr>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn max_page_bytes(mut self, bytes: usize) -> Self {
        self.config.max_page_bytes = bytes.max(1024);
        self
    }

    pub fn describe_illustrations(mut self, v: bool) -> Self {
        self.config.describe_illustrations = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn vision_provider(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider = Some(name.into());
        self
    }

    pub fn vision(mut self, recognizer: Arc<dyn VisionRecognizer>) -> Self {
        self.config.vision = Some(recognizer);
        self
    }

    pub fn line_ocr(mut self, ocr: Arc<dyn LineOcr>) -> Self {
        self.config.line_ocr = Some(ocr);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Ink2MdError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Ink2MdError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_pages == 0 {
            return Err(Ink2MdError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
