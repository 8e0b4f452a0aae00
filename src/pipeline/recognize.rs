//! Recognition collaborators: trait seams plus the bundled VLM recognizer.
//!
//! The core pipeline never talks to a recognition service directly — it goes
//! through [`VisionRecognizer`] (full-page transcription + captioning) or
//! [`LineOcr`] (per-line text with confidence and geometry). From the core's
//! perspective a collaborator call either returns a result or fails
//! terminally for that page; timeout and retry policy live behind the trait.
//!
//! [`VlmRecognizer`] is the bundled [`VisionRecognizer`] implementation,
//! driving an `edgequake-llm` provider with a base64 PNG attachment. The
//! line-box collaborator ships as a trait only; hosted OCR services differ
//! too much to bundle a client here.

use crate::config::ConversionConfig;
use crate::prompts::{CAPTION_PROMPT, EXTRACTION_PROMPT};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Default vision model when the provider is Anthropic and the caller did
/// not choose one. Sonnet balances handwriting accuracy and cost.
pub const DEFAULT_VISION_MODEL: &str = "claude-sonnet-4-20250514";

/// An error from a recognition collaborator call.
#[derive(Debug, Clone, Error)]
pub enum RecognizerError {
    /// The collaborator's API rejected or failed the call.
    #[error("recognizer API error: {message}")]
    Api { message: String },

    /// The collaborator returned something the integration cannot use.
    #[error("invalid recognizer response: {detail}")]
    InvalidResponse { detail: String },
}

/// Normalised bounding box of one recognised line, all fields in `[0, 1]`
/// relative to the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: f32,
    pub left: f32,
    pub height: f32,
    pub width: f32,
}

/// One line from the line-box OCR collaborator.
///
/// `confidence` is on the collaborator's native `[0, 100]` scale; it is
/// rescaled to the crate's canonical `[0, 1]` scale exactly once, at this
/// boundary, by [`mean_confidence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Mean line confidence rescaled to `[0, 1]`; 0.0 when there are no lines.
pub fn mean_confidence(lines: &[OcrLine]) -> f64 {
    if lines.is_empty() {
        return 0.0;
    }
    let total: f64 = lines.iter().map(|l| l.confidence as f64).sum();
    total / lines.len() as f64 / 100.0
}

/// Full-page vision recognition: transcription plus illustration captioning.
#[async_trait]
pub trait VisionRecognizer: Send + Sync {
    /// Transcribe the page image to markdown-ish text. The reply may contain
    /// the drawing marker or non-text indicator phrases; callers classify it
    /// before use.
    async fn transcribe(&self, png: &[u8]) -> Result<String, RecognizerError>;

    /// Produce a short free-text caption of the page's drawing content.
    async fn caption(&self, png: &[u8]) -> Result<String, RecognizerError>;
}

/// Line-box OCR: per-line text with confidence and normalised geometry.
/// Lines may arrive in any order; callers sort by geometry.
#[async_trait]
pub trait LineOcr: Send + Sync {
    async fn detect_lines(&self, png: &[u8]) -> Result<Vec<OcrLine>, RecognizerError>;
}

/// [`VisionRecognizer`] backed by an `edgequake-llm` provider.
pub struct VlmRecognizer {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl VlmRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// One vision call: system prompt + the page PNG as a base64 attachment.
    ///
    /// The empty user text is intentional: chat APIs require at least one
    /// user turn to respond to, but the image carries all the content.
    async fn vision_call(&self, prompt: &str, png: &[u8]) -> Result<String, RecognizerError> {
        let b64 = STANDARD.encode(png);
        debug!("Sending image to vision provider ({} bytes base64)", b64.len());

        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images(
                "",
                vec![ImageData::new(b64, "image/png").with_detail("high")],
            ),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| RecognizerError::Api {
                message: e.to_string(),
            })?;

        debug!(
            "Vision call used {} input / {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

#[async_trait]
impl VisionRecognizer for VlmRecognizer {
    async fn transcribe(&self, png: &[u8]) -> Result<String, RecognizerError> {
        self.vision_call(EXTRACTION_PROMPT, png).await
    }

    async fn caption(&self, png: &[u8]) -> Result<String, RecognizerError> {
        self.vision_call(CAPTION_PROMPT, png).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(confidence: f32) -> OcrLine {
        OcrLine {
            text: "x".into(),
            confidence,
            bbox: BoundingBox {
                top: 0.0,
                left: 0.0,
                height: 0.02,
                width: 0.5,
            },
        }
    }

    #[test]
    fn mean_confidence_rescales_to_unit_interval() {
        assert_eq!(mean_confidence(&[line(90.0), line(80.0)]), 0.85);
        assert_eq!(mean_confidence(&[line(95.0)]), 0.95);
    }

    #[test]
    fn mean_confidence_of_no_lines_is_zero() {
        assert_eq!(mean_confidence(&[]), 0.0);
    }

    #[test]
    fn ocr_line_deserialises_from_collaborator_json() {
        let json = r#"{
            "text": "Hello world",
            "confidence": 95.0,
            "bbox": {"top": 0.1, "left": 0.05, "height": 0.02, "width": 0.4}
        }"#;
        let l: OcrLine = serde_json::from_str(json).unwrap();
        assert_eq!(l.text, "Hello world");
        assert_eq!(l.bbox.top, 0.1);
    }
}
