//! Per-page orchestration: decide which pipeline paths run and merge typed
//! and handwritten content into one [`PageResult`].
//!
//! ## The page state machine
//!
//! Each page is classified exactly once from `(typed text present, strokes
//! present)`:
//!
//! | typed | strokes | state | markdown | confidence |
//! |-------|---------|-------|----------|------------|
//! | no    | no      | Empty | "" | 1.0 |
//! | yes   | no      | TypedOnly | cleaned typed text | 1.0 |
//! | no    | yes     | HandwritingOnly | recognised handwriting | recognizer score |
//! | yes   | yes     | Mixed | typed, then handwriting | recognizer score |
//!
//! In the Mixed state the typed block always comes first, and the reported
//! confidence is the handwriting component's — the less-trusted component
//! dominates the score.
//!
//! ## Confidence policy
//!
//! The canonical scale is `[0, 1]`. Line-box OCR reports per-line scores in
//! `[0, 100]`; they are averaged and rescaled at the collaborator boundary.
//! The vision model exposes no native score, so its confidence is fixed at
//! 1.0.

use crate::config::ConversionConfig;
use crate::error::{PageError, RecognitionStage};
use crate::output::PageResult;
use crate::pipeline::{classify, decode, format, raster, recognize};
use tracing::{debug, info};

/// Content classification for one page, decided once per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageContent {
    Empty,
    TypedOnly,
    HandwritingOnly,
    Mixed,
}

impl PageContent {
    fn from_flags(typed_present: bool, has_strokes: bool) -> Self {
        match (typed_present, has_strokes) {
            (false, false) => PageContent::Empty,
            (true, false) => PageContent::TypedOnly,
            (false, true) => PageContent::HandwritingOnly,
            (true, true) => PageContent::Mixed,
        }
    }
}

/// Run one page through the pipeline.
///
/// Decode never fails (malformed bytes become an empty page); errors come
/// only from the input limits and the recognition collaborators.
pub async fn process_page(
    id: &str,
    data: &[u8],
    config: &ConversionConfig,
) -> Result<PageResult, PageError> {
    if data.is_empty() {
        return Err(PageError::EmptyPageData { id: id.to_string() });
    }
    if data.len() > config.max_page_bytes {
        return Err(PageError::PageTooLarge {
            id: id.to_string(),
            bytes: data.len(),
            limit: config.max_page_bytes,
        });
    }

    let doc = decode::decode(data);
    let typed = doc.typed_text();
    let state = PageContent::from_flags(typed.is_some(), doc.has_strokes());
    debug!("Page {id}: {state:?}");

    match state {
        PageContent::Empty => Ok(PageResult::new(id, "", 1.0)),
        PageContent::TypedOnly => {
            info!("Page {id}: extracted typed text directly");
            let markdown = format::minimal_cleanup(&typed.unwrap_or_default());
            Ok(PageResult::new(id, markdown, 1.0))
        }
        PageContent::HandwritingOnly => {
            let (markdown, confidence) = recognise_handwriting(id, &doc, config).await?;
            Ok(PageResult::new(id, markdown, confidence))
        }
        PageContent::Mixed => {
            let typed_md = format::minimal_cleanup(&typed.unwrap_or_default());
            let (hw_md, confidence) = recognise_handwriting(id, &doc, config).await?;
            // Typed first, always; blank-line separated; skip empty parts.
            let markdown = [typed_md, hw_md]
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            Ok(PageResult::new(id, markdown, confidence))
        }
    }
}

/// Rasterise the page's strokes and run the configured recognition path.
///
/// Routing: the vision recognizer wins when configured; line-box OCR is the
/// fallback. Neither configured is a page-scoped failure — the page has
/// content we cannot read, which must stay distinguishable from a
/// legitimately empty page.
async fn recognise_handwriting(
    id: &str,
    doc: &decode::SceneDocument,
    config: &ConversionConfig,
) -> Result<(String, f64), PageError> {
    enum Route<'a> {
        Vision(&'a dyn recognize::VisionRecognizer),
        Lines(&'a dyn recognize::LineOcr),
    }

    let route = if let Some(vision) = &config.vision {
        Route::Vision(vision.as_ref())
    } else if let Some(line_ocr) = &config.line_ocr {
        Route::Lines(line_ocr.as_ref())
    } else {
        return Err(PageError::RecognizerUnavailable { id: id.to_string() });
    };

    info!("Page {id}: rendering strokes for recognition");
    let png = raster::render(doc).map_err(|e| PageError::RenderFailed {
        id: id.to_string(),
        detail: e.to_string(),
    })?;

    match route {
        Route::Vision(vision) => recognise_with_vision(id, &png, vision, config).await,
        Route::Lines(line_ocr) => recognise_with_line_ocr(id, &png, line_ocr).await,
    }
}

/// Vision path: transcribe, classify, then conditionally caption.
///
/// The two recognizer calls are explicit sequential composition — each has
/// its own failure attribution via [`RecognitionStage`].
async fn recognise_with_vision(
    id: &str,
    png: &[u8],
    vision: &dyn recognize::VisionRecognizer,
    config: &ConversionConfig,
) -> Result<(String, f64), PageError> {
    let raw = vision
        .transcribe(png)
        .await
        .map_err(|e| PageError::RecognitionFailed {
            id: id.to_string(),
            stage: RecognitionStage::Transcription,
            detail: e.to_string(),
        })?;

    let outcome = classify::classify(&raw);
    let mut parts: Vec<String> = Vec::new();
    if !outcome.text.is_empty() {
        parts.push(format::minimal_cleanup(&outcome.text));
    }

    if outcome.has_drawings && config.describe_illustrations {
        info!("Page {id}: drawing content flagged, requesting caption");
        let caption = vision
            .caption(png)
            .await
            .map_err(|e| PageError::RecognitionFailed {
                id: id.to_string(),
                stage: RecognitionStage::Caption,
                detail: e.to_string(),
            })?;
        parts.push(classify::illustration_tag(&caption));
    }

    // The vision model exposes no native confidence; fixed at 1.0.
    Ok((parts.join("\n\n"), 1.0))
}

/// Line-box path: detect lines, average their confidence, format by geometry.
async fn recognise_with_line_ocr(
    id: &str,
    png: &[u8],
    line_ocr: &dyn recognize::LineOcr,
) -> Result<(String, f64), PageError> {
    let lines = line_ocr
        .detect_lines(png)
        .await
        .map_err(|e| PageError::RecognitionFailed {
            id: id.to_string(),
            stage: RecognitionStage::LineDetection,
            detail: e.to_string(),
        })?;

    let confidence = recognize::mean_confidence(&lines);
    debug!("Page {id}: {} lines, mean confidence {confidence:.2}", lines.len());
    Ok((format::format_line_blocks(&lines), confidence))
}
