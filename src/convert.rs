//! Eager (full-batch) conversion entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: wait for all pages, then return.
//! It collects every [`PageResult`] into memory before returning. Use
//! [`crate::stream::convert_pages_stream`] instead when you want pages
//! progressively, e.g. to drive a progress display.
//!
//! Pages are embarrassingly parallel: no state is shared between them, so
//! the batch fans out up to `config.concurrency` in-flight pages and
//! reassembles results by input position — never by completion order.

use crate::config::ConversionConfig;
use crate::error::Ink2MdError;
use crate::output::{BatchOutput, BatchStats, NotebookMetadata, NotebookOutput, PageInput, PageResult};
use crate::pipeline::{format, merge, recognize};
use chrono::{DateTime, Utc};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a batch of pages to per-page markdown results.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchOutput)` even if some pages failed — check
/// `output.failed_pages`. One bad page never aborts the batch.
///
/// # Errors
/// Returns `Err(Ink2MdError)` only for fatal errors: an empty batch, a
/// batch over `config.max_pages`, or every single page failing.
pub async fn convert_pages(
    pages: &[PageInput],
    config: &ConversionConfig,
) -> Result<BatchOutput, Ink2MdError> {
    let start = Instant::now();

    if pages.is_empty() {
        return Err(Ink2MdError::NoPages);
    }
    if pages.len() > config.max_pages {
        return Err(Ink2MdError::TooManyPages {
            count: pages.len(),
            max: config.max_pages,
        });
    }

    info!("Processing {} pages", pages.len());
    let config = resolve_recognizers(config).await;

    // Fan out, then reassemble by input position — not completion order.
    let mut results: Vec<(usize, Result<PageResult, crate::error::PageError>)> =
        stream::iter(pages.iter().enumerate().map(|(idx, page)| {
            let config = config.clone();
            async move {
                let result = merge::process_page(&page.id, &page.data, &config).await;
                (idx, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    results.sort_by_key(|(idx, _)| *idx);

    let mut ok_pages = Vec::with_capacity(results.len());
    let mut failed_pages = Vec::new();
    let mut first_error: Option<String> = None;

    for (_, result) in results {
        match result {
            Ok(page) => ok_pages.push(page),
            Err(e) => {
                warn!("Page {} failed: {e}", e.page_id());
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
                failed_pages.push(e.page_id().to_string());
            }
        }
    }

    if ok_pages.is_empty() {
        return Err(Ink2MdError::AllPagesFailed {
            total: pages.len(),
            first_error: first_error.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }

    let stats = BatchStats {
        total_pages: pages.len(),
        processed_pages: ok_pages.len(),
        failed_pages: failed_pages.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Batch complete: {}/{} pages, {}ms",
        stats.processed_pages, stats.total_pages, stats.total_duration_ms
    );

    Ok(BatchOutput {
        pages: ok_pages,
        failed_pages,
        stats,
    })
}

/// Convert a batch of pages and assemble them into one notebook document.
pub async fn convert_notebook(
    title: impl Into<String>,
    synced_at: DateTime<Utc>,
    pages: &[PageInput],
    config: &ConversionConfig,
) -> Result<NotebookOutput, Ink2MdError> {
    let batch = convert_pages(pages, config).await?;

    let metadata = NotebookMetadata {
        title: title.into(),
        synced_at,
        page_count: batch.pages.len(),
    };
    let page_texts: Vec<&str> = batch.pages.iter().map(|p| p.markdown.as_str()).collect();
    let markdown = format::assemble_notebook(&metadata, &page_texts);

    Ok(NotebookOutput {
        markdown,
        pages: batch.pages,
        failed_pages: batch.failed_pages,
        metadata,
        stats: batch.stats,
    })
}

/// Convert a notebook and write the assembled markdown to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_notebook_to_file(
    title: impl Into<String>,
    synced_at: DateTime<Utc>,
    pages: &[PageInput],
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<NotebookOutput, Ink2MdError> {
    let output = convert_notebook(title, synced_at, pages, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Ink2MdError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &output.markdown)
        .await
        .map_err(|e| Ink2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Ink2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output)
}

/// Synchronous wrapper around [`convert_pages`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_pages_sync(
    pages: &[PageInput],
    config: &ConversionConfig,
) -> Result<BatchOutput, Ink2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Ink2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_pages(pages, config))
}

// ── Recognizer resolution ────────────────────────────────────────────────

/// Resolve the vision recognizer, from most-specific to least-specific.
///
/// 1. **Pre-built recognizer** (`config.vision`) — used as-is. The route for
///    tests and for callers needing custom middleware.
///
/// 2. **Named provider + model** (`config.vision_provider`) — instantiated
///    through [`ProviderFactory::create_llm_provider`], which reads the
///    matching API key from the environment.
///
/// 3. **Environment pair** (`INK2MD_PROVIDER` + `INK2MD_MODEL`) — a
///    deployment-level choice (Makefile, shell script, CI), honoured before
///    auto-detection so the model choice survives multiple API keys.
///
/// 4. **Anthropic key** (`ANTHROPIC_API_KEY`) — the handwriting-quality
///    default, paired with [`recognize::DEFAULT_VISION_MODEL`].
///
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Resolution failure is deliberately not fatal here: typed-only pages must
/// convert without any API key. Pages that do contain handwriting then fail
/// individually with a recognizer-unavailable error.
pub(crate) async fn resolve_recognizers(config: &ConversionConfig) -> ConversionConfig {
    if config.vision.is_some() {
        return config.clone();
    }
    // A caller who explicitly set up line OCR gets exactly that; the
    // environment is only consulted when no recognition capability was
    // configured at all (or a provider was named).
    if config.vision_provider.is_none() && config.line_ocr.is_some() {
        return config.clone();
    }

    let mut resolved = config.clone();
    match resolve_provider(config) {
        Ok(provider) => {
            resolved.vision = Some(Arc::new(recognize::VlmRecognizer::new(provider, config)));
        }
        Err(e) => {
            debug!("No vision provider resolved ({e}); typed-only pages still convert");
        }
    }
    resolved
}

fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Ink2MdError> {
    if let Some(ref name) = config.vision_provider {
        let model = config
            .model
            .as_deref()
            .unwrap_or(recognize::DEFAULT_VISION_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) =
        (std::env::var("INK2MD_PROVIDER"), std::env::var("INK2MD_MODEL"))
    {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    // Prefer Anthropic when its key is present: handwriting transcription
    // quality is the whole point of the vision path.
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        if !key.is_empty() {
            let model = config
                .model
                .as_deref()
                .unwrap_or(recognize::DEFAULT_VISION_MODEL);
            return create_vision_provider("anthropic", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Ink2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set ANTHROPIC_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Ink2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Ink2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use crate::pipeline::decode::testenc::{scene, stroke_block, text_block};
    use crate::pipeline::recognize::{RecognizerError, VisionRecognizer};
    use async_trait::async_trait;

    struct FixedVision(&'static str);

    #[async_trait]
    impl VisionRecognizer for FixedVision {
        async fn transcribe(&self, _png: &[u8]) -> Result<String, RecognizerError> {
            Ok(self.0.to_string())
        }
        async fn caption(&self, _png: &[u8]) -> Result<String, RecognizerError> {
            Ok("sketch".to_string())
        }
    }

    struct FailingVision;

    #[async_trait]
    impl VisionRecognizer for FailingVision {
        async fn transcribe(&self, _png: &[u8]) -> Result<String, RecognizerError> {
            Err(RecognizerError::Api {
                message: "backend down".into(),
            })
        }
        async fn caption(&self, _png: &[u8]) -> Result<String, RecognizerError> {
            Err(RecognizerError::Api {
                message: "backend down".into(),
            })
        }
    }

    fn typed(id: &str, text: &str) -> PageInput {
        PageInput::new(id, scene(&[text_block(&[text])]))
    }

    fn handwriting(id: &str) -> PageInput {
        PageInput::new(id, scene(&[stroke_block(0, 2.0, &[(0.0, 0.0), (10.0, 10.0)])]))
    }

    #[tokio::test]
    async fn empty_batch_is_fatal() {
        let err = convert_pages(&[], &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Ink2MdError::NoPages));
    }

    #[tokio::test]
    async fn oversized_batch_is_fatal() {
        let pages: Vec<PageInput> = (0..3).map(|i| typed(&format!("p{i}"), "x")).collect();
        let config = ConversionConfig::builder().max_pages(2).build().unwrap();
        let err = convert_pages(&pages, &config).await.unwrap_err();
        assert!(matches!(err, Ink2MdError::TooManyPages { count: 3, max: 2 }));
    }

    #[tokio::test]
    async fn results_keep_input_order_under_concurrency() {
        let pages: Vec<PageInput> = (0..8).map(|i| typed(&format!("p{i}"), "text")).collect();
        let config = ConversionConfig::builder().concurrency(8).build().unwrap();
        let out = convert_pages(&pages, &config).await.unwrap();
        let ids: Vec<&str> = out.pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"]);
        assert!(out.failed_pages.is_empty());
    }

    #[tokio::test]
    async fn one_failing_page_does_not_abort_the_batch() {
        let config = ConversionConfig::builder()
            .vision(Arc::new(FixedVision("recognised")))
            .build()
            .unwrap();
        let pages = vec![
            typed("good-1", "Hello"),
            PageInput::new("bad", vec![]), // empty payload fails per-page
            handwriting("good-2"),
        ];
        let out = convert_pages(&pages, &config).await.unwrap();
        assert_eq!(out.pages.len(), 2);
        assert_eq!(out.failed_pages, vec!["bad".to_string()]);
        assert_eq!(out.stats.processed_pages, 2);
        assert_eq!(out.stats.failed_pages, 1);
    }

    #[tokio::test]
    async fn recognizer_failure_lands_in_failed_pages() {
        let config = ConversionConfig::builder()
            .vision(Arc::new(FailingVision))
            .build()
            .unwrap();
        let pages = vec![typed("typed", "still fine"), handwriting("inked")];
        let out = convert_pages(&pages, &config).await.unwrap();
        assert_eq!(out.pages.len(), 1);
        assert_eq!(out.pages[0].id, "typed");
        assert_eq!(out.failed_pages, vec!["inked".to_string()]);
    }

    #[tokio::test]
    async fn all_pages_failing_is_fatal() {
        let pages = vec![PageInput::new("a", vec![]), PageInput::new("b", vec![])];
        let err = convert_pages(&pages, &ConversionConfig::default())
            .await
            .unwrap_err();
        match err {
            Ink2MdError::AllPagesFailed { total, .. } => assert_eq!(total, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_page_is_empty_not_failed() {
        let pages = vec![PageInput::new("corrupt", b"not a scene".to_vec())];
        let out = convert_pages(&pages, &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.pages[0].markdown, "");
        assert_eq!(out.pages[0].confidence, 1.0);
        assert!(out.failed_pages.is_empty());
    }

    #[tokio::test]
    async fn notebook_assembles_pages_in_order() {
        let pages = vec![typed("p1", "Page one"), typed("p2", "Page two")];
        let out = convert_notebook(
            "My Notebook",
            Utc::now(),
            &pages,
            &ConversionConfig::default(),
        )
        .await
        .unwrap();
        assert!(out.markdown.contains("# My Notebook"));
        assert!(out.markdown.contains("## Page 1"));
        assert!(out.markdown.find("Page one").unwrap() < out.markdown.find("Page two").unwrap());
        assert_eq!(out.metadata.page_count, 2);
    }

    #[tokio::test]
    async fn notebook_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("notebook.md");
        let pages = vec![typed("p1", "Contents")];
        convert_notebook_to_file("N", Utc::now(), &pages, &path, &ConversionConfig::default())
            .await
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Contents"));
        assert!(!path.with_extension("md.tmp").exists());
    }

    #[test]
    fn page_error_ids_feed_failed_pages() {
        let e = PageError::EmptyPageData { id: "z".into() };
        assert_eq!(e.page_id(), "z");
    }
}
