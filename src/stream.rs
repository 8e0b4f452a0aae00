//! Streaming conversion API: emit pages as they complete.
//!
//! ## Why stream?
//!
//! A batch of stroke-heavy pages can take a while — each one is a vision
//! round-trip (two, when a caption is requested). A stream-based API lets
//! callers display partial results immediately or wire up progress bars
//! instead of waiting for the whole batch.
//!
//! Unlike the eager [`crate::convert::convert_pages`] which returns only
//! after all pages finish, [`convert_pages_stream`] yields each page's
//! `Result` as it completes. Pages arrive in completion order — sort by id
//! (or collect and match against your input) if order matters.

use crate::config::ConversionConfig;
use crate::convert::resolve_recognizers;
use crate::error::{Ink2MdError, PageError};
use crate::output::{PageInput, PageResult};
use crate::pipeline::merge;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Convert a batch of pages, streaming each result as it is ready.
///
/// Pages are emitted in completion order, not input order.
///
/// # Returns
/// - `Ok(PageStream)` — a stream of `Result<PageResult, PageError>`
/// - `Err(Ink2MdError)` — fatal error (empty batch, batch too large)
pub async fn convert_pages_stream(
    pages: Vec<PageInput>,
    config: &ConversionConfig,
) -> Result<PageStream, Ink2MdError> {
    if pages.is_empty() {
        return Err(Ink2MdError::NoPages);
    }
    if pages.len() > config.max_pages {
        return Err(Ink2MdError::TooManyPages {
            count: pages.len(),
            max: config.max_pages,
        });
    }

    info!("Starting streaming conversion of {} pages", pages.len());
    let config = resolve_recognizers(config).await;
    let concurrency = config.concurrency;

    let s = stream::iter(pages.into_iter().map(move |page| {
        let config = config.clone();
        async move { merge::process_page(&page.id, &page.data, &config).await }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::testenc::{scene, text_block};

    fn typed(id: &str, text: &str) -> PageInput {
        PageInput::new(id, scene(&[text_block(&[text])]))
    }

    #[test]
    fn stream_yields_every_page() {
        tokio_test::block_on(async {
            let pages = vec![typed("a", "one"), typed("b", "two"), typed("c", "three")];
            let stream = convert_pages_stream(pages, &ConversionConfig::default())
                .await
                .unwrap();
            let results: Vec<_> = stream.collect().await;
            assert_eq!(results.len(), 3);
            assert!(results.iter().all(|r| r.is_ok()));
        });
    }

    #[test]
    fn stream_carries_per_page_failures() {
        tokio_test::block_on(async {
            let pages = vec![typed("ok", "fine"), PageInput::new("broken", vec![])];
            let stream = convert_pages_stream(pages, &ConversionConfig::default())
                .await
                .unwrap();
            let results: Vec<_> = stream.collect().await;
            let failures: Vec<&PageError> =
                results.iter().filter_map(|r| r.as_ref().err()).collect();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].page_id(), "broken");
        });
    }

    #[test]
    fn empty_input_fails_before_streaming() {
        tokio_test::block_on(async {
            let err = match convert_pages_stream(vec![], &ConversionConfig::default()).await {
                Ok(_) => panic!("expected NoPages error"),
                Err(e) => e,
            };
            assert!(matches!(err, Ink2MdError::NoPages));
        });
    }
}
