//! Output types: per-page results, batch results, notebook assembly metadata.
//!
//! [`PageResult`] is the sole externally visible per-page output and is
//! immutable once built: `new` clamps confidence into `[0, 1]` and rounds it
//! to two decimals, so no consumer ever observes an out-of-range score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw input for one page: an opaque id plus the page's scene bytes.
#[derive(Debug, Clone)]
pub struct PageInput {
    /// Caller-chosen page identifier (a UUID on real devices). Results and
    /// failures are keyed by this id, never by completion order.
    pub id: String,
    /// Raw scene-stream bytes for the page.
    pub data: Vec<u8>,
}

impl PageInput {
    pub fn new(id: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// The converted result for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// The page id from the corresponding [`PageInput`].
    pub id: String,
    /// Markdown content of the page. Empty for a legitimately empty page.
    pub markdown: String,
    /// Confidence in `[0, 1]`. 1.0 for typed-only and empty pages; the
    /// handwriting component's score otherwise.
    pub confidence: f64,
}

impl PageResult {
    /// Build a result, clamping confidence into `[0, 1]` and rounding to
    /// two decimals.
    pub fn new(id: impl Into<String>, markdown: impl Into<String>, confidence: f64) -> Self {
        let clamped = confidence.clamp(0.0, 1.0);
        Self {
            id: id.into(),
            markdown: markdown.into(),
            confidence: (clamped * 100.0).round() / 100.0,
        }
    }
}

/// Aggregate timing and counts for a batch conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Pages in the request.
    pub total_pages: usize,
    /// Pages converted successfully.
    pub processed_pages: usize,
    /// Pages that failed.
    pub failed_pages: usize,
    /// Wall-clock duration of the whole batch in milliseconds.
    pub total_duration_ms: u64,
}

/// Result of converting a batch of pages.
///
/// A batch response always succeeds structurally: successful pages are in
/// `pages` (input order), failures are listed by id in `failed_pages`. One
/// bad page never prevents returning results for the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Successful page results, ordered by input position.
    pub pages: Vec<PageResult>,
    /// Ids of pages that failed.
    #[serde(rename = "failedPages", skip_serializing_if = "Vec::is_empty", default)]
    pub failed_pages: Vec<String>,
    /// Aggregate stats.
    #[serde(skip)]
    pub stats: BatchStats,
}

/// Metadata recorded in notebook front-matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookMetadata {
    /// Notebook title.
    pub title: String,
    /// Timestamp of the sync that produced the pages.
    pub synced_at: DateTime<Utc>,
    /// Number of pages that went into the assembled document.
    pub page_count: usize,
}

/// Result of converting a whole notebook: assembled markdown plus the
/// underlying per-page results.
#[derive(Debug, Clone)]
pub struct NotebookOutput {
    /// The assembled markdown document (front-matter, title, pages).
    pub markdown: String,
    /// Per-page results, input order.
    pub pages: Vec<PageResult>,
    /// Ids of pages that failed.
    pub failed_pages: Vec<String>,
    /// Notebook metadata used for the front-matter.
    pub metadata: NotebookMetadata,
    /// Aggregate stats.
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_and_rounded() {
        assert_eq!(PageResult::new("a", "", 1.7).confidence, 1.0);
        assert_eq!(PageResult::new("a", "", -0.3).confidence, 0.0);
        assert_eq!(PageResult::new("a", "", 0.876).confidence, 0.88);
    }

    #[test]
    fn batch_output_serialises_failed_pages_key() {
        let out = BatchOutput {
            pages: vec![PageResult::new("p1", "# Hi", 0.92)],
            failed_pages: vec!["p2".into()],
            stats: BatchStats::default(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["failedPages"][0], "p2");
        assert_eq!(json["pages"][0]["confidence"], 0.92);
    }

    #[test]
    fn empty_failed_pages_omitted_from_json() {
        let out = BatchOutput {
            pages: vec![],
            failed_pages: vec![],
            stats: BatchStats::default(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("failedPages").is_none());
    }
}
