//! Progress-callback trait for download runs.
//!
//! Inject an [`Arc<dyn DownloadProgressCallback>`] via
//! [`crate::config::DownloadConfigBuilder::progress_callback`] to receive
//! events as slides are downloaded and appended to their documents.
//!
//! The callback is also the pipeline's only way to ask the user something:
//! [`DownloadProgressCallback::confirm_split`] is consulted when the slide
//! count exceeds the per-document limit and the split mode is
//! [`crate::config::SplitMode::Ask`].
//!
//! # Example
//!
//! ```rust
//! use slides2pdf::{DownloadConfig, DownloadProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct LastPage(AtomicUsize);
//!
//! impl DownloadProgressCallback for LastPage {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize) {
//!         self.0.store(page_num, Ordering::SeqCst);
//!         eprintln!("{page_num}/{total_pages}");
//!     }
//! }
//!
//! let config = DownloadConfig::builder()
//!     .progress_callback(Arc::new(LastPage(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::segment::Segment;
use std::sync::Arc;

/// Called by the pipeline as it works through a slide set.
///
/// All methods have default implementations so callers only override what
/// they care about. Page events arrive in ascending page order.
pub trait DownloadProgressCallback: Send + Sync {
    /// Called once, after segment planning.
    fn on_run_start(&self, total_pages: usize, parts: usize) {
        let _ = (total_pages, parts);
    }

    /// Asked when `total_pages` exceeds the per-document limit.
    ///
    /// Return `true` to split into `parts` documents, `false` to build one
    /// oversized document.
    fn confirm_split(&self, total_pages: usize, parts: usize) -> bool {
        let _ = (total_pages, parts);
        true
    }

    /// Called before a segment's first page is fetched.
    ///
    /// # Arguments
    /// * `part` : 1-indexed part number
    /// * `parts`: number of parts in the run
    fn on_segment_start(&self, part: usize, parts: usize, segment: Segment) {
        let _ = (part, parts, segment);
    }

    /// Called after a page has been appended to its document.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: page count of the whole slide set
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page was left out after a download or decode failure.
    fn on_page_skipped(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called when a segment's document has been serialised.
    fn on_segment_complete(&self, part: usize, parts: usize, page_count: usize, bytes: usize) {
        let _ = (part, parts, page_count, bytes);
    }

    /// Called once after the last segment completed.
    fn on_run_complete(&self, total_pages: usize, added_pages: usize) {
        let _ = (total_pages, added_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DownloadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DownloadConfig`].
pub type ProgressCallback = Arc<dyn DownloadProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        pages: Mutex<Vec<usize>>,
        skipped: AtomicUsize,
        segments: AtomicUsize,
    }

    impl DownloadProgressCallback for TrackingCallback {
        fn on_page_complete(&self, page_num: usize, _total_pages: usize) {
            self.pages.lock().unwrap().push(page_num);
        }

        fn on_page_skipped(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_segment_complete(&self, _part: usize, _parts: usize, _pages: usize, _bytes: usize) {
            self.segments.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_accepts_splits() {
        let cb = NoopProgressCallback;
        cb.on_run_start(10, 1);
        cb.on_segment_start(1, 1, Segment::new(1, 10));
        cb.on_page_complete(1, 10);
        cb.on_page_skipped(2, 10, "HTTP 500");
        cb.on_segment_complete(1, 1, 9, 1024);
        cb.on_run_complete(10, 9);
        assert!(cb.confirm_split(300, 2));
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_page_complete(1, 3);
        cb.on_page_skipped(2, 3, "decode");
        cb.on_page_complete(3, 3);
        cb.on_segment_complete(1, 1, 2, 100);

        assert_eq!(*tracker.pages.lock().unwrap(), vec![1, 3]);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.segments.load(Ordering::SeqCst), 1);
    }
}
