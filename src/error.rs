//! Error types for the slides2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SlidesError`]: **Fatal**: the run cannot continue (the first page of
//!   a segment is unreachable, the assembly worker failed, the user pressed
//!   stop). Returned as `Err(SlidesError)` from every `generate*` function.
//!
//! * [`PageError`]: **Non-fatal**: one slide failed to download or decode.
//!   The page is logged, reported through
//!   [`crate::progress::DownloadProgressCallback::on_page_skipped`] and left
//!   out of the document; every other page is still assembled.
//!
//! Cancellation is a fatal error too. [`SlidesError::is_aborted`] tells a
//! user-initiated stop apart from a failure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slides2pdf library.
#[derive(Debug, Error)]
pub enum SlidesError {
    // ── Cancellation ──────────────────────────────────────────────────────
    /// The run was cancelled through its [`crate::cancel::CancellationToken`].
    ///
    /// Any partially assembled document of the in-progress segment has been
    /// discarded.
    #[error("Download aborted: {reason}")]
    Aborted { reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The slide set description is unusable (bad URL, zero pages, …).
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// A slide image could not be downloaded.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// A slide download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Segment errors ────────────────────────────────────────────────────
    /// The first page of a segment could not be fetched or decoded, so the
    /// page box of the document cannot be established.
    #[error("Cannot start document at page {page}: {detail}")]
    SegmentSetupFailed { page: usize, detail: String },

    /// The assembly worker reported an error or stopped responding.
    #[error("PDF assembly failed: {detail}")]
    AssemblyFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlidesError {
    /// `true` when the run ended because it was cancelled, not because
    /// something broke.
    pub fn is_aborted(&self) -> bool {
        matches!(self, SlidesError::Aborted { .. })
    }
}

/// A non-fatal error for a single slide.
///
/// The slide is omitted from its document and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The slide image could not be downloaded.
    #[error("Page {page}: download failed: {detail}")]
    DownloadFailed { page: usize, detail: String },

    /// The downloaded bytes are not a decodable image.
    #[error("Page {page}: image decode failed: {detail}")]
    DecodeFailed { page: usize, detail: String },

    /// Re-encoding the decoded image failed.
    #[error("Page {page}: image encode failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

impl PageError {
    /// The 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::DownloadFailed { page, .. }
            | PageError::DecodeFailed { page, .. }
            | PageError::EncodeFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_is_distinguished() {
        let e = SlidesError::Aborted {
            reason: "user pressed stop".into(),
        };
        assert!(e.is_aborted());
        assert!(e.to_string().contains("user pressed stop"));

        let e = SlidesError::AssemblyFailed {
            detail: "worker gone".into(),
        };
        assert!(!e.is_aborted());
    }

    #[test]
    fn segment_setup_display() {
        let e = SlidesError::SegmentSetupFailed {
            page: 151,
            detail: "HTTP 404".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("151"), "got: {msg}");
        assert!(msg.contains("HTTP 404"), "got: {msg}");
    }

    #[test]
    fn page_error_reports_its_page() {
        let e = PageError::DecodeFailed {
            page: 7,
            detail: "bad signature".into(),
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().starts_with("Page 7"));
    }
}
