//! # slides2pdf
//!
//! Download a numbered set of slide images and assemble them into PDF
//! documents.
//!
//! A slide viewer serves slide `N` at `<base_url><N>.png`. This crate fetches
//! those images with a bounded number of concurrent requests, normalises
//! them (decode, flatten alpha, re-encode as JPEG) and streams them one by
//! one into a PDF assembly worker. Large sets are split into several
//! documents so no single document grows without bound.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SlideSetInfo
//!  │
//!  ├─ 1. Plan       split into segments of ≤ max_pages_per_document
//!  ├─ 2. Fetch      concurrent downloads, results in page order
//!  ├─ 3. Normalize  decode + JPEG re-encode (CPU-bound, spawn_blocking)
//!  ├─ 4. Layout     first page fixes the page box; others fit + centre
//!  ├─ 5. Assemble   INIT / ADD_PAGE / FINISH on a dedicated worker
//!  └─ 6. Output     one PDF per segment + run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slides2pdf::{generate_pdf, CancellationToken, DownloadConfig, SlideSetInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let info = SlideSetInfo::from_slide_url(
//!         "https://cdn.example.com/ppt/abc123/1.png",
//!         42,
//!         "Week 3.pptx",
//!     )?;
//!     let config = DownloadConfig::default();
//!     let token = CancellationToken::new();
//!
//!     let output = generate_pdf(&info, &config, &token).await?;
//!     for (name, doc) in output.output.named(&output.file_name) {
//!         std::fs::write(&name, &doc.bytes)?;
//!         eprintln!("{}: {} pages", name, doc.page_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Cancellation
//!
//! Clone the [`CancellationToken`] into whatever handles the stop action and
//! call [`CancellationToken::abort`]. The run stops within one batch of
//! in-flight downloads and returns [`SlidesError::Aborted`]; check
//! [`SlidesError::is_aborted`] to tell it apart from a failure.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slides2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! slides2pdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancellationToken;
pub use config::{DownloadConfig, DownloadConfigBuilder, SplitMode};
pub use convert::{
    generate_pdf, generate_pdf_sync, generate_pdf_with, generate_to_dir, generate_to_dir_with,
};
pub use error::{PageError, SlidesError};
pub use output::{DownloadOutput, DownloadStats, PdfDocument, PdfOutput, SavedOutput};
pub use pipeline::fetch::{HttpFetcher, SlideFetcher};
pub use pipeline::input::SlideSetInfo;
pub use pipeline::segment::Segment;
pub use progress::{DownloadProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{generate_stream, DocumentStream};
