//! Configuration types for slide downloads.
//!
//! All pipeline behaviour is controlled through [`DownloadConfig`], built via
//! its [`DownloadConfigBuilder`]; `build()` validates the combination.

use crate::error::SlidesError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for one download run.
///
/// Built via [`DownloadConfig::builder()`] or using
/// [`DownloadConfig::default()`].
///
/// # Example
/// ```rust
/// use slides2pdf::{DownloadConfig, SplitMode};
///
/// let config = DownloadConfig::builder()
///     .max_pages_per_document(100)
///     .batch_concurrency(8)
///     .image_quality(0.7)
///     .split_mode(SplitMode::Always)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DownloadConfig {
    /// Maximum pages in one output PDF before the run is split. Default: 150.
    ///
    /// Every page of a document is held by the assembly worker until the
    /// document is serialised, so this bounds peak memory per document.
    pub max_pages_per_document: usize,

    /// Maximum simultaneous slide downloads, also the batch size. Default: 10.
    pub batch_concurrency: usize,

    /// Pause after each batch, in milliseconds. Default: 50.
    pub inter_batch_cooldown_ms: u64,

    /// Pause between two segments, in milliseconds. Default: 1000.
    pub inter_segment_pause_ms: u64,

    /// JPEG quality used when re-encoding slides, in (0, 1]. Default: 0.8.
    pub image_quality: f32,

    /// Re-encode slides to JPEG before assembly. Default: true.
    ///
    /// When false the downloaded bytes are passed through untouched and only
    /// decoded for their dimensions (and again by the worker for embedding).
    pub reencode: bool,

    /// What to do when the slide count exceeds `max_pages_per_document`.
    /// Default: [`SplitMode::Ask`].
    pub split_mode: SplitMode,

    /// Per-request timeout for [`crate::pipeline::fetch::HttpFetcher`], in
    /// seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Optional `User-Agent` header for slide requests.
    pub user_agent: Option<String>,

    /// Progress and split-confirmation callback. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_pages_per_document: 150,
            batch_concurrency: 10,
            inter_batch_cooldown_ms: 50,
            inter_segment_pause_ms: 1000,
            image_quality: 0.8,
            reencode: true,
            split_mode: SplitMode::default(),
            download_timeout_secs: 60,
            user_agent: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("max_pages_per_document", &self.max_pages_per_document)
            .field("batch_concurrency", &self.batch_concurrency)
            .field("inter_batch_cooldown_ms", &self.inter_batch_cooldown_ms)
            .field("inter_segment_pause_ms", &self.inter_segment_pause_ms)
            .field("image_quality", &self.image_quality)
            .field("reencode", &self.reencode)
            .field("split_mode", &self.split_mode)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn DownloadProgressCallback>"),
            )
            .finish()
    }
}

impl DownloadConfig {
    /// Create a new builder for `DownloadConfig`.
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn inter_batch_cooldown(&self) -> Duration {
        Duration::from_millis(self.inter_batch_cooldown_ms)
    }

    pub fn inter_segment_pause(&self) -> Duration {
        Duration::from_millis(self.inter_segment_pause_ms)
    }

    /// JPEG quality on the encoder's 1–100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.image_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn max_pages_per_document(mut self, n: usize) -> Self {
        self.config.max_pages_per_document = n;
        self
    }

    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.config.batch_concurrency = n;
        self
    }

    pub fn inter_batch_cooldown_ms(mut self, ms: u64) -> Self {
        self.config.inter_batch_cooldown_ms = ms;
        self
    }

    pub fn inter_segment_pause_ms(mut self, ms: u64) -> Self {
        self.config.inter_segment_pause_ms = ms;
        self
    }

    pub fn image_quality(mut self, q: f32) -> Self {
        self.config.image_quality = q;
        self
    }

    pub fn reencode(mut self, v: bool) -> Self {
        self.config.reencode = v;
        self
    }

    pub fn split_mode(mut self, mode: SplitMode) -> Self {
        self.config.split_mode = mode;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DownloadConfig, SlidesError> {
        let c = &self.config;
        if c.max_pages_per_document == 0 {
            return Err(SlidesError::InvalidConfig(
                "max pages per document must be ≥ 1".into(),
            ));
        }
        if c.batch_concurrency == 0 {
            return Err(SlidesError::InvalidConfig(
                "batch concurrency must be ≥ 1".into(),
            ));
        }
        if !(c.image_quality > 0.0 && c.image_quality <= 1.0) {
            return Err(SlidesError::InvalidConfig(format!(
                "image quality must be in (0, 1], got {}",
                c.image_quality
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Policy for slide sets larger than `max_pages_per_document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Ask [`crate::progress::DownloadProgressCallback::confirm_split`]. (default)
    #[default]
    Ask,
    /// Always split into parts of at most `max_pages_per_document` pages.
    Always,
    /// Never split: build one oversized document.
    Never,
}
