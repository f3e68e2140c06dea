//! Input description: where the slides live and how many there are.
//!
//! The viewer serves slide `N` at `<base_url><N>.png`. Whatever discovers a
//! slide set (a scraper, the CLI, a test) produces one [`SlideSetInfo`]; the
//! page count it carries is authoritative for the whole run.

use crate::error::SlidesError;
use crate::output::normalize_file_name;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static SLIDE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+\.png$").unwrap());

/// Slide set metadata. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSetInfo {
    /// URL prefix such that slide `N` is at `base_url + N + ".png"`.
    pub base_url: String,
    /// Number of slides; always ≥ 1.
    pub page_count: usize,
    /// Suggested output file name, e.g. `lecture.pdf`.
    pub file_name: String,
}

impl SlideSetInfo {
    /// Build from an explicit base URL.
    ///
    /// The file name is normalised with [`normalize_file_name`], so
    /// `"Week 3.pptx"` becomes `"Week 3.pdf"`.
    pub fn new(
        base_url: impl Into<String>,
        page_count: usize,
        file_name: impl AsRef<str>,
    ) -> Result<Self, SlidesError> {
        let base_url = base_url.into();
        if !is_url(&base_url) {
            return Err(SlidesError::InvalidInput {
                input: base_url,
                reason: "base URL must start with http:// or https://".into(),
            });
        }
        if page_count == 0 {
            return Err(SlidesError::InvalidInput {
                input: base_url,
                reason: "page count must be at least 1".into(),
            });
        }
        Ok(Self {
            base_url,
            page_count,
            file_name: normalize_file_name(file_name.as_ref()),
        })
    }

    /// Build from the URL of any one slide image, e.g.
    /// `https://host/deck/3.png` → base `https://host/deck/`.
    pub fn from_slide_url(
        slide_url: &str,
        page_count: usize,
        file_name: impl AsRef<str>,
    ) -> Result<Self, SlidesError> {
        if !SLIDE_SUFFIX.is_match(slide_url) {
            return Err(SlidesError::InvalidInput {
                input: slide_url.to_string(),
                reason: "slide URL must end in /<number>.png".into(),
            });
        }
        let base_url = SLIDE_SUFFIX.replace(slide_url, "/").into_owned();
        debug!("Derived base URL {} from {}", base_url, slide_url);
        Self::new(base_url, page_count, file_name)
    }

    /// URL of 1-indexed slide `page`.
    pub fn page_url(&self, page: usize) -> String {
        format!("{}{}.png", self.base_url, page)
    }
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check if the input string is the URL of a single slide image.
pub fn is_slide_url(input: &str) -> bool {
    is_url(input) && SLIDE_SUFFIX.is_match(input)
}
