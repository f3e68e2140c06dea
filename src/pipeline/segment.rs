//! Segment planning: which pages go into which output document.
//!
//! A run covers pages `1..=page_count`. It is partitioned into contiguous,
//! non-overlapping [`Segment`]s, one per output PDF. When splitting is
//! declined the whole run is one segment regardless of size.

use crate::config::SplitMode;
use crate::progress::DownloadProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use tracing::info;

/// Inclusive, 1-indexed page range assigned to one output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_page: usize,
    pub end_page: usize,
}

// A segment always holds at least one page.
#[allow(clippy::len_without_is_empty)]
impl Segment {
    pub fn new(start_page: usize, end_page: usize) -> Self {
        debug_assert!(start_page >= 1 && start_page <= end_page);
        Self {
            start_page,
            end_page,
        }
    }

    pub fn len(&self) -> usize {
        self.end_page + 1 - self.start_page
    }

    pub fn pages(&self) -> RangeInclusive<usize> {
        self.start_page..=self.end_page
    }

    /// Pages after the first one, grouped into batches of at most
    /// `batch_size` pages in ascending order.
    ///
    /// The first page is handled separately because it fixes the page box.
    pub fn remaining_batches(&self, batch_size: usize) -> Vec<Vec<usize>> {
        let rest: Vec<usize> = (self.start_page + 1..=self.end_page).collect();
        rest.chunks(batch_size.max(1)).map(<[usize]>::to_vec).collect()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_page, self.end_page)
    }
}

/// Number of documents needed to hold `page_count` pages with at most
/// `max_per_document` pages each.
pub fn part_count(page_count: usize, max_per_document: usize) -> usize {
    page_count.div_ceil(max_per_document.max(1))
}

/// Partition `1..=page_count` into segments.
///
/// With `split == false`, or when everything fits, one segment covers the
/// whole run. Otherwise every segment but the last holds exactly
/// `max_per_document` pages.
pub fn plan_segments(page_count: usize, max_per_document: usize, split: bool) -> Vec<Segment> {
    if page_count == 0 {
        return Vec::new();
    }
    let max = max_per_document.max(1);
    if page_count <= max || !split {
        return vec![Segment::new(1, page_count)];
    }

    (0..part_count(page_count, max))
        .map(|i| {
            let start = i * max + 1;
            let end = ((i + 1) * max).min(page_count);
            Segment::new(start, end)
        })
        .collect()
}

/// Decide whether an oversized run is split, consulting the callback when
/// the mode is [`SplitMode::Ask`].
pub fn should_split(
    mode: SplitMode,
    page_count: usize,
    max_per_document: usize,
    callback: Option<&dyn DownloadProgressCallback>,
) -> bool {
    if page_count <= max_per_document {
        return false;
    }
    let parts = part_count(page_count, max_per_document);
    let split = match mode {
        SplitMode::Always => true,
        SplitMode::Never => false,
        SplitMode::Ask => callback.map_or(true, |cb| cb.confirm_split(page_count, parts)),
    };
    if split {
        info!(
            "{} pages exceed the limit of {}, splitting into {} parts",
            page_count, max_per_document, parts
        );
    } else {
        info!(
            "{} pages exceed the limit of {}, building a single document anyway",
            page_count, max_per_document
        );
    }
    split
}
