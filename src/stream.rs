//! Streaming API: emit each segment's document as soon as it is finalized.
//!
//! Segments are built strictly one after another; the stream yields their
//! documents in part order. A caller that persists each item as it arrives
//! keeps every part completed before a failure or cancellation.
//!
//! After the first `Err` (including [`SlidesError::Aborted`]) the stream
//! ends; no further segment is started.

use crate::cancel::CancellationToken;
use crate::config::DownloadConfig;
use crate::convert::{build_segment, SegmentJob};
use crate::error::SlidesError;
use crate::output::PdfDocument;
use crate::pipeline::fetch::SlideFetcher;
use crate::pipeline::input::SlideSetInfo;
use crate::pipeline::segment::{plan_segments, should_split, Segment};
use futures::stream;
use std::pin::Pin;
use std::vec;
use tokio_stream::Stream;
use tracing::{debug, info};

/// A boxed stream of finished documents, one per segment.
pub type DocumentStream<'a> = Pin<Box<dyn Stream<Item = Result<PdfDocument, SlidesError>> + Send + 'a>>;

struct RunState {
    segments: vec::IntoIter<Segment>,
    parts: usize,
    part: usize,
    added_pages: usize,
    finished: bool,
}

/// Plan the run and return a stream of its documents.
///
/// Planning happens here, eagerly: the split decision (including
/// [`crate::progress::DownloadProgressCallback::confirm_split`]) and
/// `on_run_start` fire before the first item is polled. Nothing is
/// downloaded until the stream is polled.
pub fn generate_stream<'a, F: SlideFetcher>(
    info: &'a SlideSetInfo,
    config: &'a DownloadConfig,
    fetcher: &'a F,
    token: &'a CancellationToken,
) -> DocumentStream<'a> {
    let callback = config.progress_callback.as_deref();
    let split = should_split(
        config.split_mode,
        info.page_count,
        config.max_pages_per_document,
        callback,
    );
    let segments = plan_segments(info.page_count, config.max_pages_per_document, split);
    let parts = segments.len();
    info!(
        "Planned {} document(s) for {} pages",
        parts, info.page_count
    );
    if let Some(cb) = callback {
        cb.on_run_start(info.page_count, parts);
    }

    let state = RunState {
        segments: segments.into_iter(),
        parts,
        part: 0,
        added_pages: 0,
        finished: false,
    };

    Box::pin(stream::unfold(state, move |mut state| async move {
        if state.finished {
            return None;
        }
        let Some(segment) = state.segments.next() else {
            if let Some(cb) = config.progress_callback.as_deref() {
                cb.on_run_complete(info.page_count, state.added_pages);
            }
            return None;
        };

        state.part += 1;
        let pause = config.inter_segment_pause();
        if state.part > 1 && !pause.is_zero() {
            if let Err(e) = token.throw_if_aborted() {
                state.finished = true;
                return Some((Err(e), state));
            }
            debug!("Pausing {:?} before segment {}", pause, state.part);
            tokio::time::sleep(pause).await;
        }

        let job = SegmentJob {
            segment,
            part: state.part,
            parts: state.parts,
        };
        let result = build_segment(info, config, fetcher, token, job).await;
        match &result {
            Ok(document) => state.added_pages += document.page_count,
            Err(_) => state.finished = true,
        }
        Some((result, state))
    }))
}
