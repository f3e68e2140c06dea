//! Eager (whole-run) entry points and the per-segment orchestration.
//!
//! [`generate_pdf`] waits for every segment and returns all documents at
//! once. [`generate_to_dir`] writes each document as soon as its segment is
//! finalized, so parts completed before a cancellation stay on disk. Use
//! [`crate::stream::generate_stream`] to receive documents one by one.

use crate::cancel::CancellationToken;
use crate::config::DownloadConfig;
use crate::error::{PageError, SlidesError};
use crate::output::{
    part_file_name, sanitize_file_name, DownloadOutput, DownloadStats, PdfDocument, PdfOutput,
    SavedOutput,
};
use crate::pipeline::assemble::AssemblyEngine;
use crate::pipeline::fetch::{fetch_with_concurrency, HttpFetcher, SlideFetcher};
use crate::pipeline::input::SlideSetInfo;
use crate::pipeline::layout::PageBox;
use crate::pipeline::normalize::{normalize_page, NormalizedPage};
use crate::pipeline::segment::Segment;
use crate::stream::generate_stream;
use futures::stream::{StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Download a slide set and assemble it into one or more PDFs.
///
/// This is the primary entry point for the library. Slides are fetched over
/// HTTP with [`HttpFetcher`].
///
/// # Returns
/// `Ok(DownloadOutput)` once every segment is finalized, even if some slides
/// were skipped (check `output.stats.skipped_pages`).
///
/// # Errors
/// - [`SlidesError::Aborted`] when `token` was aborted; partial documents
///   are discarded
/// - [`SlidesError::SegmentSetupFailed`] when the first slide of a segment
///   cannot be fetched or decoded
/// - [`SlidesError::AssemblyFailed`] when the PDF worker fails
pub async fn generate_pdf(
    info: &SlideSetInfo,
    config: &DownloadConfig,
    token: &CancellationToken,
) -> Result<DownloadOutput, SlidesError> {
    let fetcher = HttpFetcher::new(config)?;
    generate_pdf_with(info, config, &fetcher, token).await
}

/// [`generate_pdf`] with a caller-supplied transport.
pub async fn generate_pdf_with<F: SlideFetcher>(
    info: &SlideSetInfo,
    config: &DownloadConfig,
    fetcher: &F,
    token: &CancellationToken,
) -> Result<DownloadOutput, SlidesError> {
    let start = Instant::now();
    info!(
        "Starting download: {} pages from {}",
        info.page_count, info.base_url
    );

    let documents: Vec<PdfDocument> = generate_stream(info, config, fetcher, token)
        .try_collect()
        .await?;

    let stats = DownloadStats::from_documents(
        info.page_count,
        &documents,
        start.elapsed().as_millis() as u64,
    );
    let output = PdfOutput::from_documents(documents)
        .ok_or_else(|| SlidesError::Internal("run produced no documents".to_string()))?;

    info!(
        "Download complete: {}/{} pages in {} document(s), {}ms",
        stats.added_pages, stats.total_pages, stats.segments, stats.total_duration_ms
    );

    Ok(DownloadOutput {
        file_name: info.file_name.clone(),
        output,
        stats,
    })
}

/// Download a slide set and write every document into `dir`.
///
/// Each file is written atomically (temp file + rename) the moment its
/// segment is finalized.
pub async fn generate_to_dir(
    info: &SlideSetInfo,
    dir: impl AsRef<Path>,
    config: &DownloadConfig,
    token: &CancellationToken,
) -> Result<SavedOutput, SlidesError> {
    let fetcher = HttpFetcher::new(config)?;
    generate_to_dir_with(info, dir, config, &fetcher, token).await
}

/// [`generate_to_dir`] with a caller-supplied transport.
pub async fn generate_to_dir_with<F: SlideFetcher>(
    info: &SlideSetInfo,
    dir: impl AsRef<Path>,
    config: &DownloadConfig,
    fetcher: &F,
    token: &CancellationToken,
) -> Result<SavedOutput, SlidesError> {
    let start = Instant::now();
    let dir = dir.as_ref();
    let mut stream = generate_stream(info, config, fetcher, token);
    let mut documents = Vec::new();
    let mut paths = Vec::new();
    let mut written_bytes = 0;

    while let Some(document) = stream.next().await {
        let mut document = document?;
        let path = dir.join(sanitize_file_name(&document.suggested_name(&info.file_name)));
        write_atomic(&path, &document.bytes).await?;
        info!("Saved {} ({} bytes)", path.display(), document.bytes.len());

        // Written; keep the metadata for stats only.
        written_bytes += document.bytes.len();
        document.bytes = Vec::new();
        paths.push(path);
        documents.push(document);
    }

    let mut stats = DownloadStats::from_documents(
        info.page_count,
        &documents,
        start.elapsed().as_millis() as u64,
    );
    stats.output_bytes = written_bytes;

    Ok(SavedOutput { paths, stats })
}

/// Synchronous wrapper around [`generate_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_pdf_sync(
    info: &SlideSetInfo,
    config: &DownloadConfig,
    token: &CancellationToken,
) -> Result<DownloadOutput, SlidesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlidesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_pdf(info, config, token))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SlidesError> {
    let write_failed = |source| SlidesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }
    let tmp_path: PathBuf = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;
    Ok(())
}

// ── Segment orchestration ────────────────────────────────────────────────

/// Where a segment sits in its run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentJob {
    pub segment: Segment,
    pub part: usize,
    pub parts: usize,
}

/// Build the document for one segment.
///
/// The first slide fixes the page box; if it cannot be fetched or decoded
/// the segment fails. Every later slide that fails is skipped. On any error
/// the assembly worker is torn down without finishing.
pub(crate) async fn build_segment<F: SlideFetcher>(
    info: &SlideSetInfo,
    config: &DownloadConfig,
    fetcher: &F,
    token: &CancellationToken,
    job: SegmentJob,
) -> Result<PdfDocument, SlidesError> {
    token.throw_if_aborted()?;

    let SegmentJob {
        segment,
        part,
        parts,
    } = job;
    let callback = config.progress_callback.as_deref();
    info!("Segment {}/{}: pages {}", part, parts, segment);
    if let Some(cb) = callback {
        cb.on_segment_start(part, parts, segment);
    }

    // ── Step 1: First page establishes the page box ──────────────────────
    let first_page = segment.start_page;
    let raw = fetcher
        .fetch(&info.page_url(first_page))
        .await
        .map_err(|e| SlidesError::SegmentSetupFailed {
            page: first_page,
            detail: e.to_string(),
        })?;
    let first = normalize_page(raw, first_page, config.reencode, config.jpeg_quality())
        .await
        .map_err(|e| SlidesError::SegmentSetupFailed {
            page: first_page,
            detail: e.to_string(),
        })?;
    let page_box = PageBox::from_pixels(first.width_px, first.height_px);

    // ── Step 2: Stream every page into a fresh worker ────────────────────
    let title = if parts > 1 {
        part_file_name(&info.file_name, part)
    } else {
        info.file_name.clone()
    };
    let engine = AssemblyEngine::spawn(title);
    let filled = fill_segment(info, config, fetcher, token, &engine, segment, page_box, first).await;
    let skipped = match filled {
        Ok(skipped) => skipped,
        Err(e) => {
            debug!("Discarding partial document for segment {}: {}", segment, e);
            engine.shutdown().await;
            return Err(e);
        }
    };

    // ── Step 3: Finalize ─────────────────────────────────────────────────
    let (bytes, page_count) = engine.finish().await?;
    info!(
        "Segment {}/{} done: {} pages, {} skipped, {} bytes",
        part,
        parts,
        page_count,
        skipped.len(),
        bytes.len()
    );
    if let Some(cb) = callback {
        cb.on_segment_complete(part, parts, page_count, bytes.len());
    }

    Ok(PdfDocument {
        bytes,
        segment,
        part,
        parts,
        page_count,
        skipped_pages: skipped,
    })
}

/// INIT with the first page, then every remaining page batch by batch.
/// Returns the pages that were skipped.
#[allow(clippy::too_many_arguments)]
async fn fill_segment<F: SlideFetcher>(
    info: &SlideSetInfo,
    config: &DownloadConfig,
    fetcher: &F,
    token: &CancellationToken,
    engine: &AssemblyEngine,
    segment: Segment,
    page_box: PageBox,
    first: NormalizedPage,
) -> Result<Vec<usize>, SlidesError> {
    let callback = config.progress_callback.as_deref();
    let total_pages = info.page_count;
    let cooldown = config.inter_batch_cooldown();
    let mut skipped = Vec::new();

    engine.init(page_box, first).await?;
    if let Some(cb) = callback {
        cb.on_page_complete(segment.start_page, total_pages);
    }

    for batch in segment.remaining_batches(config.batch_concurrency) {
        token.throw_if_aborted()?;
        debug!(
            "Fetching pages {}..={}",
            batch.first().copied().unwrap_or_default(),
            batch.last().copied().unwrap_or_default()
        );

        let slots = fetch_with_concurrency(
            batch.clone(),
            |page: &usize| {
                let url = info.page_url(*page);
                async move { fetcher.fetch(&url).await }
            },
            config.batch_concurrency,
            token,
        )
        .await;

        for (page, slot) in batch.into_iter().zip(slots) {
            token.throw_if_aborted()?;

            let normalized = match slot {
                Some(raw) => {
                    normalize_page(raw, page, config.reencode, config.jpeg_quality()).await
                }
                None => Err(PageError::DownloadFailed {
                    page,
                    detail: format!("no image from {}", info.page_url(page)),
                }),
            };

            match normalized {
                Ok(normalized) => {
                    engine.add_page(normalized).await?;
                    if let Some(cb) = callback {
                        cb.on_page_complete(page, total_pages);
                    }
                }
                Err(e) => {
                    warn!("Skipping page {}: {}", page, e);
                    if let Some(cb) = callback {
                        cb.on_page_skipped(page, total_pages, &e.to_string());
                    }
                    skipped.push(page);
                }
            }
        }

        if !cooldown.is_zero() {
            tokio::time::sleep(cooldown).await;
        }
    }

    Ok(skipped)
}
