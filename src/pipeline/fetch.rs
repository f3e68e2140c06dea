//! Slide downloads: the transport trait and the concurrency-limited fetcher.
//!
//! [`fetch_with_concurrency`] keeps at most `concurrency` downloads in
//! flight and writes each result into the slot of its input index, so the
//! output order never depends on completion order. A failed download leaves
//! its slot empty and never disturbs its siblings.
//!
//! Cancellation is checked before each admission. Once the token is aborted
//! no new download starts, but every download already admitted is awaited.

use crate::cancel::CancellationToken;
use crate::config::DownloadConfig;
use crate::error::SlidesError;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something that can download one slide image by URL.
///
/// [`HttpFetcher`] is the production implementation; tests plug in
/// in-memory fetchers.
pub trait SlideFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, SlidesError>> + Send;
}

/// Download `items` with at most `concurrency` operations in flight.
///
/// Returns one slot per input item, in input order: `Some(value)` for a
/// successful download, `None` when it failed or was never admitted because
/// the token was aborted. Returns once every admitted download has settled.
pub async fn fetch_with_concurrency<I, T, E, F, Fut>(
    items: Vec<I>,
    download: F,
    concurrency: usize,
    token: &CancellationToken,
) -> Vec<Option<T>>
where
    I: Display,
    E: Display,
    F: Fn(&I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let limit = concurrency.max(1);
    let mut slots: Vec<Option<T>> = items.iter().map(|_| None).collect();
    let mut in_flight = FuturesUnordered::new();

    for (index, item) in items.iter().enumerate() {
        if token.is_aborted() {
            info!(
                "Cancellation requested, not starting the remaining {} downloads",
                items.len() - index
            );
            break;
        }

        let pending = download(item);
        in_flight.push(async move { (index, pending.await) });

        if in_flight.len() >= limit {
            if let Some((done, result)) = in_flight.next().await {
                store(&mut slots, &items, done, result);
            }
        }
    }

    while let Some((done, result)) = in_flight.next().await {
        store(&mut slots, &items, done, result);
    }

    slots
}

fn store<I: Display, T, E: Display>(
    slots: &mut [Option<T>],
    items: &[I],
    index: usize,
    result: Result<T, E>,
) {
    match result {
        Ok(value) => slots[index] = Some(value),
        Err(e) => warn!("Download failed for {}: {}", items[index], e),
    }
}

/// HTTP transport built on `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Build a client honouring the config's timeout and user agent.
    pub fn new(config: &DownloadConfig) -> Result<Self, SlidesError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.download_timeout_secs));
        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let client = builder
            .build()
            .map_err(|e| SlidesError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs: config.download_timeout_secs,
        })
    }
}

impl SlideFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, SlidesError>> + Send {
        let url = url.to_string();
        async move {
            let response = self.client.get(&url).send().await.map_err(|e| {
                if e.is_timeout() {
                    SlidesError::DownloadTimeout {
                        url: url.clone(),
                        secs: self.timeout_secs,
                    }
                } else {
                    SlidesError::DownloadFailed {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

            if !response.status().is_success() {
                return Err(SlidesError::DownloadFailed {
                    url,
                    reason: format!("HTTP {}", response.status()),
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| SlidesError::DownloadFailed {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

            debug!("Downloaded {} ({} bytes)", url, bytes.len());
            Ok(bytes.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn never_exceeds_the_concurrency_limit() {
        for limit in [1usize, 2, 3, 7] {
            let gauge = Arc::new(Gauge::default());
            let items: Vec<usize> = (0..20).collect();
            let token = CancellationToken::new();

            let results = fetch_with_concurrency(
                items,
                |&i| {
                    let gauge = Arc::clone(&gauge);
                    async move {
                        gauge.enter();
                        sleep(Duration::from_millis(((i * 7) % 5) as u64 + 1)).await;
                        gauge.leave();
                        Ok::<_, String>(i)
                    }
                },
                limit,
                &token,
            )
            .await;

            assert_eq!(results.len(), 20);
            assert!(
                gauge.peak.load(Ordering::SeqCst) <= limit,
                "limit {limit} exceeded: peak {}",
                gauge.peak.load(Ordering::SeqCst)
            );
            assert_eq!(gauge.finished.load(Ordering::SeqCst), 20);
        }
    }

    #[tokio::test]
    async fn results_keep_input_order_under_out_of_order_completion() {
        let token = CancellationToken::new();
        let items: Vec<usize> = (0..10).collect();

        // Later items finish first.
        let results = fetch_with_concurrency(
            items,
            |&i| async move {
                sleep(Duration::from_millis((10 - i) as u64 * 2)).await;
                Ok::<_, String>(format!("slide-{i}"))
            },
            10,
            &token,
        )
        .await;

        for (i, slot) in results.iter().enumerate() {
            assert_eq!(slot.as_deref(), Some(format!("slide-{i}").as_str()));
        }
    }

    #[tokio::test]
    async fn failures_leave_empty_slots_without_affecting_siblings() {
        let token = CancellationToken::new();
        let results = fetch_with_concurrency(
            vec![1usize, 2, 3, 4],
            |&i| async move {
                if i == 3 {
                    Err("HTTP 500".to_string())
                } else {
                    Ok(i * 10)
                }
            },
            2,
            &token,
        )
        .await;

        assert_eq!(results, vec![Some(10), Some(20), None, Some(40)]);
    }

    #[tokio::test]
    async fn abort_stops_admission_but_drains_in_flight() {
        let token = CancellationToken::new();
        let gauge = Arc::new(Gauge::default());

        let results = fetch_with_concurrency(
            (0..5usize).collect(),
            |&i| {
                let gauge = Arc::clone(&gauge);
                let token = token.clone();
                async move {
                    gauge.enter();
                    if i == 0 {
                        token.abort("stop pressed");
                        sleep(Duration::from_millis(5)).await;
                    } else {
                        sleep(Duration::from_millis(20)).await;
                    }
                    gauge.leave();
                    Ok::<_, String>(i)
                }
            },
            2,
            &token,
        )
        .await;

        // Items 0 and 1 were admitted before the abort; both completed.
        assert_eq!(results, vec![Some(0), Some(1), None, None, None]);
        assert_eq!(gauge.started.load(Ordering::SeqCst), 2);
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn aborted_token_admits_nothing() {
        let token = CancellationToken::new();
        token.abort("before start");
        let calls = AtomicUsize::new(0);

        let results = fetch_with_concurrency(
            vec![1usize, 2, 3],
            |&i| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, String>(i) }
            },
            3,
            &token,
        )
        .await;

        assert_eq!(results, vec![None, None, None]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
