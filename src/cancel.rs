//! Cooperative cancellation for a download run.
//!
//! A [`CancellationToken`] is created per run and handed by reference to
//! every stage. The stop action is the only writer; every stage reads it at
//! its checkpoints (before a segment, before a batch, before each downloaded
//! page and before admitting each download). Nothing is interrupted
//! mid-flight: in-flight downloads and engine messages always complete.
//!
//! Clones share state, so the CLI can keep one clone in its Ctrl-C handler
//! while the pipeline holds another.

use crate::error::SlidesError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

const DEFAULT_REASON: &str = "cancelled by user";

#[derive(Debug, Default)]
struct TokenState {
    aborted: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// Shared abort flag with a reason.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The first reason wins; later calls are no-ops.
    pub fn abort(&self, reason: impl Into<String>) {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.inner.aborted.load(Ordering::SeqCst) {
            return;
        }
        let reason = reason.into();
        info!("Download cancelled: {}", reason);
        *slot = Some(reason);
        self.inner.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// The recorded reason, if cancellation was requested.
    pub fn reason(&self) -> Option<String> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Checkpoint: `Err(SlidesError::Aborted)` once cancellation was requested.
    pub fn throw_if_aborted(&self) -> Result<(), SlidesError> {
        if self.is_aborted() {
            return Err(SlidesError::Aborted {
                reason: self.reason().unwrap_or_else(|| DEFAULT_REASON.to_string()),
            });
        }
        Ok(())
    }

    /// Clear the flag so the token can drive another run.
    ///
    /// Only call this between runs.
    pub fn reset(&self) {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
        self.inner.aborted.store(false, Ordering::SeqCst);
    }
}
