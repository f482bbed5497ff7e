//! Cooperative cancellation and wall-clock limits for long-running scans.

use crate::error::{ScanFailure, TimeoutKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Checks the token plus the overall and per-batch clocks.
#[derive(Debug, Clone)]
pub struct ScanGuard {
    token: Option<CancellationToken>,
    overall_timeout: Option<Duration>,
    per_batch_timeout: Option<Duration>,
    started: Instant,
    batch_started: Instant,
}

impl ScanGuard {
    pub fn new(
        token: Option<CancellationToken>,
        overall_timeout: Option<Duration>,
        per_batch_timeout: Option<Duration>,
    ) -> Self {
        let now = Instant::now();
        Self {
            token,
            overall_timeout,
            per_batch_timeout,
            started: now,
            batch_started: now,
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Restart the per-batch clock.
    pub fn reset_batch(&mut self, now: Instant) {
        self.batch_started = now;
    }

    pub fn check(&self, now: Instant) -> Result<(), ScanFailure> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(ScanFailure::Cancelled);
        }
        if let Some(limit) = self.overall_timeout {
            if now.saturating_duration_since(self.started) >= limit {
                return Err(ScanFailure::Timeout(TimeoutKind::Overall));
            }
        }
        if let Some(limit) = self.per_batch_timeout {
            if now.saturating_duration_since(self.batch_started) >= limit {
                return Err(ScanFailure::Timeout(TimeoutKind::PerBatch));
            }
        }
        Ok(())
    }
}
