//! Local estimate of the remaining request budget
//!
//! The budget is fetched once from the server at the start of an operation
//! and then decremented locally after every request. When the estimate falls
//! to the threshold the whole pipeline is paused for a fixed recovery window.

use std::time::Duration;
use tracing::{info, warn};

use crate::api::GraphSource;
use crate::error::Result;
use crate::pause::{PauseReason, Pauser};
use crate::types::RateSnapshot;

/// Tracks a [`RateSnapshot`] across one operation.
#[derive(Debug, Clone)]
pub struct RateTracker {
    snapshot: RateSnapshot,
    threshold: f64,
    recovery: Duration,
}

impl RateTracker {
    pub fn new(snapshot: RateSnapshot, threshold: f64, recovery: Duration) -> Self {
        Self {
            snapshot,
            threshold,
            recovery,
        }
    }

    /// Query the server-reported budget
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Unavailable` if the query fails. This is fatal
    /// to the calling operation; nothing is retried here.
    pub async fn fetch_initial(source: &dyn GraphSource) -> Result<RateSnapshot> {
        let snapshot = source.query_rate().await?;
        info!(
            limit = snapshot.limit,
            used = snapshot.used,
            remaining = snapshot.remaining,
            reset_at = %snapshot
                .reset_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            "Fetched rate limit"
        );
        Ok(snapshot)
    }

    /// Fetch the initial snapshot and start tracking it
    pub async fn start(
        source: &dyn GraphSource,
        threshold: f64,
        recovery: Duration,
    ) -> Result<Self> {
        let snapshot = Self::fetch_initial(source).await?;
        Ok(Self::new(snapshot, threshold, recovery))
    }

    pub fn snapshot(&self) -> &RateSnapshot {
        &self.snapshot
    }

    /// Record `amount` requests against the local estimate
    ///
    /// No clamping: a negative `remaining` means the estimate is stale.
    pub fn subtract(&mut self, amount: i64) {
        self.snapshot.used += amount;
        self.snapshot.remaining -= amount;
    }

    /// Whether `remaining <= limit * threshold`
    pub fn is_low(&self) -> bool {
        self.snapshot.remaining as f64 <= self.snapshot.limit as f64 * self.threshold
    }

    /// Pause for the recovery window if the budget is low
    ///
    /// Returns whether a pause was taken. The pause always runs to the end
    /// of the window.
    pub async fn sleep_if_low(&self, pauser: &dyn Pauser, context: &str) -> bool {
        if !self.is_low() {
            return false;
        }

        warn!(
            context,
            remaining = self.snapshot.remaining,
            limit = self.snapshot.limit,
            threshold = self.threshold,
            "Remaining rate limit is lower than the threshold, continuing after {}",
            humantime::format_duration(self.recovery)
        );
        pauser.pause(PauseReason::QuotaRecovery, self.recovery).await;
        true
    }
}
