//! Cooperative suspension points
//!
//! Every sleep taken by the engine goes through a [`Pauser`]. Pauses run to
//! completion; there is no cancellation and no early wake.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;

/// Why the engine is pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Remaining budget fell under the threshold
    QuotaRecovery,
    /// `requests_per_interval` accepted actions were dispatched
    IntervalThrottle,
    /// Fixed delay after each request
    Courtesy,
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::QuotaRecovery => write!(f, "quota recovery"),
            PauseReason::IntervalThrottle => write!(f, "interval throttle"),
            PauseReason::Courtesy => write!(f, "courtesy"),
        }
    }
}

#[async_trait]
pub trait Pauser: Send + Sync {
    /// Suspend the current operation for `duration`.
    async fn pause(&self, reason: PauseReason, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPauser;

#[async_trait]
impl Pauser for TokioPauser {
    async fn pause(&self, _reason: PauseReason, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration).await;
        }
    }
}
