//! Orchestration options
//!
//! [`RecipeOptions`] is the loose, all-optional shape read from config files
//! and command lines. It is resolved once per invocation into an immutable
//! [`ResolvedOptions`] that the engine reads from.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FlockError, Result};
use crate::types::ActionKind;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 100;
pub const DEFAULT_PAGE_SLEEP_SECS: u64 = 2;
/// `Retry-After` sent on single actions
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
/// `Retry-After` sent inside paginated loops
pub const DEFAULT_LOOP_RETRY_AFTER_SECS: u64 = 60 * 60;
pub const DEFAULT_REQUESTS_PER_INTERVAL: u32 = 30;
pub const DEFAULT_SLEEP_PER_INTERVAL_MINUTES: u64 = 10;
pub const DEFAULT_RATE_LIMIT_THRESHOLD: f64 = 0.04;
pub const QUOTA_RECOVERY_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeOptions {
    pub page: Option<u32>,
    pub page_limit: Option<u32>,
    pub per_page: Option<u32>,
    pub sleep_seconds: Option<u64>,
    pub retry_after_seconds: Option<u64>,
    pub requests_per_interval: Option<u32>,
    pub sleep_per_interval_minutes: Option<u64>,
    pub rate_limit_threshold: Option<f64>,
}

impl RecipeOptions {
    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: RecipeOptions) -> RecipeOptions {
        RecipeOptions {
            page: other.page.or(self.page),
            page_limit: other.page_limit.or(self.page_limit),
            per_page: other.per_page.or(self.per_page),
            sleep_seconds: other.sleep_seconds.or(self.sleep_seconds),
            retry_after_seconds: other.retry_after_seconds.or(self.retry_after_seconds),
            requests_per_interval: other.requests_per_interval.or(self.requests_per_interval),
            sleep_per_interval_minutes: other
                .sleep_per_interval_minutes
                .or(self.sleep_per_interval_minutes),
            rate_limit_threshold: other.rate_limit_threshold.or(self.rate_limit_threshold),
        }
    }

    /// Fill every default and validate.
    ///
    /// `action` picks the per-action courtesy sleep when `sleep_seconds` is
    /// not set; pass `None` for list-only operations.
    pub fn resolve(&self, action: Option<ActionKind>) -> Result<ResolvedOptions> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            return Err(FlockError::InvalidInput("page must be at least 1".to_string()));
        }

        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 {
            return Err(FlockError::InvalidInput(
                "per_page must be greater than 0".to_string(),
            ));
        }

        match self.page_limit {
            Some(0) => {
                return Err(FlockError::InvalidInput(
                    "page_limit must be at least 1".to_string(),
                ))
            }
            Some(limit) if limit < page => {
                return Err(FlockError::InvalidInput(format!(
                    "page ({}) is past page_limit ({})",
                    page, limit
                )))
            }
            _ => {}
        }

        let requests_per_interval = self
            .requests_per_interval
            .unwrap_or(DEFAULT_REQUESTS_PER_INTERVAL);
        if requests_per_interval == 0 {
            return Err(FlockError::InvalidInput(
                "requests_per_interval must be greater than 0".to_string(),
            ));
        }

        let rate_limit_threshold = self
            .rate_limit_threshold
            .unwrap_or(DEFAULT_RATE_LIMIT_THRESHOLD);
        if !(0.0..=1.0).contains(&rate_limit_threshold) {
            return Err(FlockError::InvalidInput(format!(
                "rate_limit_threshold must be between 0 and 1 (got {})",
                rate_limit_threshold
            )));
        }

        let page_sleep = self
            .sleep_seconds
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_PAGE_SLEEP_SECS));
        let action_sleep = match (self.sleep_seconds, action) {
            (Some(secs), _) => Duration::from_secs(secs),
            (None, Some(kind)) => kind.default_sleep(),
            (None, None) => page_sleep,
        };

        Ok(ResolvedOptions {
            page,
            page_limit: self.page_limit,
            per_page,
            page_sleep,
            action_sleep,
            retry_after: self
                .retry_after_seconds
                .unwrap_or(DEFAULT_LOOP_RETRY_AFTER_SECS),
            requests_per_interval,
            sleep_per_interval: Duration::from_secs(
                60 * self
                    .sleep_per_interval_minutes
                    .unwrap_or(DEFAULT_SLEEP_PER_INTERVAL_MINUTES),
            ),
            rate_limit_threshold,
            quota_recovery: QUOTA_RECOVERY_WINDOW,
        })
    }
}

/// Fully resolved, immutable settings for one orchestration call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub page: u32,
    pub page_limit: Option<u32>,
    pub per_page: u32,
    pub page_sleep: Duration,
    pub action_sleep: Duration,
    /// Seconds sent in the `Retry-After` header
    pub retry_after: u64,
    pub requests_per_interval: u32,
    pub sleep_per_interval: Duration,
    pub rate_limit_threshold: f64,
    pub quota_recovery: Duration,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_limit: None,
            per_page: DEFAULT_PER_PAGE,
            page_sleep: Duration::from_secs(DEFAULT_PAGE_SLEEP_SECS),
            action_sleep: Duration::from_secs(DEFAULT_PAGE_SLEEP_SECS),
            retry_after: DEFAULT_LOOP_RETRY_AFTER_SECS,
            requests_per_interval: DEFAULT_REQUESTS_PER_INTERVAL,
            sleep_per_interval: Duration::from_secs(60 * DEFAULT_SLEEP_PER_INTERVAL_MINUTES),
            rate_limit_threshold: DEFAULT_RATE_LIMIT_THRESHOLD,
            quota_recovery: QUOTA_RECOVERY_WINDOW,
        }
    }
}

impl ResolvedOptions {
    /// The same pacing with the page window removed, so enumeration starts at
    /// the first page and runs until the collection is exhausted. Lookup sets
    /// are always built this way.
    pub fn whole_collection(&self) -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_limit: None,
            ..self.clone()
        }
    }

    /// Options with every courtesy sleep removed, for tests and dry runs.
    pub fn without_courtesy_sleeps(mut self) -> Self {
        self.page_sleep = Duration::ZERO;
        self.action_sleep = Duration::ZERO;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let resolved = RecipeOptions::default().resolve(None).unwrap();
        assert_eq!(resolved.page, 1);
        assert_eq!(resolved.page_limit, None);
        assert_eq!(resolved.per_page, 100);
        assert_eq!(resolved.page_sleep, Duration::from_secs(2));
        assert_eq!(resolved.retry_after, 3600);
        assert_eq!(resolved.requests_per_interval, 30);
        assert_eq!(resolved.sleep_per_interval, Duration::from_secs(600));
        assert_eq!(resolved.rate_limit_threshold, 0.04);
        assert_eq!(resolved.quota_recovery, Duration::from_secs(3600));
    }

    #[test]
    fn test_default_matches_resolved_defaults() {
        assert_eq!(
            ResolvedOptions::default(),
            RecipeOptions::default().resolve(None).unwrap()
        );
    }

    #[test]
    fn test_action_sleep_follows_action_kind() {
        let options = RecipeOptions::default();
        assert_eq!(
            options.resolve(Some(ActionKind::Unfollow)).unwrap().action_sleep,
            Duration::from_secs(1)
        );
        assert_eq!(
            options.resolve(Some(ActionKind::Follow)).unwrap().action_sleep,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_explicit_sleep_overrides_both() {
        let options = RecipeOptions {
            sleep_seconds: Some(5),
            ..Default::default()
        };
        let resolved = options.resolve(Some(ActionKind::Unfollow)).unwrap();
        assert_eq!(resolved.page_sleep, Duration::from_secs(5));
        assert_eq!(resolved.action_sleep, Duration::from_secs(5));
    }

    #[test]
    fn test_merge_prefers_overlay() {
        let base = RecipeOptions {
            per_page: Some(50),
            page_limit: Some(4),
            ..Default::default()
        };
        let overlay = RecipeOptions {
            per_page: Some(10),
            ..Default::default()
        };
        let merged = base.merge(overlay);
        assert_eq!(merged.per_page, Some(10));
        assert_eq!(merged.page_limit, Some(4));
    }

    #[test]
    fn test_resolve_rejects_invalid_values() {
        let cases = [
            RecipeOptions {
                page: Some(0),
                ..Default::default()
            },
            RecipeOptions {
                per_page: Some(0),
                ..Default::default()
            },
            RecipeOptions {
                page_limit: Some(0),
                ..Default::default()
            },
            RecipeOptions {
                page: Some(3),
                page_limit: Some(2),
                ..Default::default()
            },
            RecipeOptions {
                requests_per_interval: Some(0),
                ..Default::default()
            },
            RecipeOptions {
                rate_limit_threshold: Some(1.5),
                ..Default::default()
            },
        ];

        for options in cases {
            let err = options.resolve(None).unwrap_err();
            assert_eq!(err.exit_code(), 3, "{:?} should be invalid input", options);
        }
    }

    #[test]
    fn test_single_page_window() {
        let options = RecipeOptions {
            page: Some(4),
            page_limit: Some(4),
            ..Default::default()
        };
        let resolved = options.resolve(None).unwrap();
        assert_eq!((resolved.page, resolved.page_limit), (4, Some(4)));
    }

    #[test]
    fn test_whole_collection_clears_page_window() {
        let options = RecipeOptions {
            page: Some(3),
            page_limit: Some(5),
            per_page: Some(20),
            requests_per_interval: Some(7),
            ..Default::default()
        };
        let resolved = options.resolve(Some(ActionKind::Unfollow)).unwrap();
        let whole = resolved.whole_collection();

        assert_eq!(whole.page, 1);
        assert_eq!(whole.page_limit, None);
        assert_eq!(whole.per_page, 20);
        assert_eq!(whole.requests_per_interval, 7);
        assert_eq!(whole.action_sleep, resolved.action_sleep);
    }

    #[test]
    fn test_without_courtesy_sleeps() {
        let resolved = ResolvedOptions::default().without_courtesy_sleeps();
        assert!(resolved.page_sleep.is_zero());
        assert!(resolved.action_sleep.is_zero());
        assert_eq!(resolved.sleep_per_interval, Duration::from_secs(600));
    }
}
