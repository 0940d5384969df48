//! Recipes: bulk actions over a target collection
//!
//! A recipe runs in two phases. First the whole target collection is
//! paginated (throttled only by the rate tracker), then the action is
//! dispatched to each discovered account in discovery order, throttled by a
//! fixed-window [`IntervalThrottle`].
//!
//! # Example
//!
//! ```no_run
//! use libflock::api::github::GithubClient;
//! use libflock::config::Config;
//! use libflock::lookup::{Assertion, LookupSetBuilder};
//! use libflock::options::RecipeOptions;
//! use libflock::recipe::Recipe;
//! use libflock::types::{ActionKind, TargetSelector, UserTarget};
//!
//! # async fn example() -> libflock::Result<()> {
//! let config = Config::load()?;
//! let client = GithubClient::new(&config.github, config.github.resolve_token()?)?;
//! let options = RecipeOptions::default().resolve(Some(ActionKind::Unfollow))?;
//!
//! // Unfollow everyone who does not follow back
//! let followers = LookupSetBuilder::new(&client, &options)
//!     .build(&TargetSelector::AuthUser(UserTarget::Followers))
//!     .await?;
//! let report = Recipe::new(&client, &options)
//!     .perform_with_assert(
//!         &followers,
//!         Assertion::NotFound,
//!         &client.action(ActionKind::Unfollow),
//!         &TargetSelector::AuthUser(UserTarget::Following),
//!     )
//!     .await?;
//! println!("unfollowed {} accounts", report.dispatched);
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{ActionSink, GraphSource};
use crate::error::Result;
use crate::lookup::{Assertion, LookupSet};
use crate::options::ResolvedOptions;
use crate::paginate::Paginator;
use crate::pause::{PauseReason, Pauser, TokioPauser};
use crate::types::{ActionKind, TargetAccount, TargetSelector};

/// Fixed-window burst limiter for dispatched actions.
///
/// After `requests_per_interval` dispatches the next dispatch is preceded
/// by exactly one pause of `sleep_per_interval`, after which the counter
/// starts again from zero.
#[derive(Debug, Clone)]
pub struct IntervalThrottle {
    requests_per_interval: u32,
    sleep_per_interval: Duration,
    requests_this_interval: u32,
    pauses: u32,
}

impl IntervalThrottle {
    pub fn new(requests_per_interval: u32, sleep_per_interval: Duration) -> Self {
        Self {
            requests_per_interval,
            sleep_per_interval,
            requests_this_interval: 0,
            pauses: 0,
        }
    }

    pub fn requests_this_interval(&self) -> u32 {
        self.requests_this_interval
    }

    pub fn pauses(&self) -> u32 {
        self.pauses
    }

    /// Wait for the window to reset if it is full. Call before a dispatch.
    pub async fn ready(&mut self, pauser: &dyn Pauser) {
        if self.requests_this_interval < self.requests_per_interval {
            return;
        }

        warn!(
            "{} sleep to lower the chance of exceeding the secondary rate limit...",
            humantime::format_duration(self.sleep_per_interval)
        );
        pauser
            .pause(PauseReason::IntervalThrottle, self.sleep_per_interval)
            .await;
        self.requests_this_interval = 0;
        self.pauses += 1;
    }

    /// Count one dispatched action.
    pub fn record(&mut self) {
        self.requests_this_interval += 1;
    }
}

/// What a recipe run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeReport {
    pub action: ActionKind,
    pub target: String,
    /// Accounts found across all pages
    pub discovered: usize,
    pub dispatched: usize,
    /// Accounts rejected by the assertion
    pub skipped: usize,
    pub pages_fetched: u32,
    pub throttle_pauses: u32,
    /// Local estimate of the remaining request budget
    pub rate_remaining: i64,
}

/// Runs actions over a target collection.
pub struct Recipe<'a> {
    source: &'a dyn GraphSource,
    pauser: &'a dyn Pauser,
    options: &'a ResolvedOptions,
}

impl<'a> Recipe<'a> {
    pub fn new(source: &'a dyn GraphSource, options: &'a ResolvedOptions) -> Self {
        Self {
            source,
            pauser: &TokioPauser,
            options,
        }
    }

    pub fn with_pauser(mut self, pauser: &'a dyn Pauser) -> Self {
        self.pauser = pauser;
        self
    }

    /// Perform `action` on every account of `selector`
    ///
    /// # Errors
    ///
    /// Fails if the rate query or a page fetch fails, or on the first failed
    /// action. Actions dispatched before the failure stay in effect.
    pub async fn perform(
        &self,
        action: &dyn ActionSink,
        selector: &TargetSelector,
    ) -> Result<RecipeReport> {
        info!(action = %action.kind(), collection = %selector, "Performing");
        self.run(action, selector, |_| true).await
    }

    /// Perform `action` on the accounts of `selector` whose membership in
    /// `lookup` satisfies `assertion`
    ///
    /// Skipped accounts do not count toward the interval throttle.
    ///
    /// # Errors
    ///
    /// Same as [`Recipe::perform`].
    pub async fn perform_with_assert(
        &self,
        lookup: &LookupSet,
        assertion: Assertion,
        action: &dyn ActionSink,
        selector: &TargetSelector,
    ) -> Result<RecipeReport> {
        info!(
            action = %action.kind(),
            collection = %selector,
            assertion = ?assertion,
            "Performing with assert"
        );
        self.run(action, selector, |account| {
            assertion.holds(lookup.contains(&account.id))
        })
        .await
    }

    async fn run<F>(
        &self,
        action: &dyn ActionSink,
        selector: &TargetSelector,
        accept: F,
    ) -> Result<RecipeReport>
    where
        F: Fn(&TargetAccount) -> bool,
    {
        let mut paginator =
            Paginator::start(self.source, self.pauser, selector, self.options).await?;
        let accounts = paginator.collect_all().await?;
        let pages_fetched = paginator.pages_fetched();
        let mut tracker = paginator.into_tracker();

        info!(total = accounts.len(), "Retrieved user accounts");

        let mut throttle = IntervalThrottle::new(
            self.options.requests_per_interval,
            self.options.sleep_per_interval,
        );
        let mut dispatched = 0;
        let mut skipped = 0;

        for account in &accounts {
            if !accept(account) {
                debug!(account = %account.id, "Did not satisfy the assertion, skipped");
                skipped += 1;
                continue;
            }

            throttle.ready(self.pauser).await;
            action.act(&account.id, self.options.retry_after).await?;
            tracker.subtract(1);
            throttle.record();
            dispatched += 1;

            self.pauser
                .pause(PauseReason::Courtesy, self.options.action_sleep)
                .await;
        }

        info!(
            action = %action.kind(),
            collection = %selector,
            dispatched,
            skipped,
            "Done performing"
        );

        Ok(RecipeReport {
            action: action.kind(),
            target: selector.to_string(),
            discovered: accounts.len(),
            dispatched,
            skipped,
            pages_fetched,
            throttle_pauses: throttle.pauses(),
            rate_remaining: tracker.snapshot().remaining,
        })
    }
}
