//! Remote user-graph API abstraction
//!
//! The engine only ever talks to the remote service through these traits:
//! [`GraphSource`] enumerates target collections and reports the request
//! budget, [`ActionSink`] performs one mutating action on one account.
//!
//! # Examples
//!
//! ```no_run
//! use libflock::api::{github::GithubClient, ActionSink, GraphSource};
//! use libflock::config::GithubConfig;
//! use libflock::types::{ActionKind, PageCursor, TargetSelector, UserTarget};
//!
//! # async fn example() -> libflock::error::Result<()> {
//! let config = GithubConfig::default();
//! let client = GithubClient::new(&config, config.resolve_token()?)?;
//!
//! let rate = client.query_rate().await?;
//! println!("{} of {} requests left", rate.remaining, rate.limit);
//!
//! let selector = TargetSelector::AuthUser(UserTarget::Followers);
//! let page = client.fetch_page(&selector, PageCursor::new(1, 100), 60).await?;
//! for account in &page.items {
//!     client.action(ActionKind::Follow).act(&account.id, 60).await?;
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ActionKind, ActionResult, PageCursor, PageResult, RateSnapshot, TargetSelector};

pub mod github;

// Mock capabilities are available for all builds to support integration tests
pub mod mock;

/// Read side of the remote API.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Current request budget of the authenticated principal
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Unavailable` if the query fails, or
    /// `UpstreamError::NonSuccessStatus` if the server rejects it.
    async fn query_rate(&self) -> Result<RateSnapshot>;

    /// Fetch one page of a target collection
    ///
    /// Statuses that are neither a success nor an error answer are reported
    /// in the returned [`PageResult`]. `retry_after` is the `Retry-After`
    /// hint in seconds.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Unavailable` on transport failure and
    /// `UpstreamError::NonSuccessStatus` when the server answers with an
    /// error status. Either one aborts the enumeration.
    async fn fetch_page(
        &self,
        selector: &TargetSelector,
        cursor: PageCursor,
        retry_after: u64,
    ) -> Result<PageResult>;
}

/// One mutating action bound to a kind (follow, unfollow, ...).
#[async_trait]
pub trait ActionSink: Send + Sync {
    fn kind(&self) -> ActionKind;

    /// Perform the action on `account`
    ///
    /// # Errors
    ///
    /// Any failure is returned unmodified and halts a running recipe.
    async fn act(&self, account: &str, retry_after: u64) -> Result<ActionResult>;
}
