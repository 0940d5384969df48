//! Rate-aware pagination over a target collection
//!
//! Each step consults the [`RateTracker`] (possibly pausing for quota
//! recovery), fetches the page at the cursor, charges one request to the
//! tracker and then decides whether the collection is finished.
//!
//! Pages are always requested in increasing index order. A [`Paginator`] is
//! not resumable: to restart, build a new one with a fresh cursor.

use futures::stream::{self, Stream};
use tracing::{info, warn};

use crate::api::GraphSource;
use crate::error::{Result, UpstreamError};
use crate::options::ResolvedOptions;
use crate::pause::{PauseReason, Pauser};
use crate::rate::RateTracker;
use crate::types::{PageCursor, PageResult, TargetAccount, TargetSelector};

/// Outcome of inspecting a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    Continue,
    /// The page was empty
    Exhausted,
    /// The configured page limit was reached
    PageLimitReached,
}

impl BreakDecision {
    pub fn is_break(&self) -> bool {
        !matches!(self, BreakDecision::Continue)
    }
}

/// Decide whether pagination stops after `page` was fetched at `cursor`.
///
/// A non-success status does not affect the decision.
pub fn break_check(page: &PageResult, cursor: &PageCursor, page_limit: Option<u32>) -> BreakDecision {
    if page.items.is_empty() {
        return BreakDecision::Exhausted;
    }

    match page_limit {
        Some(limit) if cursor.page >= limit => BreakDecision::PageLimitReached,
        _ => BreakDecision::Continue,
    }
}

pub struct Paginator<'a> {
    source: &'a dyn GraphSource,
    pauser: &'a dyn Pauser,
    selector: &'a TargetSelector,
    options: &'a ResolvedOptions,
    tracker: RateTracker,
    cursor: PageCursor,
    pages_fetched: u32,
    done: bool,
}

impl<'a> Paginator<'a> {
    /// Start paginating `selector`, fetching the initial rate snapshot
    ///
    /// # Errors
    ///
    /// Fails if the initial rate query fails.
    pub async fn start(
        source: &'a dyn GraphSource,
        pauser: &'a dyn Pauser,
        selector: &'a TargetSelector,
        options: &'a ResolvedOptions,
    ) -> Result<Paginator<'a>> {
        let tracker =
            RateTracker::start(source, options.rate_limit_threshold, options.quota_recovery)
                .await?;
        Ok(Self::with_tracker(source, pauser, selector, options, tracker))
    }

    /// Paginate with an already fetched rate tracker
    pub fn with_tracker(
        source: &'a dyn GraphSource,
        pauser: &'a dyn Pauser,
        selector: &'a TargetSelector,
        options: &'a ResolvedOptions,
        tracker: RateTracker,
    ) -> Paginator<'a> {
        Self {
            source,
            pauser,
            selector,
            options,
            tracker,
            cursor: PageCursor::new(options.page, options.per_page),
            pages_fetched: 0,
            done: false,
        }
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn tracker(&self) -> &RateTracker {
        &self.tracker
    }

    /// Give up the tracker, e.g. to keep charging it for actions
    pub fn into_tracker(self) -> RateTracker {
        self.tracker
    }

    /// Fetch the next batch of accounts
    ///
    /// Returns `Ok(None)` once the collection is exhausted or the page limit
    /// was passed. The batch of the page that reaches the page limit is still
    /// returned.
    ///
    /// # Errors
    ///
    /// Transport failures from the source end the pagination and are
    /// returned unmodified.
    pub async fn next_page(&mut self) -> Result<Option<Vec<TargetAccount>>> {
        if self.done {
            return Ok(None);
        }

        let context = format!("{} page={}", self.selector, self.cursor.page);
        self.tracker.sleep_if_low(self.pauser, &context).await;

        info!(
            collection = %self.selector,
            page = self.cursor.page,
            per_page = self.cursor.per_page,
            "Getting {}",
            self.selector
        );
        let page = match self
            .source
            .fetch_page(self.selector, self.cursor, self.options.retry_after)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };
        self.pages_fetched += 1;
        self.tracker.subtract(1);
        self.pauser
            .pause(PauseReason::Courtesy, self.options.page_sleep)
            .await;

        if !page.is_success() {
            let warning = UpstreamError::NonSuccessStatus {
                status: page.status,
                context: format!("retrieving page {} of {}", self.cursor.page, self.selector),
            };
            warn!("Something went wrong: {}", warning);
        }

        match break_check(&page, &self.cursor, self.options.page_limit) {
            BreakDecision::Exhausted => {
                info!("The pages end here, no more users found");
                self.done = true;
                Ok(None)
            }
            BreakDecision::PageLimitReached => {
                info!(
                    page_limit = self.cursor.page,
                    "The defined page_limit was reached"
                );
                self.done = true;
                Ok(Some(page.items))
            }
            BreakDecision::Continue => {
                self.cursor.advance();
                Ok(Some(page.items))
            }
        }
    }

    /// Drain every remaining page into one list, preserving discovery order
    pub async fn collect_all(&mut self) -> Result<Vec<TargetAccount>> {
        let mut accounts = Vec::new();
        while let Some(batch) = self.next_page().await? {
            accounts.extend(batch);
        }
        Ok(accounts)
    }

    /// Lazy stream of page batches
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<TargetAccount>>> + 'a {
        stream::unfold(self, |mut paginator| async move {
            match paginator.next_page().await {
                Ok(Some(batch)) => Some((Ok(batch), paginator)),
                Ok(None) => None,
                Err(e) => Some((Err(e), paginator)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockGraph;
    use crate::types::{RateSnapshot, UserTarget};
    use futures::StreamExt;
    use std::time::Duration;

    fn followers() -> TargetSelector {
        TargetSelector::AuthUser(UserTarget::Followers)
    }

    fn ids(accounts: &[TargetAccount]) -> Vec<&str> {
        accounts.iter().map(|a| a.id.as_str()).collect()
    }

    fn page(ids: &[&str]) -> PageResult {
        PageResult::ok(ids.iter().map(|id| TargetAccount::new(*id)).collect())
    }

    #[test]
    fn test_break_check_empty_page() {
        let decision = break_check(&page(&[]), &PageCursor::new(1, 100), None);
        assert_eq!(decision, BreakDecision::Exhausted);
        assert!(decision.is_break());
    }

    #[test]
    fn test_break_check_page_limit() {
        let full = page(&["a"]);
        assert_eq!(
            break_check(&full, &PageCursor::new(2, 100), Some(3)),
            BreakDecision::Continue
        );
        assert_eq!(
            break_check(&full, &PageCursor::new(3, 100), Some(3)),
            BreakDecision::PageLimitReached
        );
        assert_eq!(
            break_check(&full, &PageCursor::new(9, 100), None),
            BreakDecision::Continue
        );
    }

    #[test]
    fn test_break_check_ignores_status() {
        let failed = PageResult {
            status: 500,
            items: vec![TargetAccount::new("a")],
        };
        assert_eq!(
            break_check(&failed, &PageCursor::new(1, 100), None),
            BreakDecision::Continue
        );
    }

    #[tokio::test]
    async fn test_pages_until_empty() {
        let mock = MockGraph::with_pages(&followers(), &[&["a", "b"], &["c", "d"], &[]]);
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions::default();

        let mut paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        let accounts = paginator.collect_all().await.unwrap();

        assert_eq!(ids(&accounts), vec!["a", "b", "c", "d"]);
        assert_eq!(mock.fetched_pages(), vec![1, 2, 3]);
        assert_eq!(paginator.pages_fetched(), 3);
        assert_eq!(paginator.cursor().page, 3);
        assert_eq!(paginator.tracker().snapshot().remaining, 5000 - 3);
        assert!(paginator.next_page().await.unwrap().is_none());
        assert_eq!(mock.fetched_pages().len(), 3, "no fetch after termination");
    }

    #[tokio::test]
    async fn test_page_limit_stops_early() {
        let mock = MockGraph::with_pages(&followers(), &[&["a"], &["b"], &["c"], &["d"]]);
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions {
            page_limit: Some(2),
            ..Default::default()
        };

        let mut paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        let accounts = paginator.collect_all().await.unwrap();

        assert_eq!(ids(&accounts), vec!["a", "b"]);
        assert_eq!(mock.fetched_pages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_starts_at_configured_page() {
        let mock = MockGraph::with_pages(&followers(), &[&["a"], &["b"], &["c"]]);
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions {
            page: 2,
            per_page: 1,
            ..Default::default()
        };

        let mut paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        let accounts = paginator.collect_all().await.unwrap();

        assert_eq!(ids(&accounts), vec!["b", "c"]);
        assert_eq!(mock.fetched_pages(), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_non_success_status_does_not_stop() {
        let mut mock = MockGraph::with_pages(&followers(), &[&["a"], &["b"]]);
        mock.set_page_status(&followers(), 1, 502);
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions::default();

        let mut paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        let accounts = paginator.collect_all().await.unwrap();

        assert_eq!(ids(&accounts), vec!["a", "b"]);
        assert_eq!(mock.fetched_pages(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_quota_pause_precedes_fetch() {
        let mut mock = MockGraph::with_pages(&followers(), &[&["a"]]);
        mock.set_rate(RateSnapshot::new(100, 97, 3, 0));
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions::default().without_courtesy_sleeps();

        let mut paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        paginator.next_page().await.unwrap();

        let events = mock.events();
        assert!(matches!(
            events[1],
            crate::api::mock::MockEvent::Pause {
                reason: PauseReason::QuotaRecovery,
                ..
            }
        ));
        assert!(matches!(
            events[2],
            crate::api::mock::MockEvent::Fetch { page: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_courtesy_sleep_after_each_page() {
        let mock = MockGraph::with_pages(&followers(), &[&["a"], &["b"]]);
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions::default();

        let mut paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        paginator.collect_all().await.unwrap();

        assert_eq!(
            mock.pauses(PauseReason::Courtesy),
            vec![Duration::from_secs(2); 3]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces() {
        let mut mock = MockGraph::with_pages(&followers(), &[&["a"], &["b"], &["c"]]);
        mock.fail_fetch_at(2);
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions::default();

        let mut paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        assert!(paginator.collect_all().await.is_err());
        assert_eq!(mock.fetched_pages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_stream_yields_batches() {
        let mock = MockGraph::with_pages(&followers(), &[&["a", "b"], &["c"]]);
        let pauser = mock.pauser();
        let selector = followers();
        let options = ResolvedOptions::default();

        let paginator = Paginator::start(&mock, &pauser, &selector, &options)
            .await
            .unwrap();
        let batches: Vec<_> = paginator.into_stream().collect().await;

        assert_eq!(batches.len(), 2);
        assert_eq!(ids(batches[0].as_ref().unwrap()), vec!["a", "b"]);
        assert_eq!(ids(batches[1].as_ref().unwrap()), vec!["c"]);
    }
}
