//! Mock graph capabilities for testing
//!
//! This module provides a scriptable stand-in for the remote API. Pages,
//! the rate snapshot, transport failures and per-account action failures can
//! all be configured, and every fetch, action and pause is appended to a
//! shared, ordered event log for verification.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{ActionSink, GraphSource};
use crate::error::{Result, UpstreamError};
use crate::pause::{PauseReason, Pauser};
use crate::types::{
    ActionKind, ActionResult, PageCursor, PageResult, RateSnapshot, TargetAccount, TargetSelector,
};

/// Something observed by the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    RateQuery,
    Fetch {
        target: String,
        page: u32,
        per_page: u32,
        retry_after: u64,
    },
    Act {
        kind: ActionKind,
        account: String,
        retry_after: u64,
    },
    Pause {
        reason: PauseReason,
        duration: Duration,
    },
}

/// Configuration for mock graph behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Rate snapshot returned by `query_rate`
    pub rate: RateSnapshot,

    /// Whether `query_rate` fails
    pub rate_fails: bool,

    /// Scripted pages per target, indexed from page 1. Pages past the end are
    /// empty successes.
    pub pages: HashMap<String, Vec<PageResult>>,

    /// Page index whose fetch fails at the transport level
    pub fail_fetch_at: Option<u32>,

    /// Accounts whose action fails
    pub failing_accounts: HashSet<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            rate: RateSnapshot::new(5000, 0, 5000, 0),
            rate_fails: false,
            pages: HashMap::new(),
            fail_fetch_at: None,
            failing_accounts: HashSet::new(),
        }
    }
}

/// Mock remote API
#[derive(Clone)]
pub struct MockGraph {
    config: MockConfig,
    log: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockGraph {
    /// Create a new mock with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock serving `pages` of account names for `selector`
    pub fn with_pages(selector: &TargetSelector, pages: &[&[&str]]) -> Self {
        let mut mock = Self::new(MockConfig::default());
        mock.set_pages(selector, pages);
        mock
    }

    /// Script the pages of another target
    pub fn set_pages(&mut self, selector: &TargetSelector, pages: &[&[&str]]) {
        let pages = pages
            .iter()
            .map(|page| PageResult::ok(page.iter().map(|id| TargetAccount::new(*id)).collect()))
            .collect();
        self.config.pages.insert(selector.to_string(), pages);
    }

    /// Replace the status of one scripted page
    pub fn set_page_status(&mut self, selector: &TargetSelector, page: u32, status: u16) {
        if let Some(result) = self
            .config
            .pages
            .get_mut(&selector.to_string())
            .and_then(|pages| {
                (page as usize)
                    .checked_sub(1)
                    .and_then(|index| pages.get_mut(index))
            })
        {
            result.status = status;
        }
    }

    pub fn set_rate(&mut self, rate: RateSnapshot) {
        self.config.rate = rate;
    }

    pub fn fail_rate_query(&mut self) {
        self.config.rate_fails = true;
    }

    pub fn fail_fetch_at(&mut self, page: u32) {
        self.config.fail_fetch_at = Some(page);
    }

    pub fn fail_action_on(&mut self, account: &str) {
        self.config.failing_accounts.insert(account.to_string());
    }

    /// Bind an action kind to this mock.
    pub fn action(&self, kind: ActionKind) -> MockAction {
        MockAction {
            graph: self.clone(),
            kind,
        }
    }

    /// A pauser recording into this mock's event log without sleeping
    pub fn pauser(&self) -> RecordingPauser {
        RecordingPauser {
            log: Arc::clone(&self.log),
        }
    }

    /// All events so far
    pub fn events(&self) -> Vec<MockEvent> {
        self.log.lock().unwrap().clone()
    }

    /// Page indices fetched, in order
    pub fn fetched_pages(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Fetch { page, .. } => Some(page),
                _ => None,
            })
            .collect()
    }

    /// Accounts acted upon, in order
    pub fn acted_accounts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Act { account, .. } => Some(account),
                _ => None,
            })
            .collect()
    }

    /// Pauses taken for `reason`
    pub fn pauses(&self, reason: PauseReason) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Pause {
                    reason: r,
                    duration,
                } if r == reason => Some(duration),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: MockEvent) {
        self.log.lock().unwrap().push(event);
    }
}

#[async_trait]
impl GraphSource for MockGraph {
    async fn query_rate(&self) -> Result<RateSnapshot> {
        self.record(MockEvent::RateQuery);

        if self.config.rate_fails {
            return Err(UpstreamError::Unavailable("Mock rate query failed".to_string()).into());
        }
        Ok(self.config.rate)
    }

    async fn fetch_page(
        &self,
        selector: &TargetSelector,
        cursor: PageCursor,
        retry_after: u64,
    ) -> Result<PageResult> {
        let target = selector.to_string();
        self.record(MockEvent::Fetch {
            target: target.clone(),
            page: cursor.page,
            per_page: cursor.per_page,
            retry_after,
        });

        if self.config.fail_fetch_at == Some(cursor.page) {
            return Err(UpstreamError::Unavailable(format!(
                "Mock fetch of page {} failed",
                cursor.page
            ))
            .into());
        }

        let page = self
            .config
            .pages
            .get(&target)
            .and_then(|pages| {
                (cursor.page as usize)
                    .checked_sub(1)
                    .and_then(|index| pages.get(index))
            })
            .cloned()
            .unwrap_or_else(|| PageResult::ok(Vec::new()));
        Ok(page)
    }
}

/// A [`MockGraph`] bound to one [`ActionKind`].
pub struct MockAction {
    graph: MockGraph,
    kind: ActionKind,
}

#[async_trait]
impl ActionSink for MockAction {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    async fn act(&self, account: &str, retry_after: u64) -> Result<ActionResult> {
        self.graph.record(MockEvent::Act {
            kind: self.kind,
            account: account.to_string(),
            retry_after,
        });

        if self.graph.config.failing_accounts.contains(account) {
            return Err(UpstreamError::ActionRejected {
                account: account.to_string(),
                status: 422,
            }
            .into());
        }
        Ok(ActionResult { status: 204 })
    }
}

/// Pauser that records pauses instead of sleeping.
#[derive(Clone)]
pub struct RecordingPauser {
    log: Arc<Mutex<Vec<MockEvent>>>,
}

#[async_trait]
impl Pauser for RecordingPauser {
    async fn pause(&self, reason: PauseReason, duration: Duration) {
        self.log
            .lock()
            .unwrap()
            .push(MockEvent::Pause { reason, duration });
    }
}
