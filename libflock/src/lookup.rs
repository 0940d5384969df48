//! Membership sets used to gate conditional actions

use futures::TryStreamExt;
use std::collections::HashSet;
use std::pin::pin;
use tracing::{debug, info};

use crate::api::GraphSource;
use crate::error::Result;
use crate::options::ResolvedOptions;
use crate::pause::{Pauser, TokioPauser};
use crate::paginate::Paginator;
use crate::types::TargetSelector;

/// Set of account identifiers, built once and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupSet {
    accounts: HashSet<String>,
}

impl LookupSet {
    pub fn contains(&self, account: &str) -> bool {
        self.accounts.contains(account)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.accounts.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for LookupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            accounts: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Condition an account's membership must meet to be acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assertion {
    /// Act when the account is in the lookup set
    Found,
    /// Act when the account is not in the lookup set
    NotFound,
}

impl Assertion {
    pub fn holds(&self, present: bool) -> bool {
        match self {
            Assertion::Found => present,
            Assertion::NotFound => !present,
        }
    }
}

/// Drains a target collection into a [`LookupSet`].
pub struct LookupSetBuilder<'a> {
    source: &'a dyn GraphSource,
    pauser: &'a dyn Pauser,
    options: &'a ResolvedOptions,
}

impl<'a> LookupSetBuilder<'a> {
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

    /// Enumerate `selector` to the end and collect every identifier
    ///
    /// Runs to completion before returning.
    ///
    /// # Errors
    ///
    /// Any failure of the rate query or of a page fetch aborts the build;
    /// no partial set is returned.
    pub async fn build(&self, selector: &TargetSelector) -> Result<LookupSet> {
        info!(collection = %selector, "Creating lookup list...");

        let paginator = Paginator::start(self.source, self.pauser, selector, self.options).await?;
        let mut pages = pin!(paginator.into_stream());

        let mut lookup = LookupSet::default();
        while let Some(batch) = pages.try_next().await? {
            for account in batch {
                debug!(account = %account.id, "Adding to the lookup list");
                lookup.accounts.insert(account.id);
            }
        }

        info!(size = lookup.len(), "Lookup list created");
        Ok(lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockGraph;
    use crate::types::UserTarget;

    fn following() -> TargetSelector {
        TargetSelector::AuthUser(UserTarget::Following)
    }

    #[test]
    fn test_assertion_forms() {
        assert!(Assertion::Found.holds(true));
        assert!(!Assertion::Found.holds(false));
        assert!(Assertion::NotFound.holds(false));
        assert!(!Assertion::NotFound.holds(true));
    }

    #[test]
    fn test_lookup_set_from_iter_collapses_duplicates() {
        let set: LookupSet = ["a", "b", "a"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(!set.contains("c"));
    }

    #[tokio::test]
    async fn test_build_collects_all_pages() {
        let mock = MockGraph::with_pages(&following(), &[&["a", "b"], &["b", "c"], &[]]);
        let pauser = mock.pauser();
        let options = ResolvedOptions::default();

        let lookup = LookupSetBuilder::new(&mock, &options)
            .with_pauser(&pauser)
            .build(&following())
            .await
            .unwrap();

        let mut members: Vec<&str> = lookup.iter().collect();
        members.sort();
        assert_eq!(members, vec!["a", "b", "c"]);
        assert_eq!(mock.fetched_pages(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_build_keeps_page_limit_batch() {
        let mock = MockGraph::with_pages(&following(), &[&["a"], &["b"], &["c"]]);
        let pauser = mock.pauser();
        let options = ResolvedOptions {
            page_limit: Some(2),
            ..Default::default()
        };

        let lookup = LookupSetBuilder::new(&mock, &options)
            .with_pauser(&pauser)
            .build(&following())
            .await
            .unwrap();

        assert_eq!(lookup.len(), 2);
        assert!(lookup.contains("b"));
        assert!(!lookup.contains("c"));
    }

    #[tokio::test]
    async fn test_build_aborts_on_fetch_failure() {
        let mut mock = MockGraph::with_pages(&following(), &[&["a"], &["b"]]);
        mock.fail_fetch_at(2);
        let pauser = mock.pauser();
        let options = ResolvedOptions::default();

        let result = LookupSetBuilder::new(&mock, &options)
            .with_pauser(&pauser)
            .build(&following())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_aborts_on_rate_failure() {
        let mut mock = MockGraph::with_pages(&following(), &[&["a"]]);
        mock.fail_rate_query();
        let pauser = mock.pauser();
        let options = ResolvedOptions::default();

        let result = LookupSetBuilder::new(&mock, &options)
            .with_pauser(&pauser)
            .build(&following())
            .await;

        assert!(result.is_err());
        assert!(mock.fetched_pages().is_empty());
    }
}
