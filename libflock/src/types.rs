//! Core types for Flock

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FlockError;

/// Server-reported request budget of the authenticated principal.
///
/// Only the initial value is authoritative. Afterwards the snapshot is an
/// estimate decremented locally, so `remaining` may go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
    /// Unix timestamp (seconds) at which the window resets
    #[serde(rename = "reset")]
    pub reset_time: i64,
}

impl RateSnapshot {
    pub fn new(limit: i64, used: i64, remaining: i64, reset_time: i64) -> Self {
        Self {
            limit,
            used,
            remaining,
            reset_time,
        }
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.reset_time, 0).single()
    }
}

/// Position of the next page to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub per_page: u32,
}

impl PageCursor {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn advance(&mut self) {
        self.page += 1;
    }
}

/// An account discovered in a target collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetAccount {
    #[serde(rename = "login")]
    pub id: String,
}

impl TargetAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One page of a target collection as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub status: u16,
    pub items: Vec<TargetAccount>,
}

impl PageResult {
    pub fn ok(items: Vec<TargetAccount>) -> Self {
        Self { status: 200, items }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionResult {
    pub status: u16,
}

/// Collections listed relative to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTarget {
    Followers,
    Following,
}

impl UserTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTarget::Followers => "followers",
            UserTarget::Following => "following",
        }
    }
}

/// Collections listed relative to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoTarget {
    Stargazers,
    Subscribers,
}

impl RepoTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoTarget::Stargazers => "stargazers",
            RepoTarget::Subscribers => "subscribers",
        }
    }
}

/// Which remote collection to enumerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    /// Followers or following of the authenticated user
    AuthUser(UserTarget),
    /// Followers or following of another user
    User { username: String, target: UserTarget },
    /// Stargazers or subscribers of a repository
    Repo {
        owner: String,
        repo: String,
        target: RepoTarget,
    },
}

impl TargetSelector {
    /// REST path of the collection, without query parameters
    pub fn path(&self) -> String {
        match self {
            TargetSelector::AuthUser(target) => format!("/user/{}", target.as_str()),
            TargetSelector::User { username, target } => {
                format!("/users/{}/{}", username, target.as_str())
            }
            TargetSelector::Repo {
                owner,
                repo,
                target,
            } => format!("/repos/{}/{}/{}", owner, repo, target.as_str()),
        }
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSelector::AuthUser(target) => write!(f, "{}", target.as_str()),
            TargetSelector::User { username, target } => {
                write!(f, "user:{}:{}", username, target.as_str())
            }
            TargetSelector::Repo {
                owner,
                repo,
                target,
            } => write!(f, "repo:{}/{}:{}", owner, repo, target.as_str()),
        }
    }
}

fn parse_user_target(s: &str) -> Option<UserTarget> {
    match s {
        "followers" => Some(UserTarget::Followers),
        "following" => Some(UserTarget::Following),
        _ => None,
    }
}

fn parse_repo_target(s: &str) -> Option<RepoTarget> {
    match s {
        "stargazers" => Some(RepoTarget::Stargazers),
        "subscribers" | "watchers" => Some(RepoTarget::Subscribers),
        _ => None,
    }
}

impl FromStr for TargetSelector {
    type Err = FlockError;

    /// Parses `followers`, `following`, `user:<name>:<followers|following>`
    /// or `repo:<owner>/<name>:<stargazers|subscribers>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            FlockError::InvalidInput(format!(
                "Invalid target: '{}'. Expected followers, following, \
                 user:<name>:<followers|following> or repo:<owner>/<name>:<stargazers|subscribers>",
                s
            ))
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [target] => parse_user_target(target)
                .map(TargetSelector::AuthUser)
                .ok_or_else(invalid),
            ["user", username, target] if !username.is_empty() => {
                let target = parse_user_target(target).ok_or_else(invalid)?;
                Ok(TargetSelector::User {
                    username: username.to_string(),
                    target,
                })
            }
            ["repo", slug, target] => {
                let (owner, repo) = slug
                    .split_once('/')
                    .filter(|(o, r)| !o.is_empty() && !r.is_empty())
                    .ok_or_else(invalid)?;
                let target = parse_repo_target(target).ok_or_else(invalid)?;
                Ok(TargetSelector::Repo {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    target,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// Mutating social actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Follow,
    Unfollow,
    Block,
    Unblock,
}

impl ActionKind {
    /// Courtesy sleep after each request of this kind.
    ///
    /// Follow and block requests draw harsher secondary rate limiting.
    pub fn default_sleep(&self) -> Duration {
        match self {
            ActionKind::Unfollow => Duration::from_secs(1),
            ActionKind::Follow | ActionKind::Block | ActionKind::Unblock => Duration::from_secs(2),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Follow => "follow",
            ActionKind::Unfollow => "unfollow",
            ActionKind::Block => "block",
            ActionKind::Unblock => "unblock",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            ActionKind::Follow => "followed",
            ActionKind::Unfollow => "unfollowed",
            ActionKind::Block => "blocked",
            ActionKind::Unblock => "unblocked",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = FlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "follow" => Ok(ActionKind::Follow),
            "unfollow" => Ok(ActionKind::Unfollow),
            "block" => Ok(ActionKind::Block),
            "unblock" => Ok(ActionKind::Unblock),
            _ => Err(FlockError::InvalidInput(format!(
                "Invalid action: '{}'. Valid options: follow, unfollow, block, unblock",
                s
            ))),
        }
    }
}
