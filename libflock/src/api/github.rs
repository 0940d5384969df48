//! GitHub REST implementation of the graph capabilities

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::{ActionSink, GraphSource};
use crate::config::GithubConfig;
use crate::error::{Result, UpstreamError};
use crate::types::{
    ActionKind, ActionResult, PageCursor, PageResult, RateSnapshot, TargetAccount, TargetSelector,
};

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Deserialize)]
struct RateLimitResponse {
    rate: RateSnapshot,
}

#[derive(Deserialize)]
struct AuthenticatedUser {
    login: String,
}

/// Client for the GitHub REST API.
pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl GithubClient {
    /// Create a client for the configured API base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &GithubConfig, token: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Bind an action kind to this client.
    pub fn action(&self, kind: ActionKind) -> GithubAction<'_> {
        GithubAction { client: self, kind }
    }

    /// Login of the authenticated user
    pub async fn authenticated_login(&self) -> Result<String> {
        let response = self.send(self.request(Method::GET, "/user", None)).await?;
        if !response.status().is_success() {
            return Err(UpstreamError::NonSuccessStatus {
                status: response.status().as_u16(),
                context: "looking up the authenticated user".to_string(),
            }
            .into());
        }

        let user: AuthenticatedUser = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(user.login)
    }

    fn request(&self, method: Method, path: &str, retry_after: Option<u64>) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(self.token.expose_secret())
            .header(ACCEPT, ACCEPT_GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(secs) = retry_after {
            builder = builder.header(RETRY_AFTER, secs.to_string());
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()).into())
    }
}

#[async_trait]
impl GraphSource for GithubClient {
    async fn query_rate(&self) -> Result<RateSnapshot> {
        let response = self
            .send(self.request(Method::GET, "/rate_limit", None))
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::NonSuccessStatus {
                status: response.status().as_u16(),
                context: "querying the rate limit".to_string(),
            }
            .into());
        }

        let body: RateLimitResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(body.rate)
    }

    async fn fetch_page(
        &self,
        selector: &TargetSelector,
        cursor: PageCursor,
        retry_after: u64,
    ) -> Result<PageResult> {
        let path = selector.path();
        debug!(
            collection = %selector,
            page = cursor.page,
            per_page = cursor.per_page,
            "Fetching page"
        );

        let response = self
            .send(
                self.request(Method::GET, &path, Some(retry_after))
                    .query(&[("page", cursor.page), ("per_page", cursor.per_page)]),
            )
            .await?;

        let status = response.status().as_u16();
        if response.status().is_client_error() || response.status().is_server_error() {
            let body = response.text().await.unwrap_or_default();
            debug!(status, body = %body, "Page request failed");
            return Err(UpstreamError::NonSuccessStatus {
                status,
                context: format!("retrieving page {} of {}", cursor.page, selector),
            }
            .into());
        }
        if !response.status().is_success() {
            return Ok(PageResult {
                status,
                items: Vec::new(),
            });
        }

        let items: Vec<TargetAccount> = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(PageResult { status, items })
    }
}

/// A [`GithubClient`] bound to one [`ActionKind`].
pub struct GithubAction<'a> {
    client: &'a GithubClient,
    kind: ActionKind,
}

impl GithubAction<'_> {
    fn route(&self, account: &str) -> (Method, String) {
        match self.kind {
            ActionKind::Follow => (Method::PUT, format!("/user/following/{}", account)),
            ActionKind::Unfollow => (Method::DELETE, format!("/user/following/{}", account)),
            ActionKind::Block => (Method::PUT, format!("/user/blocks/{}", account)),
            ActionKind::Unblock => (Method::DELETE, format!("/user/blocks/{}", account)),
        }
    }
}

#[async_trait]
impl ActionSink for GithubAction<'_> {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    async fn act(&self, account: &str, retry_after: u64) -> Result<ActionResult> {
        let (method, path) = self.route(account);
        let mut builder = self.client.request(method.clone(), &path, Some(retry_after));
        if method == Method::PUT {
            builder = builder.header(CONTENT_LENGTH, 0);
        }

        let response = self.client.send(builder).await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(UpstreamError::ActionRejected {
                account: account.to_string(),
                status,
            }
            .into());
        }

        info!(account, "    -> {}", self.kind.past_tense());
        Ok(ActionResult { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GithubClient {
        let config = GithubConfig {
            api_url: "https://example.test/".to_string(),
            ..Default::default()
        };
        GithubClient::new(&config, SecretString::from("token".to_string())).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "https://example.test");
    }

    #[test]
    fn test_action_routes() {
        let client = client();
        assert_eq!(
            client.action(ActionKind::Follow).route("octocat"),
            (Method::PUT, "/user/following/octocat".to_string())
        );
        assert_eq!(
            client.action(ActionKind::Unfollow).route("octocat"),
            (Method::DELETE, "/user/following/octocat".to_string())
        );
        assert_eq!(
            client.action(ActionKind::Block).route("octocat"),
            (Method::PUT, "/user/blocks/octocat".to_string())
        );
        assert_eq!(
            client.action(ActionKind::Unblock).route("octocat"),
            (Method::DELETE, "/user/blocks/octocat".to_string())
        );
    }
}
