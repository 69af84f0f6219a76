use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{IssueItem, Tracker};
use crate::error::PaneError;

pub const DEFAULT_REPO: &str = "charmbracelet/bubbletea";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub state: String,
}

impl From<GitHubIssue> for IssueItem {
    fn from(issue: GitHubIssue) -> Self {
        IssueItem::new(
            format!("#{} {}", issue.number, issue.title),
            format!("by {} [{}]", issue.author, issue.state),
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    state: String,
    user: Option<RawUser>,
    /// Present when the "issue" is actually a pull request
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    repo: String,
    token: Option<String>,
    per_page: u32,
}

impl GitHubClient {
    pub fn new(
        http: reqwest::Client,
        api_base: String,
        repo: String,
        token: Option<String>,
        per_page: u32,
    ) -> Self {
        Self { http, api_base, repo, token, per_page }
    }

    pub fn with_per_page(&self, per_page: u32) -> Self {
        Self { per_page, ..self.clone() }
    }

    /// Open issues for the configured repository, pull requests excluded.
    pub async fn list_open_issues(&self) -> Result<Vec<GitHubIssue>, PaneError> {
        let base = format!("{}/repos/{}/issues", self.api_base.trim_end_matches('/'), self.repo);
        let url = reqwest::Url::parse_with_params(
            &base,
            &[("state", "open"), ("per_page", &self.per_page.to_string())],
        )
        .map_err(|e| PaneError::ConfigMissing(format!("invalid GitHub URL '{base}': {e}")))?;

        debug!(%url, "github issues");
        let mut req = self
            .http
            .get(url)
            .header("User-Agent", "TermiFlow")
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(%status, repo = %self.repo, "github issues rejected");
            return Err(PaneError::protocol(format!("GitHub API error: {status}")));
        }

        let raw: Vec<RawIssue> = resp.json().await?;
        Ok(raw
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(|i| GitHubIssue {
                number: i.number,
                title: i.title,
                author: i.user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string()),
                state: i.state,
            })
            .collect())
    }
}

impl Tracker for GitHubClient {
    fn title(&self) -> String {
        format!("GitHub Issues ({})", self.repo)
    }

    // Public repositories need no token, so there is nothing to set up.
    fn setup_hint(&self) -> Option<String> {
        None
    }

    fn empty_hint(&self) -> String {
        format!("{} has no open issues.", self.repo)
    }

    fn fetch(&self) -> BoxFuture<'static, Result<Vec<IssueItem>, PaneError>> {
        let client = self.clone();
        async move {
            let issues = client.list_open_issues().await?;
            Ok(issues.into_iter().map(IssueItem::from).collect())
        }
        .boxed()
    }
}
