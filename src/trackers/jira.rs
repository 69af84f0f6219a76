use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{IssueItem, Tracker};
use crate::error::PaneError;

const ASSIGNED_TO_ME: &str = "assignee=currentUser()";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraCredentials {
    pub base_url: String,
    pub email: String,
    pub token: String,
}

/// Flattened issue as handed to the model and the list pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JiraIssue {
    pub key: String,
    pub summary: String,
    pub status: String,
}

impl From<JiraIssue> for IssueItem {
    fn from(issue: JiraIssue) -> Self {
        IssueItem::new(
            format!("{} {}", issue.key, issue.summary),
            format!("Status: {}", issue.status),
        )
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
}

#[derive(Debug, Deserialize)]
struct RawFields {
    #[serde(default)]
    summary: String,
    status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    name: String,
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    creds: Result<JiraCredentials, PaneError>,
    max_results: u32,
}

impl JiraClient {
    pub fn new(
        http: reqwest::Client,
        creds: Result<JiraCredentials, PaneError>,
        max_results: u32,
    ) -> Self {
        Self { http, creds, max_results }
    }

    /// Same credentials, different page size.
    pub fn with_max_results(&self, max_results: u32) -> Self {
        Self { max_results, ..self.clone() }
    }

    /// Issues assigned to the authenticated user.
    pub async fn search(&self) -> Result<Vec<JiraIssue>, PaneError> {
        let creds = self.creds.clone()?;
        let base = format!("{}/rest/api/3/search", creds.base_url.trim_end_matches('/'));
        let url = reqwest::Url::parse_with_params(
            &base,
            &[("jql", ASSIGNED_TO_ME), ("maxResults", &self.max_results.to_string())],
        )
        .map_err(|e| PaneError::ConfigMissing(format!("invalid Jira URL '{}': {e}", creds.base_url)))?;

        debug!(%url, "jira search");
        let resp = self
            .http
            .get(url)
            .basic_auth(&creds.email, Some(&creds.token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "jira search rejected");
            return Err(PaneError::protocol(format!("Jira API error: {status}")));
        }

        let body: SearchResponse = resp.json().await?;
        Ok(body
            .issues
            .into_iter()
            .map(|raw| JiraIssue {
                key: raw.key,
                summary: raw.fields.summary,
                status: raw.fields.status.map(|s| s.name).unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect())
    }
}

impl Tracker for JiraClient {
    fn title(&self) -> String {
        "Jira Issues".to_string()
    }

    fn setup_hint(&self) -> Option<String> {
        self.creds.as_ref().err().map(|e| match e {
            PaneError::ConfigMissing(hint) => hint.clone(),
            other => other.to_string(),
        })
    }

    fn empty_hint(&self) -> String {
        "You have no assigned issues.".to_string()
    }

    fn fetch(&self) -> BoxFuture<'static, Result<Vec<IssueItem>, PaneError>> {
        let client = self.clone();
        async move {
            let issues = client.search().await?;
            Ok(issues.into_iter().map(IssueItem::from).collect())
        }
        .boxed()
    }
}
