//! Read-only issue tracker clients.
//!
//! Each client exposes a typed query (used by the chat tools) and implements
//! [`Tracker`], the narrower contract an issue list pane is bound to.

pub mod github;
pub mod jira;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::PaneError;

pub use github::GitHubClient;
pub use jira::{JiraClient, JiraCredentials};

/// One row in an issue list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueItem {
    pub title: String,
    pub description: String,
}

impl IssueItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into() }
    }
}

/// What an issue list pane needs from a tracker.
pub trait Tracker: Send + Sync {
    /// Heading shown above the list.
    fn title(&self) -> String;

    /// `Some(hint)` when required configuration is absent. The pane shows the
    /// hint instead of fetching.
    fn setup_hint(&self) -> Option<String>;

    /// Description under the "No issues found" placeholder.
    fn empty_hint(&self) -> String;

    /// One authenticated read-only query. The returned future owns everything
    /// it needs, so it can run on any task.
    fn fetch(&self) -> BoxFuture<'static, Result<Vec<IssueItem>, PaneError>>;
}
