use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::client::ToolDeclaration;
use crate::error::PaneError;
use crate::trackers::{GitHubClient, JiraClient};

/// Issue tools return at most this many entries.
pub const ISSUE_LIMIT: u32 = 5;

pub type ToolFuture = BoxFuture<'static, Result<Value, PaneError>>;
type Invoke = Arc<dyn Fn() -> ToolFuture + Send + Sync>;

#[derive(Clone)]
struct ToolEntry {
    description: String,
    invoke: Invoke,
}

/// Named, argument-free functions the model may call.
/// Built once at startup and shared read-only.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    entries: BTreeMap<String, ToolEntry>,
}

impl ToolCatalog {
    pub fn register<F>(&mut self, name: &str, description: &str, invoke: F)
    where
        F: Fn() -> ToolFuture + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            ToolEntry { description: description.to_string(), invoke: Arc::new(invoke) },
        );
    }

    /// What gets advertised to the model, in name order.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.entries
            .iter()
            .map(|(name, e)| ToolDeclaration { name: name.clone(), description: e.description.clone() })
            .collect()
    }

    /// Start the named tool. The future owns its own client handles.
    pub fn invoke(&self, name: &str) -> Result<ToolFuture, PaneError> {
        self.entries
            .get(name)
            .map(|e| (e.invoke)())
            .ok_or_else(|| PaneError::UnknownTool(name.to_string()))
    }
}

/// The two issue tools the chat pane advertises.
pub fn builtin(jira: &JiraClient, github: &GitHubClient) -> ToolCatalog {
    let mut catalog = ToolCatalog::default();

    let gh = github.with_per_page(ISSUE_LIMIT);
    catalog.register(
        "get_github_issues",
        "Get list of open GitHub issues for the configured repository.",
        move || {
            let gh = gh.clone();
            async move {
                let mut issues = gh.list_open_issues().await?;
                issues.truncate(ISSUE_LIMIT as usize);
                Ok(serde_json::json!({ "issues": issues }))
            }
            .boxed()
        },
    );

    let jira = jira.with_max_results(ISSUE_LIMIT);
    catalog.register(
        "get_jira_issues",
        "Get list of Jira issues assigned to the current user.",
        move || {
            let jira = jira.clone();
            async move {
                let mut issues = jira.search().await?;
                issues.truncate(ISSUE_LIMIT as usize);
                Ok(serde_json::json!({ "issues": issues }))
            }
            .boxed()
        },
    );

    catalog
}
