//! Error taxonomy for everything a pane can surface.
//!
//! None of these are fatal: each one is rendered inline by the pane that
//! received it and the dashboard keeps running. Process-level failures
//! (terminal setup, unreadable config file) go through `anyhow` instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaneError {
    /// A required credential or setting is absent. Rendered as a setup hint.
    #[error("setup required: {0}")]
    ConfigMissing(String),
    /// Network, process, or background-task failure.
    #[error("{0}")]
    Transport(String),
    /// Non-success status or a payload we could not decode.
    #[error("{0}")]
    Protocol(String),
    /// The model asked for a tool that is not in the catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Bad input typed by the user, e.g. `cd` to a missing directory.
    #[error("{0}")]
    UserInput(String),
}

impl PaneError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl From<reqwest::Error> for PaneError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_status() {
            PaneError::Protocol(e.to_string())
        } else if e.is_timeout() {
            PaneError::Transport(format!("request timed out: {e}"))
        } else {
            PaneError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for PaneError {
    fn from(e: serde_json::Error) -> Self {
        PaneError::Protocol(format!("malformed payload: {e}"))
    }
}
