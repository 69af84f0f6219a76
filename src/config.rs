use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PaneError;
use crate::trackers::JiraCredentials;
use crate::trackers::github::{DEFAULT_API_BASE, DEFAULT_REPO};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const DEFAULT_JIRA_MAX_RESULTS: u32 = 50;
const DEFAULT_GITHUB_PER_PAGE: u32 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 30;

// ── On-disk config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub jira: JiraSection,
    #[serde(default)]
    pub github: GitHubSection,
    #[serde(default)]
    pub shell: ShellSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Per-request HTTP timeout, shared by all network clients
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JiraSection {
    pub url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GitHubSection {
    pub repo: Option<String>,
    pub token: Option<String>,
    pub api_base: Option<String>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShellSection {
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing(path: &Path) -> Result<PathBuf> {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path.to_path_buf())
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

/// Values from CLI flags or their environment variables (clap fills both).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub jira_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_token: Option<String>,
    pub timestamps: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JiraSettings {
    pub url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    pub max_results: u32,
}

impl JiraSettings {
    /// All three values, or a `ConfigMissing` naming the ones that are absent.
    pub fn credentials(&self) -> Result<JiraCredentials, PaneError> {
        match (&self.url, &self.email, &self.token) {
            (Some(url), Some(email), Some(token)) => Ok(JiraCredentials {
                base_url: url.clone(),
                email: email.clone(),
                token: token.clone(),
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("JIRA_URL", self.url.is_none()),
                    ("JIRA_EMAIL", self.email.is_none()),
                    ("JIRA_TOKEN", self.token.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(PaneError::ConfigMissing(format!(
                    "Please set {} environment variables",
                    missing.join(", ")
                )))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GitHubSettings {
    pub api_base: String,
    pub repo: String,
    pub token: Option<String>,
    pub per_page: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub model: ModelSettings,
    pub jira: JiraSettings,
    pub github: GitHubSettings,
    pub http_timeout: Duration,
    pub shell_timeout: Duration,
    pub timestamps: bool,
}

impl ResolvedConfig {
    /// Merge config file with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file > built-in defaults
    pub fn resolve(file: &ConfigFile, cli: &Overrides) -> Self {
        Self {
            model: ModelSettings {
                endpoint: pick(&cli.endpoint, &file.model.endpoint)
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                model: pick(&cli.model, &file.model.model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_key: pick(&cli.api_key, &file.model.api_key),
            },
            jira: JiraSettings {
                url: pick(&cli.jira_url, &file.jira.url),
                email: pick(&cli.jira_email, &file.jira.email),
                token: pick(&cli.jira_token, &file.jira.token),
                max_results: file.jira.max_results.unwrap_or(DEFAULT_JIRA_MAX_RESULTS),
            },
            github: GitHubSettings {
                api_base: nonblank(&file.github.api_base).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                repo: pick(&cli.github_repo, &file.github.repo).unwrap_or_else(|| DEFAULT_REPO.to_string()),
                token: pick(&cli.github_token, &file.github.token),
                per_page: file.github.per_page.unwrap_or(DEFAULT_GITHUB_PER_PAGE),
            },
            http_timeout: Duration::from_secs(file.model.timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)),
            shell_timeout: Duration::from_secs(file.shell.timeout_secs.unwrap_or(DEFAULT_SHELL_TIMEOUT_SECS)),
            timestamps: cli.timestamps,
        }
    }
}

// An exported-but-empty variable counts as unset.
fn nonblank(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn pick(cli: &Option<String>, file: &Option<String>) -> Option<String> {
    nonblank(cli).or_else(|| nonblank(file))
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// `$XDG_CONFIG_HOME/termiflow/config.toml` on Linux, the platform config
/// directory elsewhere.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("termiflow")
        .join("config.toml")
}

/// The log file lives beside the config file.
pub fn log_path(config: &Path) -> PathBuf {
    config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("termiflow.log")
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# TermiFlow configuration
# Run `termiflow --init` to regenerate this file.
# Environment variables and CLI flags take precedence over everything here.

# ── Chat model (any OpenAI-compatible endpoint) ──────────────────────────────
[model]
endpoint = "https://generativelanguage.googleapis.com/v1beta/openai"
model    = "gemini-2.0-flash"
# api_key      = "..."      # or GEMINI_API_KEY
# timeout_secs = 10

# Local Ollama needs no key:
# endpoint = "http://localhost:11434/v1"
# model    = "qwen3:8b"

# ── Jira (all three required; or JIRA_URL / JIRA_EMAIL / JIRA_TOKEN) ──────────
[jira]
# url   = "https://your-team.atlassian.net"
# email = "you@example.com"
# token = "..."
# max_results = 50

# ── GitHub (token optional for public repositories) ─────────────────────────
[github]
repo = "charmbracelet/bubbletea"
# token    = "ghp_..."      # or GITHUB_TOKEN
# per_page = 10

# ── Shell pane ────────────────────────────────────────────────────────────────
[shell]
# timeout_secs = 30
"#;
