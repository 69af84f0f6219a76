mod client;
mod config;
mod conversation;
mod error;
mod logging;
mod process;
mod runtime;
mod tools;
mod trackers;
mod tui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use config::{ConfigFile, Overrides, ResolvedConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "termiflow",
    version,
    about = "A terminal dashboard: shell, Jira and GitHub issues, and a chat agent in tabs",
    long_about = None,
)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/termiflow/config.toml)
    #[arg(long, env = "TERMIFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// OpenAI-compatible chat endpoint
    #[arg(long, env = "TERMIFLOW_ENDPOINT")]
    endpoint: Option<String>,

    /// Chat model name
    #[arg(short, long, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Chat API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Jira base URL, e.g. https://team.atlassian.net
    #[arg(long, env = "JIRA_URL")]
    jira_url: Option<String>,

    /// Jira account email
    #[arg(long, env = "JIRA_EMAIL")]
    jira_email: Option<String>,

    /// Jira API token
    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    jira_token: Option<String>,

    /// GitHub repository as owner/name
    #[arg(long, env = "GITHUB_REPO")]
    github_repo: Option<String>,

    /// GitHub token (optional for public repositories)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Show timestamps on chat messages
    #[arg(long)]
    timestamps: bool,

    /// Log file (default: termiflow.log next to the config file)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            jira_url: self.jira_url.clone(),
            jira_email: self.jira_email.clone(),
            jira_token: self.jira_token.clone(),
            github_repo: self.github_repo.clone(),
            github_token: self.github_token.clone(),
            timestamps: self.timestamps,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(config::config_path);

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing(&config_path)?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: termiflow");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let log_path = args.log_file.clone().unwrap_or_else(|| config::log_path(&config_path));
    logging::init_file_logging(&log_path)?;

    let file = ConfigFile::load(&config_path)?;
    let resolved = ResolvedConfig::resolve(&file, &args.overrides());
    info!(
        config = %config_path.display(),
        endpoint = %resolved.model.endpoint,
        model = %resolved.model.model,
        repo = %resolved.github.repo,
        "starting"
    );

    let composer = build_composer(&resolved)?;
    tui::run(composer).await
}

/// Wire clients, tools and panes. Tab order: Shell, Jira, GitHub, Chat.
fn build_composer(resolved: &ResolvedConfig) -> Result<tui::Composer> {
    let http = reqwest::Client::builder()
        .timeout(resolved.http_timeout)
        .user_agent(concat!("termiflow/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let jira = trackers::JiraClient::new(http.clone(), resolved.jira.credentials(), resolved.jira.max_results);
    let github = trackers::GitHubClient::new(
        http.clone(),
        resolved.github.api_base.clone(),
        resolved.github.repo.clone(),
        resolved.github.token.clone(),
        resolved.github.per_page,
    );
    let catalog = Arc::new(tools::builtin(&jira, &github));

    let model: Result<Arc<dyn client::ModelService>, error::PaneError> =
        client::Client::from_settings(http, &resolved.model).map(|c| Arc::new(c) as Arc<dyn client::ModelService>);
    if let Err(e) = &model {
        warn!(error = %e, "chat model not configured");
    }

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let panes: Vec<Box<dyn tui::Pane>> = vec![
        Box::new(tui::ShellPane::new(cwd, dirs::home_dir(), resolved.shell_timeout)),
        Box::new(tui::IssueListPane::new(Arc::new(jira))),
        Box::new(tui::IssueListPane::new(Arc::new(github))),
        Box::new(tui::ChatPane::new(model, catalog, resolved.timestamps)),
    ];
    Ok(tui::Composer::new(panes))
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        _ => bail!("Unknown shell: {shell_name} (supported: bash, zsh, fish, elvish)"),
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "termiflow", &mut std::io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags_into_overrides() {
        let args = Args::try_parse_from([
            "termiflow",
            "--model",
            "gemini-x",
            "--github-repo",
            "acme/widgets",
            "--timestamps",
        ])
        .unwrap();
        let o = args.overrides();
        assert_eq!(o.model.as_deref(), Some("gemini-x"));
        assert_eq!(o.github_repo.as_deref(), Some("acme/widgets"));
        assert!(o.timestamps);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_unknown_completion_shell_is_error() {
        assert!(generate_completions("powershell-9000").is_err());
    }

    #[test]
    fn test_build_composer_orders_tabs() {
        let resolved = ResolvedConfig::resolve(&ConfigFile::default(), &Overrides::default());
        let composer = build_composer(&resolved).unwrap();
        let titles: Vec<String> = (0..4).map(|i| composer.pane(i).unwrap().title()).collect();
        assert_eq!(
            titles,
            vec!["Shell", "Jira Issues", "GitHub Issues (charmbracelet/bubbletea)", "Chat"]
        );
    }
}
