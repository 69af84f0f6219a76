use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
};
use tracing::{debug, info, warn};

use super::input::LineInput;
use super::pane::Pane;
use super::render::{self, hard_wrap, scroll_offset};
use crate::error::PaneError;
use crate::process;
use crate::runtime::{Command, Message};

/// Rows under the transcript: input line and its border.
const INPUT_ROWS: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellLine {
    /// `"<dir> $ <input>"` echo of an executed line
    Prompt(String),
    /// Captured output, verbatim (may span several lines)
    Output(String),
    Error(String),
}

/// Line-oriented command runner. Builtins (`cd`, `clear`) act immediately;
/// everything else runs as a child process through a command.
pub struct ShellPane {
    cwd: PathBuf,
    home: Option<PathBuf>,
    timeout: Duration,
    transcript: Vec<ShellLine>,
    input: LineInput,
    running: bool,
    /// Rows scrolled up from the bottom
    scroll: u16,
    height: u16,
}

impl ShellPane {
    pub fn new(cwd: PathBuf, home: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            cwd,
            home,
            timeout,
            transcript: Vec::new(),
            input: LineInput::default(),
            running: false,
            scroll: 0,
            height: 0,
        }
    }

    #[cfg(test)]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    #[cfg(test)]
    pub fn transcript(&self) -> &[ShellLine] {
        &self.transcript
    }

    #[cfg(test)]
    pub fn input(&self) -> &str {
        self.input.value()
    }

    fn page(&self) -> u16 {
        self.height.saturating_sub(INPUT_ROWS).max(1)
    }

    fn push(&mut self, line: ShellLine) {
        self.transcript.push(line);
        self.scroll = 0;
    }

    fn basename(&self) -> String {
        self.cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.cwd.display().to_string())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Command {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Enter) => self.submit(),
            (KeyModifiers::NONE, KeyCode::PageUp) => {
                self.scroll = self.scroll.saturating_add(self.page());
                Command::None
            }
            (KeyModifiers::NONE, KeyCode::PageDown) => {
                self.scroll = self.scroll.saturating_sub(self.page());
                Command::None
            }
            _ => {
                self.input.handle(&key);
                Command::None
            }
        }
    }

    fn submit(&mut self) -> Command {
        // One process at a time; the typed line stays for later
        if self.running || self.input.is_blank() {
            return Command::None;
        }
        let line = self.input.take();
        let line = line.trim().to_string();

        let mut words = line.split_whitespace();
        let Some(program) = words.next() else {
            return Command::None;
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        match program {
            "cd" => {
                // The echo shows the directory the shell ends up in
                let outcome = self.change_dir(args.first().map(String::as_str));
                self.echo(&line);
                if let Err(e) = outcome {
                    debug!(error = %e, "cd rejected");
                    self.push(ShellLine::Error(e.to_string()));
                }
                Command::None
            }
            "clear" => {
                self.transcript.clear();
                self.scroll = 0;
                Command::None
            }
            _ => {
                self.echo(&line);
                self.running = true;
                let program = program.to_string();
                let cwd = self.cwd.clone();
                let limit = self.timeout;
                info!(%program, cwd = %cwd.display(), "shell exec");
                Command::perform(async move {
                    let result = process::run(&program, &args, &cwd, limit).await.map_err(PaneError::from);
                    Message::ShellFinished { result }
                })
            }
        }
    }

    fn echo(&mut self, line: &str) {
        let prompt = format!("{} $ {line}", self.basename());
        self.push(ShellLine::Prompt(prompt));
    }

    fn change_dir(&mut self, arg: Option<&str>) -> Result<(), PaneError> {
        let target = match arg {
            None => self
                .home
                .clone()
                .ok_or_else(|| PaneError::UserInput("cd: HOME not set".to_string()))?,
            Some(raw) => {
                let expanded = expand_tilde(raw, self.home.as_deref());
                if expanded.is_absolute() { expanded } else { self.cwd.join(expanded) }
            }
        };

        if !target.is_dir() {
            let shown = arg.unwrap_or("~");
            return Err(PaneError::UserInput(format!("cd: {shown}: No such directory")));
        }
        self.cwd = std::fs::canonicalize(&target).unwrap_or(target);
        debug!(cwd = %self.cwd.display(), "cd");
        Ok(())
    }

    fn finish(&mut self, result: Result<String, PaneError>) {
        if !self.running {
            warn!("shell result arrived with nothing running");
        }
        self.running = false;
        match result {
            Ok(out) if out.is_empty() => self.scroll = 0,
            Ok(out) => self.push(ShellLine::Output(out)),
            Err(e) => self.push(ShellLine::Error(e.to_string())),
        }
    }

    fn rows(&self, width: usize) -> Vec<Line<'static>> {
        let mut rows = Vec::new();
        for entry in &self.transcript {
            let (text, style) = match entry {
                ShellLine::Prompt(t) => (t.as_str(), Style::default().fg(Color::Cyan)),
                ShellLine::Output(t) => (t.as_str(), Style::default().fg(Color::White)),
                ShellLine::Error(t) => (t.as_str(), Style::default().fg(Color::Red)),
            };
            for raw in text.lines() {
                for piece in hard_wrap(raw, width) {
                    rows.push(Line::styled(piece, style));
                }
            }
        }
        rows
    }
}

fn expand_tilde(path: &str, home: Option<&Path>) -> PathBuf {
    match (path, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

impl Pane for ShellPane {
    fn title(&self) -> String {
        "Shell".to_string()
    }

    fn update(&mut self, message: Message) -> Command {
        match message {
            Message::Key(key) => self.handle_key(key),
            Message::ShellFinished { result } => {
                self.finish(result);
                Command::None
            }
            Message::CommandFailed(e) if self.running => {
                self.finish(Err(e));
                Command::None
            }
            _ => Command::None,
        }
    }

    fn render(&self, f: &mut Frame, area: Rect, tick: u32) {
        let [history_area, input_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(INPUT_ROWS)]).areas(area);

        let block = Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(render::MUTED))
            .title(format!(" {} ", self.cwd.display()));
        let inner = block.inner(history_area);
        let rows = self.rows(inner.width.max(1) as usize);
        let offset = scroll_offset(rows.len(), inner.height, self.scroll);
        f.render_widget(Paragraph::new(rows).block(block).scroll((offset, 0)), history_area);

        let prompt = format!("{} $ ", self.basename());
        let placeholder = if self.running { "running…" } else { "" };
        render::draw_input(f, input_area, &prompt, &self.input, placeholder, self.running, tick);
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
    }

    fn busy(&self) -> bool {
        self.running
    }

    fn hints(&self) -> &'static str {
        "Enter run · cd/clear builtins · PgUp/PgDn scroll"
    }
}
