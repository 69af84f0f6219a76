//! Chat pane: conversation with the model plus the tool dispatch loop.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::input::LineInput;
use super::pane::Pane;
use super::render::{self, hard_wrap, scroll_offset, spinner_glyph, wrap_text};
use crate::client::{ModelReply, ModelService, ReplyPart, ToolCall};
use crate::conversation::{Conversation, Role, Turn};
use crate::error::PaneError;
use crate::runtime::{Command, Message};
use crate::tools::ToolCatalog;

/// Rows under the history: status line, input line and its border.
const FOOTER_ROWS: u16 = 3;
const WELCOME: &str = "Ask about your Jira or GitHub issues. Enter sends.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    /// One send is in flight
    AwaitingReply,
    /// Tool calls still running; the conversation is resent when all finish
    ToolDispatch { pending: Vec<ToolCall> },
}

pub struct ChatPane {
    model: Result<Arc<dyn ModelService>, PaneError>,
    tools: Arc<ToolCatalog>,
    conversation: Conversation,
    state: ChatState,
    input: LineInput,
    timestamps: bool,
    /// Rows scrolled up from the bottom
    scroll: u16,
    height: u16,
}

impl ChatPane {
    /// `model` is `Err` when the service could not be configured; submits then
    /// explain what is missing instead of sending.
    pub fn new(model: Result<Arc<dyn ModelService>, PaneError>, tools: Arc<ToolCatalog>, timestamps: bool) -> Self {
        Self {
            model,
            tools,
            conversation: Conversation::default(),
            state: ChatState::Idle,
            input: LineInput::default(),
            timestamps,
            scroll: 0,
            height: 0,
        }
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[cfg(test)]
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    #[cfg(test)]
    pub fn input(&self) -> &str {
        self.input.value()
    }

    fn page(&self) -> u16 {
        self.height.saturating_sub(FOOTER_ROWS).max(1)
    }

    fn push(&mut self, turn: Turn) {
        self.conversation.push(turn);
        self.scroll = 0;
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
        if self.input.is_blank() || self.state != ChatState::Idle {
            return Command::None;
        }
        let text = self.input.take();
        if let Err(e) = &self.model {
            let note = e.to_string();
            self.push(Turn::system(note));
            return Command::None;
        }
        self.push(Turn::user(text.trim()));
        self.send()
    }

    /// Snapshot the conversation and issue one send.
    fn send(&mut self) -> Command {
        let service = match &self.model {
            Ok(s) => Arc::clone(s),
            Err(e) => {
                let e = e.clone();
                self.fail(e);
                return Command::None;
            }
        };
        self.state = ChatState::AwaitingReply;
        let history = self.conversation.snapshot();
        let tools = self.tools.declarations();
        debug!(turns = history.len(), "chat send");
        Command::perform(async move {
            match service.send_turn(history, tools).await {
                Ok(reply) => Message::ModelReplied(reply),
                Err(e) => Message::ModelFailed(e),
            }
        })
    }

    fn on_reply(&mut self, reply: ModelReply) -> Command {
        if self.state != ChatState::AwaitingReply {
            warn!("model reply arrived while not awaiting one; dropped");
            return Command::None;
        }

        let mut pending = Vec::new();
        let mut tasks = Vec::new();
        for part in reply.parts {
            match part {
                ReplyPart::Text(text) => {
                    if !text.trim().is_empty() {
                        self.push(Turn::agent(text));
                    }
                }
                ReplyPart::ToolCall(call) => match self.tools.invoke(&call.name) {
                    Ok(fut) => {
                        info!(tool = %call.name, id = %call.id, "tool call");
                        let call_id = call.id.clone();
                        let name = call.name.clone();
                        pending.push(call);
                        tasks.push(Command::perform(async move {
                            Message::ToolFinished { call_id, name, result: fut.await }
                        }));
                    }
                    Err(_) => {
                        warn!(tool = %call.name, "model asked for an unknown tool");
                        self.push(Turn::system(format!("[Unknown tool: {}]", call.name)));
                    }
                },
            }
        }

        if pending.is_empty() {
            self.state = ChatState::Idle;
            return Command::None;
        }
        self.state = ChatState::ToolDispatch { pending };
        Command::batch(tasks)
    }

    fn on_tool_finished(&mut self, call_id: String, name: String, result: Result<Value, PaneError>) -> Command {
        let ChatState::ToolDispatch { pending } = &mut self.state else {
            warn!(%call_id, "tool result arrived outside dispatch; dropped");
            return Command::None;
        };
        let Some(pos) = pending.iter().position(|c| c.id == call_id) else {
            warn!(%call_id, "tool result for an unknown call; dropped");
            return Command::None;
        };
        let call = pending.remove(pos);
        let done = pending.is_empty();

        let content = match result {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
            Err(e) => format!("Error executing {name}: {e}"),
        };
        self.push(Turn::tool(call, content));

        if done { self.send() } else { Command::None }
    }

    fn fail(&mut self, e: PaneError) {
        warn!(error = %e, "chat request failed");
        self.push(Turn::system(format!("Error: {e}")));
        self.state = ChatState::Idle;
    }

    fn rows(&self, width: usize) -> Vec<Line<'static>> {
        let mut rows = Vec::new();
        if self.conversation.is_empty() {
            rows.push(Line::styled(WELCOME, Style::default().fg(Color::DarkGray)));
            return rows;
        }

        for turn in self.conversation.turns() {
            let stamp = if self.timestamps {
                Local
                    .timestamp_opt(turn.at, 0)
                    .single()
                    .map(|t| t.format("[%H:%M] ").to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            };
            let (prefix, prefix_style, body_style) = match turn.role {
                Role::User => ("You: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD), Style::default().fg(Color::White)),
                Role::Agent => ("Model: ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD), Style::default().fg(Color::White)),
                Role::System => ("", Style::default(), Style::default().fg(Color::Yellow)),
                Role::Tool => ("", Style::default(), Style::default().fg(Color::DarkGray)),
            };

            let lead = stamp.len() + prefix.len();
            let room = width.saturating_sub(lead).max(1);
            let wrapped = if turn.role == Role::Tool {
                // Verbatim JSON: keep indentation, break long lines by width
                turn.content.lines().flat_map(|line| hard_wrap(line, room)).collect::<Vec<_>>()
            } else {
                wrap_text(&turn.content, room)
            };
            for (i, text) in wrapped.into_iter().enumerate() {
                let mut spans = Vec::new();
                if i == 0 {
                    spans.push(Span::styled(stamp.clone(), Style::default().fg(Color::DarkGray)));
                    spans.push(Span::styled(prefix, prefix_style));
                } else if lead > 0 {
                    spans.push(Span::raw(" ".repeat(lead)));
                }
                spans.push(Span::styled(text, body_style));
                rows.push(Line::from(spans));
            }
            rows.push(Line::raw(""));
        }
        rows
    }
}

impl Pane for ChatPane {
    fn title(&self) -> String {
        "Chat".to_string()
    }

    fn update(&mut self, message: Message) -> Command {
        match message {
            Message::Key(key) => self.handle_key(key),
            Message::ModelReplied(reply) => self.on_reply(reply),
            Message::ModelFailed(e) => {
                self.fail(e);
                Command::None
            }
            Message::ToolFinished { call_id, name, result } => self.on_tool_finished(call_id, name, result),
            Message::CommandFailed(e) if self.busy() => {
                self.fail(e);
                Command::None
            }
            _ => Command::None,
        }
    }

    fn render(&self, f: &mut Frame, area: Rect, tick: u32) {
        let [history_area, status_area, input_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1), Constraint::Length(2)]).areas(area);

        let block = Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(render::MUTED));
        let inner = block.inner(history_area);
        let rows = self.rows(inner.width.max(1) as usize);
        let offset = scroll_offset(rows.len(), inner.height, self.scroll);
        f.render_widget(Paragraph::new(rows).block(block).scroll((offset, 0)), history_area);

        let status = match &self.state {
            ChatState::Idle => Line::raw(""),
            ChatState::AwaitingReply => Line::styled(
                format!(" {} thinking…", spinner_glyph(tick)),
                Style::default().fg(Color::Cyan),
            ),
            ChatState::ToolDispatch { pending } => Line::styled(
                format!(" {} running tools ({} left)…", spinner_glyph(tick), pending.len()),
                Style::default().fg(Color::Yellow),
            ),
        };
        f.render_widget(Paragraph::new(status), status_area);

        render::draw_input(f, input_area, "❯ ", &self.input, "message", self.busy(), tick);
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
    }

    fn busy(&self) -> bool {
        self.state != ChatState::Idle
    }

    fn hints(&self) -> &'static str {
        "Enter send · PgUp/PgDn scroll"
    }
}
