use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use tracing::{debug, info, warn};

use super::pane::Pane;
use super::render::{self, spinner_glyph};
use crate::error::PaneError;
use crate::runtime::{Command, Message};
use crate::trackers::{IssueItem, Tracker};

/// Read-only list of issues from one tracker, with incremental filtering.
pub struct IssueListPane {
    tracker: Arc<dyn Tracker>,
    title: String,
    items: Vec<IssueItem>,
    loaded: bool,
    last_error: Option<PaneError>,
    in_flight: bool,
    selected: usize,
    filter: String,
    /// `/` pressed: keystrokes edit the filter
    filtering: bool,
    height: u16,
}

impl IssueListPane {
    pub fn new(tracker: Arc<dyn Tracker>) -> Self {
        Self {
            title: tracker.title(),
            tracker,
            items: Vec::new(),
            loaded: false,
            last_error: None,
            in_flight: false,
            selected: 0,
            filter: String::new(),
            filtering: false,
            height: 0,
        }
    }

    #[cfg(test)]
    pub fn items(&self) -> &[IssueItem] {
        &self.items
    }

    #[cfg(test)]
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    #[cfg(test)]
    pub fn last_error(&self) -> Option<&PaneError> {
        self.last_error.as_ref()
    }

    #[cfg(test)]
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Items whose title contains the filter, case-insensitively.
    pub fn visible(&self) -> Vec<&IssueItem> {
        if self.filter.is_empty() {
            return self.items.iter().collect();
        }
        let needle = self.filter.to_lowercase();
        self.items.iter().filter(|i| i.title.to_lowercase().contains(&needle)).collect()
    }

    fn set_items(&mut self, items: Vec<IssueItem>) {
        self.items = items;
        self.loaded = true;
        self.in_flight = false;
        self.selected = 0;
    }

    fn clamp_selection(&mut self) {
        let n = self.visible().len();
        self.selected = self.selected.min(n.saturating_sub(1));
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.filtering {
            match key.code {
                KeyCode::Esc => {
                    self.filter.clear();
                    self.filtering = false;
                }
                KeyCode::Enter => self.filtering = false,
                KeyCode::Backspace => {
                    self.filter.pop();
                }
                KeyCode::Up => self.selected = self.selected.saturating_sub(1),
                KeyCode::Down => self.selected += 1,
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.filter.push(c),
                _ => {}
            }
            self.clamp_selection();
            return;
        }

        let page = (self.height / 2).max(1) as usize;
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.selected += 1,
            KeyCode::PageUp => self.selected = self.selected.saturating_sub(page),
            KeyCode::PageDown => self.selected += page,
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = usize::MAX,
            KeyCode::Char('/') => self.filtering = true,
            KeyCode::Esc => self.filter.clear(),
            _ => {}
        }
        self.clamp_selection();
    }
}

impl Pane for IssueListPane {
    fn title(&self) -> String {
        self.title.clone()
    }

    /// Exactly one fetch, unless configuration is missing or one is already
    /// running.
    fn init(&mut self) -> Command {
        if self.in_flight {
            debug!(pane = %self.title, "fetch already in flight; refresh ignored");
            return Command::None;
        }
        if let Some(hint) = self.tracker.setup_hint() {
            info!(pane = %self.title, "tracker not configured");
            self.set_items(vec![IssueItem::new("Setup Required", hint)]);
            return Command::None;
        }

        self.in_flight = true;
        info!(pane = %self.title, "fetching issues");
        let fetch = self.tracker.fetch();
        Command::perform(async move {
            match fetch.await {
                Ok(items) => Message::IssuesFetched(items),
                Err(e) => Message::FetchFailed(e),
            }
        })
    }

    fn update(&mut self, message: Message) -> Command {
        match message {
            Message::Key(key) => self.handle_key(key),
            Message::IssuesFetched(items) => {
                debug!(pane = %self.title, count = items.len(), "issues fetched");
                self.last_error = None;
                if items.is_empty() {
                    let hint = self.tracker.empty_hint();
                    self.set_items(vec![IssueItem::new("No issues found", hint)]);
                } else {
                    self.set_items(items);
                }
            }
            Message::FetchFailed(e) | Message::CommandFailed(e) => {
                warn!(pane = %self.title, error = %e, "issue fetch failed");
                self.set_items(vec![IssueItem::new("Error", e.to_string())]);
                self.last_error = Some(e);
            }
            _ => {}
        }
        Command::None
    }

    fn render(&self, f: &mut Frame, area: Rect, tick: u32) {
        let mut heading = vec![Span::styled(
            format!(" {} ", self.title),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )];
        if self.in_flight {
            heading.push(Span::styled(format!("{} loading ", spinner_glyph(tick)), Style::default().fg(Color::DarkGray)));
        } else if self.last_error.is_some() {
            heading.push(Span::styled("fetch failed ", Style::default().fg(Color::Red)));
        }
        if self.filtering || !self.filter.is_empty() {
            let cursor = if self.filtering { "▏" } else { "" };
            heading.push(Span::styled(
                format!(" filter: {}{cursor} ", self.filter),
                Style::default().fg(Color::Yellow),
            ));
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(render::MUTED))
            .title(Line::from(heading));

        if !self.loaded {
            let msg = Paragraph::new(Line::styled("Loading…", Style::default().fg(Color::DarkGray))).block(block);
            f.render_widget(msg, area);
            return;
        }

        let visible = self.visible();
        if visible.is_empty() {
            let msg = Paragraph::new(Line::styled("No matches", Style::default().fg(Color::DarkGray))).block(block);
            f.render_widget(msg, area);
            return;
        }

        let items: Vec<ListItem> = visible
            .iter()
            .map(|item| {
                ListItem::new(vec![
                    Line::styled(item.title.clone(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
                    Line::styled(format!("  {}", item.description), Style::default().fg(Color::DarkGray)),
                ])
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::Rgb(20, 20, 40)))
            .highlight_symbol("▌ ");
        let mut state = ListState::default().with_selected(Some(self.selected));
        f.render_stateful_widget(list, area, &mut state);
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
    }

    fn busy(&self) -> bool {
        self.in_flight
    }

    fn hints(&self) -> &'static str {
        "↑↓ select · / filter · Esc clear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeTracker {
        hint: Option<String>,
        result: Result<Vec<IssueItem>, PaneError>,
        calls: AtomicUsize,
    }

    impl FakeTracker {
        fn returning(result: Result<Vec<IssueItem>, PaneError>) -> Arc<Self> {
            Arc::new(Self { hint: None, result, calls: AtomicUsize::new(0) })
        }
    }

    impl Tracker for FakeTracker {
        fn title(&self) -> String {
            "Fake Issues".to_string()
        }

        fn setup_hint(&self) -> Option<String> {
            self.hint.clone()
        }

        fn empty_hint(&self) -> String {
            "Nothing assigned to you.".to_string()
        }

        fn fetch(&self) -> BoxFuture<'static, Result<Vec<IssueItem>, PaneError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.result.clone();
            async move { result }.boxed()
        }
    }

    async fn loaded(tracker: Arc<FakeTracker>) -> IssueListPane {
        let mut pane = IssueListPane::new(tracker);
        let cmd = pane.init();
        for (_, msg) in cmd.collect().await {
            pane.update(msg);
        }
        pane
    }

    fn key(code: KeyCode) -> Message {
        Message::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn test_missing_config_shows_setup_without_fetching() {
        let tracker = Arc::new(FakeTracker {
            hint: Some("Please set JIRA_URL, JIRA_EMAIL, JIRA_TOKEN environment variables".into()),
            result: Ok(vec![]),
            calls: AtomicUsize::new(0),
        });
        let mut pane = IssueListPane::new(tracker.clone());
        assert!(pane.init().is_none());
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pane.items().len(), 1);
        assert_eq!(pane.items()[0].title, "Setup Required");
    }

    #[tokio::test]
    async fn test_init_issues_exactly_one_fetch() {
        let tracker = FakeTracker::returning(Ok(vec![IssueItem::new("OPS-1 a", "Status: Done")]));
        let mut pane = IssueListPane::new(tracker.clone());
        let cmd = pane.init();
        assert_eq!(cmd.task_count(), 1);
        // refresh while in flight is refused
        assert!(pane.init().is_none());
        for (_, msg) in cmd.collect().await {
            pane.update(msg);
        }
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 1);
        assert!(pane.loaded());
        assert_eq!(pane.items()[0].title, "OPS-1 a");
    }

    #[tokio::test]
    async fn test_empty_result_shows_placeholder() {
        let pane = loaded(FakeTracker::returning(Ok(vec![]))).await;
        assert_eq!(pane.items(), &[IssueItem::new("No issues found", "Nothing assigned to you.")]);
    }

    #[tokio::test]
    async fn test_failure_shows_single_error_item() {
        let err = PaneError::protocol("Jira API error: 401 Unauthorized");
        let pane = loaded(FakeTracker::returning(Err(err.clone()))).await;
        assert_eq!(pane.items(), &[IssueItem::new("Error", "Jira API error: 401 Unauthorized")]);
        assert_eq!(pane.last_error(), Some(&err));
        assert!(!pane.busy());
    }

    #[tokio::test]
    async fn test_render_empty_result_placeholder_is_stable() {
        let pane = loaded(FakeTracker::returning(Ok(vec![]))).await;
        let screen = render::draw_twice(&pane, 50, 8);
        assert!(screen[0].contains("Fake Issues"), "{screen:#?}");
        assert!(screen.iter().any(|row| row.contains("No issues found")), "{screen:#?}");
        assert!(screen.iter().any(|row| row.contains("Nothing assigned to you.")), "{screen:#?}");
    }

    #[tokio::test]
    async fn test_render_marks_selected_item() {
        let mut pane = loaded(FakeTracker::returning(Ok(vec![
            IssueItem::new("#1 Crash on resize", "by a [open]"),
            IssueItem::new("#2 Docs typo", "by b [open]"),
        ])))
        .await;
        pane.update(key(KeyCode::Down));

        let screen = render::draw_twice(&pane, 50, 10);
        let selected = screen.iter().find(|row| row.contains("#2 Docs typo")).unwrap();
        assert!(selected.contains("▌ #2 Docs typo"), "{screen:#?}");
        assert!(!screen.iter().any(|row| row.contains("▌ #1")), "{screen:#?}");
    }

    #[test]
    fn test_render_before_first_fetch_says_loading() {
        let pane = IssueListPane::new(FakeTracker::returning(Ok(vec![])));
        let screen = render::draw_twice(&pane, 40, 5);
        assert!(screen.iter().any(|row| row.contains("Loading…")), "{screen:#?}");
    }

    #[tokio::test]
    async fn test_filter_and_selection() {
        let mut pane = loaded(FakeTracker::returning(Ok(vec![
            IssueItem::new("#1 Crash on resize", "by a [open]"),
            IssueItem::new("#2 Docs typo", "by b [open]"),
            IssueItem::new("#3 Resize flicker", "by c [open]"),
        ])))
        .await;

        pane.update(key(KeyCode::Down));
        pane.update(key(KeyCode::Down));
        pane.update(key(KeyCode::Down));
        assert_eq!(pane.selected(), 2);

        pane.update(key(KeyCode::Char('/')));
        for c in "resize".chars() {
            pane.update(key(KeyCode::Char(c)));
        }
        let titles: Vec<&str> = pane.visible().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["#1 Crash on resize", "#3 Resize flicker"]);
        assert_eq!(pane.selected(), 1);

        pane.update(key(KeyCode::Esc));
        assert_eq!(pane.visible().len(), 3);
    }
}
