use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
};
use tracing::{debug, warn};

use super::pane::Pane;
use super::render;
use crate::runtime::{Command, Envelope, Message, PaneId};

/// Rows taken by the tab bar and the status line.
pub const CHROME_ROWS: u16 = 2;

/// Owns every pane, tracks which one is active, and routes input and
/// command results.
pub struct Composer {
    panes: Vec<Box<dyn Pane>>,
    active: PaneId,
    tick: u32,
}

impl Composer {
    pub fn new(panes: Vec<Box<dyn Pane>>) -> Self {
        Self { panes, active: 0, tick: 0 }
    }

    #[cfg(test)]
    pub fn active(&self) -> PaneId {
        self.active
    }

    #[cfg(test)]
    pub fn pane(&self, id: PaneId) -> Option<&dyn Pane> {
        self.panes.get(id).map(|p| &**p)
    }

    /// Every pane's startup command, fanned out.
    pub fn init(&mut self) -> Command {
        Command::batch(
            self.panes
                .iter_mut()
                .enumerate()
                .map(|(id, pane)| pane.init().for_pane(id)),
        )
    }

    pub fn dispatch(&mut self, event: Event) -> Command {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.on_key(key),
            Event::Resize(width, height) => self.on_resize(width, height),
            _ => Command::None,
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Command {
        let count = self.panes.len();
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            debug!("quit requested");
            return Command::Quit;
        }
        if count == 0 {
            return Command::None;
        }
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Tab) => {
                self.active = (self.active + 1) % count;
                Command::None
            }
            (_, KeyCode::BackTab) | (KeyModifiers::SHIFT, KeyCode::Tab) => {
                self.active = (self.active + count - 1) % count;
                Command::None
            }
            (KeyModifiers::CONTROL, KeyCode::Char('r')) => {
                debug!(pane = self.active, "refresh");
                self.panes[self.active].init().for_pane(self.active)
            }
            _ => self.panes[self.active].update(Message::Key(key)).for_pane(self.active),
        }
    }

    fn on_resize(&mut self, width: u16, height: u16) -> Command {
        let content = height.saturating_sub(CHROME_ROWS);
        for pane in &mut self.panes {
            pane.resize(width, content);
        }
        match self.panes.get_mut(self.active) {
            Some(pane) => pane.update(Message::Resize { width, height }).for_pane(self.active),
            None => Command::None,
        }
    }

    /// Hand a finished command's message to the pane that issued it.
    pub fn deliver(&mut self, envelope: Envelope) -> Command {
        match envelope.pane {
            Some(id) if id < self.panes.len() => self.panes[id].update(envelope.message).for_pane(id),
            pane => {
                warn!(?pane, message = ?envelope.message, "undeliverable message dropped");
                Command::None
            }
        }
    }

    /// Advance the spinner. Only called while something is busy.
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn busy(&self) -> bool {
        self.panes.iter().any(|p| p.busy())
    }

    pub fn render(&self, f: &mut Frame) {
        let [tabs_area, body_area, status_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)]).areas(f.area());

        let titles: Vec<String> = self.panes.iter().map(|p| p.title()).collect();
        render::draw_tab_bar(f, &titles, self.active, tabs_area);

        let hints = match self.panes.get(self.active) {
            Some(pane) => {
                pane.render(f, body_area, self.tick);
                pane.hints()
            }
            None => "",
        };
        render::draw_status_bar(f, status_area, hints, self.busy(), self.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend, layout::Rect, widgets::Paragraph};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(String, Message)>>>;
    type Sizes = Arc<Mutex<Vec<(&'static str, u16, u16)>>>;

    struct FakePane {
        name: &'static str,
        log: Log,
        sizes: Sizes,
        size: (u16, u16),
    }

    impl Pane for FakePane {
        fn title(&self) -> String {
            self.name.to_string()
        }

        fn init(&mut self) -> Command {
            Command::perform(async { Message::IssuesFetched(vec![]) })
        }

        fn update(&mut self, message: Message) -> Command {
            self.log.lock().unwrap().push((self.name.to_string(), message));
            Command::None
        }

        fn render(&self, f: &mut Frame, area: Rect, _tick: u32) {
            f.render_widget(Paragraph::new(format!("{} {}x{}", self.name, self.size.0, self.size.1)), area);
        }

        fn resize(&mut self, width: u16, height: u16) {
            self.size = (width, height);
            self.sizes.lock().unwrap().push((self.name, width, height));
        }
    }

    fn composer_with_sizes(names: &[&'static str]) -> (Composer, Log, Sizes) {
        let log: Log = Arc::default();
        let sizes: Sizes = Arc::default();
        let panes = names
            .iter()
            .map(|name| {
                Box::new(FakePane { name: *name, log: log.clone(), sizes: sizes.clone(), size: (0, 0) })
                    as Box<dyn Pane>
            })
            .collect();
        (Composer::new(panes), log, sizes)
    }

    fn composer(names: &[&'static str]) -> (Composer, Log) {
        let (c, log, _) = composer_with_sizes(names);
        (c, log)
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_tab_cycles_forward_and_back_without_reaching_panes() {
        let (mut c, log) = composer(&["a", "b", "c"]);
        c.dispatch(key(KeyCode::Tab, KeyModifiers::NONE));
        assert_eq!(c.active(), 1);
        c.dispatch(key(KeyCode::Tab, KeyModifiers::NONE));
        c.dispatch(key(KeyCode::Tab, KeyModifiers::NONE));
        assert_eq!(c.active(), 0);
        c.dispatch(key(KeyCode::BackTab, KeyModifiers::SHIFT));
        assert_eq!(c.active(), 2);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ctrl_c_quits() {
        let (mut c, _) = composer(&["a"]);
        assert!(c.dispatch(key(KeyCode::Char('c'), KeyModifiers::CONTROL)).is_quit());
    }

    #[test]
    fn test_keys_reach_only_the_active_pane() {
        let (mut c, log) = composer(&["a", "b"]);
        c.dispatch(key(KeyCode::Tab, KeyModifiers::NONE));
        c.dispatch(key(KeyCode::Char('x'), KeyModifiers::NONE));
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "b");
        assert!(matches!(log[0].1, Message::Key(k) if k.code == KeyCode::Char('x')));
    }

    #[test]
    fn test_resize_reaches_every_pane() {
        let (mut c, log, sizes) = composer_with_sizes(&["a", "b", "c"]);
        c.dispatch(Event::Resize(100, 40));
        let content = 40 - CHROME_ROWS;
        assert_eq!(*sizes.lock().unwrap(), vec![("a", 100, content), ("b", 100, content), ("c", 100, content)]);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], ("a".to_string(), Message::Resize { width: 100, height: 40 }));
    }

    #[tokio::test]
    async fn test_init_fans_out_tagged_per_pane() {
        let (mut c, _) = composer(&["a", "b", "c"]);
        let cmd = c.init();
        assert_eq!(cmd.task_count(), 3);
        let panes: Vec<Option<PaneId>> = cmd.collect().await.into_iter().map(|(p, _)| p).collect();
        assert_eq!(panes, vec![Some(0), Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_ctrl_r_reinits_active_pane() {
        let (mut c, _) = composer(&["a", "b"]);
        c.dispatch(key(KeyCode::Tab, KeyModifiers::NONE));
        let cmd = c.dispatch(key(KeyCode::Char('r'), KeyModifiers::CONTROL));
        let tagged: Vec<Option<PaneId>> = cmd.collect().await.into_iter().map(|(p, _)| p).collect();
        assert_eq!(tagged, vec![Some(1)]);
    }

    #[test]
    fn test_deliver_routes_by_tag() {
        let (mut c, log) = composer(&["a", "b"]);
        c.deliver(Envelope { pane: Some(1), message: Message::IssuesFetched(vec![]) });
        c.deliver(Envelope { pane: Some(9), message: Message::IssuesFetched(vec![]) });
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "b");
    }

    #[test]
    fn test_render_is_idempotent() {
        let (mut c, _) = composer(&["alpha", "beta"]);
        c.dispatch(Event::Resize(40, 8));
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();

        terminal.draw(|f| c.render(f)).unwrap();
        let first = terminal.backend().buffer().clone();
        terminal.draw(|f| c.render(f)).unwrap();
        assert_eq!(&first, terminal.backend().buffer());

        let text: String = first.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("[1] alpha"));
        assert!(text.contains("alpha 40x6"));
    }
}
