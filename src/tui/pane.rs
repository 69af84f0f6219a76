use ratatui::{Frame, layout::Rect};

use crate::runtime::{Command, Message};

/// A self-contained screen the composer can host.
///
/// Panes never block and never spawn work: every side effect leaves as a
/// returned [`Command`], and its result comes back through [`Pane::update`].
pub trait Pane {
    /// Label shown in the tab bar.
    fn title(&self) -> String;

    /// Startup work. Called once at launch and again on explicit refresh.
    fn init(&mut self) -> Command {
        Command::None
    }

    fn update(&mut self, message: Message) -> Command;

    /// Draw into `area`. Output depends only on `self` and `tick`.
    fn render(&self, frame: &mut Frame, area: Rect, tick: u32);

    /// Content area available to the pane, already net of composer chrome.
    fn resize(&mut self, width: u16, height: u16);

    /// True while the pane waits on a command it issued.
    fn busy(&self) -> bool {
        false
    }

    /// Key hints for the status line.
    fn hints(&self) -> &'static str {
        ""
    }
}
