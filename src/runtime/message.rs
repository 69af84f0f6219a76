use crossterm::event::KeyEvent;
use serde_json::Value;

use crate::client::ModelReply;
use crate::error::PaneError;
use crate::trackers::IssueItem;

/// Index of a pane inside the composer's pane list.
pub type PaneId = usize;

// ── Everything a pane can be told ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A keystroke routed to the active pane
    Key(KeyEvent),
    /// Terminal resized (raw terminal size)
    Resize { width: u16, height: u16 },
    /// A shell child process finished; `Ok` holds combined stdout+stderr
    ShellFinished { result: Result<String, PaneError> },
    /// Tracker search completed
    IssuesFetched(Vec<IssueItem>),
    /// Tracker search failed
    FetchFailed(PaneError),
    /// The model answered a send
    ModelReplied(ModelReply),
    /// The model send failed (transport, status, or decode)
    ModelFailed(PaneError),
    /// A catalog tool finished
    ToolFinished {
        call_id: String,
        name: String,
        result: Result<Value, PaneError>,
    },
    /// A command panicked; caught at the executor boundary
    CommandFailed(PaneError),
}

/// A completed command's message plus the pane that issued it.
#[derive(Debug)]
pub struct Envelope {
    pub pane: Option<PaneId>,
    pub message: Message,
}
