use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;

use super::message::{Message, PaneId};

/// Deferred work. Building a `Command` starts nothing; the executor does.
pub type Task = BoxFuture<'static, Option<Message>>;

pub enum Command {
    /// No work, no message
    None,
    /// Terminal sentinel: the event loop stops consuming
    Quit,
    /// Independent commands, run concurrently
    Batch(Vec<Command>),
    /// One unit of background work yielding at most one message
    Perform(Task),
    /// Route the inner command's message back to `pane`
    ForPane(PaneId, Box<Command>),
}

impl Command {
    /// Wrap a future that always yields a message.
    pub fn perform<F>(fut: F) -> Self
    where
        F: Future<Output = Message> + Send + 'static,
    {
        Command::Perform(Box::pin(async move { Some(fut.await) }))
    }

    /// Combine commands, dropping no-ops. Collapses to `None` or to the
    /// single remaining command when possible.
    pub fn batch(cmds: impl IntoIterator<Item = Command>) -> Self {
        let mut kept: Vec<Command> = cmds.into_iter().filter(|c| !c.is_none()).collect();
        match kept.len() {
            0 => Command::None,
            1 => kept.remove(0),
            _ => Command::Batch(kept),
        }
    }

    /// Tag the command with its originating pane. `None` and `Quit` carry no
    /// result, so they are left untagged.
    pub fn for_pane(self, pane: PaneId) -> Self {
        match self {
            Command::None => Command::None,
            Command::Quit => Command::Quit,
            other => Command::ForPane(pane, Box::new(other)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Command::None)
    }

    /// True if a `Quit` appears anywhere in the tree.
    #[cfg(test)]
    pub fn is_quit(&self) -> bool {
        match self {
            Command::Quit => true,
            Command::Batch(cmds) => cmds.iter().any(Command::is_quit),
            Command::ForPane(_, inner) => inner.is_quit(),
            Command::None | Command::Perform(_) => false,
        }
    }

    /// Number of background tasks this command will start.
    #[cfg(test)]
    pub fn task_count(&self) -> usize {
        match self {
            Command::Perform(_) => 1,
            Command::Batch(cmds) => cmds.iter().map(Command::task_count).sum(),
            Command::ForPane(_, inner) => inner.task_count(),
            Command::None | Command::Quit => 0,
        }
    }

    /// Run every task inline, in order, and collect the tagged messages.
    #[cfg(test)]
    pub async fn collect(self) -> Vec<(Option<PaneId>, Message)> {
        let mut out = Vec::new();
        let mut stack = vec![(None, self)];
        while let Some((pane, cmd)) = stack.pop() {
            match cmd {
                Command::None | Command::Quit => {}
                Command::Perform(task) => {
                    if let Some(msg) = task.await {
                        out.push((pane, msg));
                    }
                }
                Command::ForPane(id, inner) => stack.push((Some(id), *inner)),
                Command::Batch(cmds) => {
                    for c in cmds.into_iter().rev() {
                        stack.push((pane, c));
                    }
                }
            }
        }
        out
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::None => f.write_str("None"),
            Command::Quit => f.write_str("Quit"),
            Command::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Command::Perform(_) => f.write_str("Perform(..)"),
            Command::ForPane(pane, inner) => f.debug_tuple("ForPane").field(pane).field(inner).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaneError;

    fn failed(text: &str) -> Command {
        let msg = Message::FetchFailed(PaneError::transport(text));
        Command::perform(async move { msg })
    }

    #[test]
    fn test_batch_drops_none_and_collapses() {
        assert!(Command::batch([Command::None, Command::None]).is_none());
        let single = Command::batch([Command::None, failed("x")]);
        assert!(matches!(single, Command::Perform(_)));
        let many = Command::batch([failed("a"), Command::None, failed("b")]);
        assert_eq!(many.task_count(), 2);
    }

    #[test]
    fn test_for_pane_leaves_none_and_quit_untagged() {
        assert!(Command::None.for_pane(3).is_none());
        assert!(matches!(Command::Quit.for_pane(3), Command::Quit));
        assert!(matches!(failed("x").for_pane(3), Command::ForPane(3, _)));
    }

    #[test]
    fn test_is_quit_searches_nested() {
        let cmd = Command::batch([failed("a"), Command::Quit]);
        assert!(cmd.is_quit());
        assert!(!failed("a").for_pane(1).is_quit());
    }

    #[tokio::test]
    async fn test_collect_keeps_pane_tags() {
        let cmd = Command::batch([failed("a").for_pane(0), failed("b").for_pane(2)]);
        let msgs = cmd.collect().await;
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].0, Some(0));
        assert_eq!(msgs[1].0, Some(2));
    }
}
