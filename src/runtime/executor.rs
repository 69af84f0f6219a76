use std::any::Any;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::command::{Command, Task};
use super::message::{Envelope, Message, PaneId};
use crate::error::PaneError;

/// Starts commands on the tokio runtime and funnels their results into the
/// event loop's inbound queue. Cheap to clone.
#[derive(Clone)]
pub struct Executor {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Executor {
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    /// Start every task in `command` without waiting on any of them.
    /// Returns `Break` if the command contained `Quit`.
    pub fn run(&self, command: Command) -> ControlFlow<()> {
        self.run_for(None, command)
    }

    fn run_for(&self, pane: Option<PaneId>, command: Command) -> ControlFlow<()> {
        match command {
            Command::None => ControlFlow::Continue(()),
            Command::Quit => ControlFlow::Break(()),
            Command::ForPane(id, inner) => self.run_for(Some(id), *inner),
            Command::Batch(cmds) => {
                let mut flow = ControlFlow::Continue(());
                for cmd in cmds {
                    // Keep starting siblings even after a quit so none are lost mid-batch
                    if self.run_for(pane, cmd).is_break() {
                        flow = ControlFlow::Break(());
                    }
                }
                flow
            }
            Command::Perform(task) => {
                self.spawn(pane, task);
                ControlFlow::Continue(())
            }
        }
    }

    fn spawn(&self, pane: Option<PaneId>, task: Task) {
        let tx = self.tx.clone();
        debug!(?pane, "command started");
        tokio::spawn(async move {
            let message = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Some(message)) => message,
                Ok(None) => return,
                Err(panic) => {
                    let reason = panic_reason(panic.as_ref());
                    error!(?pane, %reason, "command panicked");
                    Message::CommandFailed(PaneError::transport(format!(
                        "background task panicked: {reason}"
                    )))
                }
            };
            if tx.send(Envelope { pane, message }).is_err() {
                debug!(?pane, "event loop gone; dropping command result");
            }
        });
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn executor() -> (Executor, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Executor::new(tx), rx)
    }

    fn fetched(n: usize) -> Command {
        Command::perform(async move {
            Message::IssuesFetched(
                (0..n)
                    .map(|i| crate::trackers::IssueItem::new(format!("#{i}"), String::new()))
                    .collect(),
            )
        })
    }

    #[tokio::test]
    async fn test_delivers_message_tagged_with_pane() {
        let (exec, mut rx) = executor();
        assert!(exec.run(fetched(2).for_pane(1)).is_continue());
        let env = rx.recv().await.unwrap();
        assert_eq!(env.pane, Some(1));
        assert!(matches!(env.message, Message::IssuesFetched(ref items) if items.len() == 2));
    }

    #[tokio::test]
    async fn test_none_produces_no_message() {
        let (exec, mut rx) = executor();
        assert!(exec.run(Command::None).is_continue());
        exec.run(Command::Perform(Box::pin(async { None })));
        let got = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(got.is_err(), "expected no message");
    }

    #[tokio::test]
    async fn test_batch_fans_out_in_completion_order() {
        let (exec, mut rx) = executor();
        let slow = Command::perform(async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            Message::FetchFailed(PaneError::transport("slow"))
        })
        .for_pane(0);
        let fast = Command::perform(async { Message::FetchFailed(PaneError::transport("fast")) })
            .for_pane(1);
        exec.run(Command::batch([slow, fast]));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.pane, Some(1));
        assert_eq!(second.pane, Some(0));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure_message() {
        let (exec, mut rx) = executor();
        let boom = Command::Perform(Box::pin(async {
            if true {
                panic!("tracker exploded");
            }
            None
        }));
        exec.run(boom.for_pane(2));
        let env = rx.recv().await.unwrap();
        assert_eq!(env.pane, Some(2));
        match env.message {
            Message::CommandFailed(PaneError::Transport(text)) => {
                assert!(text.contains("tracker exploded"), "got: {text}");
            }
            other => panic!("unexpected message: {other:?}"),
        }

        // Executor still usable afterwards
        exec.run(fetched(0).for_pane(0));
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_quit_breaks_but_starts_siblings() {
        let (exec, mut rx) = executor();
        let flow = exec.run(Command::batch([fetched(1).for_pane(0), Command::Quit]));
        assert!(flow.is_break());
        assert!(rx.recv().await.is_some());
    }
}
