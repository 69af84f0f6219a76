//! Command/message plumbing between panes and the event loop.
//!
//! Panes never touch the network or spawn processes themselves: they return a
//! [`Command`] describing the work, the [`Executor`] runs it on a tokio task,
//! and the single result comes back as an [`Envelope`] on one mpsc queue that
//! only the event loop drains.

pub mod command;
pub mod executor;
pub mod message;

pub use command::Command;
pub use executor::Executor;
pub use message::{Envelope, Message, PaneId};
