pub mod chat;
pub mod composer;
pub mod input;
pub mod issues;
pub mod pane;
pub mod render;
pub mod shell;

use std::io;

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::runtime::{Envelope, Executor};

pub use chat::ChatPane;
pub use composer::Composer;
pub use issues::IssueListPane;
pub use pane::Pane;
pub use shell::ShellPane;

const TICK_MS: u64 = 120;

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

/// A panic on the UI thread restores the terminal before the report prints.
/// Panics on worker threads are caught by the executor; they only get logged
/// here so the screen is left alone.
fn install_panic_hook() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if std::thread::current().name() == Some("main") {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            orig_hook(info);
        } else {
            error!(panic = %info, "background task panicked");
        }
    }));
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(composer: Composer) -> Result<()> {
    let mut terminal = setup_terminal()?;
    install_panic_hook();

    let result = event_loop(&mut terminal, composer).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut composer: Composer,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let executor = Executor::new(tx);

    if let Ok((w, h)) = crossterm::terminal::size() {
        let _ = executor.run(composer.dispatch(Event::Resize(w, h)));
    }
    if executor.run(composer.init()).is_break() {
        return Ok(());
    }

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(TICK_MS));
    terminal.draw(|f| composer.render(f))?;
    info!("event loop started");

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if composer.busy() {
                    composer.tick();
                    terminal.draw(|f| composer.render(f))?;
                }
            }

            // ── Finished commands ─────────────────────────────────────────────
            Some(envelope) = rx.recv() => {
                let cmd = composer.deliver(envelope);
                if executor.run(cmd).is_break() { break; }
                terminal.draw(|f| composer.render(f))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            maybe = crossterm_events.next() => {
                match maybe {
                    Some(Ok(ev)) => {
                        let cmd = composer.dispatch(ev);
                        if executor.run(cmd).is_break() { break; }
                        terminal.draw(|f| composer.render(f))?;
                    }
                    Some(Err(e)) => return Err(e).context("terminal event stream failed"),
                    None => break,
                }
            }
        }
    }

    info!("event loop stopped");
    Ok(())
}
