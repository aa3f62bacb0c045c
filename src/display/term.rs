use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Screen;

/// Real terminal backend: alternate screen, raw mode, queued writes
/// flushed once per frame.
pub struct CrosstermScreen {
    out: io::Stdout,
    active: bool,
}

impl CrosstermScreen {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            active: false,
        }
    }
}

impl Default for CrosstermScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for CrosstermScreen {
    fn init(&mut self) -> Result<()> {
        enable_raw_mode().context("enabling raw mode")?;
        execute!(self.out, EnterAlternateScreen, Hide)
            .context("entering alternate screen")?;
        self.active = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        queue!(self.out, Clear(ClearType::All)).context("clearing screen")
    }

    fn print(&mut self, x: u16, y: u16, text: &str, bold: bool) -> Result<()> {
        queue!(self.out, MoveTo(x, y)).context("moving cursor")?;
        if bold {
            queue!(
                self.out,
                SetAttribute(Attribute::Bold),
                Print(text),
                SetAttribute(Attribute::Reset),
            )
            .context("writing bold text")
        } else {
            queue!(self.out, Print(text)).context("writing text")
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("flushing terminal output")
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        // Shutdown path: restore as much of the terminal as possible even
        // if individual steps fail.
        let _ = disable_raw_mode();
        let _ = execute!(self.out, LeaveAlternateScreen, Show);
        debug!("terminal restored");
    }
}

/// Watches for `q` or ctrl-c on a blocking thread and cancels the session.
///
/// Polls with a short timeout so the thread also notices cancellation
/// coming from elsewhere and exits.
pub fn spawn_input_watcher(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !cancel.is_cancelled() {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }

            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let quit = key.code == KeyCode::Char('q')
                || (key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL));
            if quit {
                debug!("quit key pressed");
                cancel.cancel();
                return;
            }
        }
    })
}
