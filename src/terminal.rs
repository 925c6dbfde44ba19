use std::io::{self, Stdout};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, warn};

use crate::app::Cursor;
use crate::error::{Error, Result};
use crate::input;
use crate::ui::{self, Display};

/// Full-screen menu on the controlling terminal.
pub struct TerminalDisplay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalDisplay {
    /// Take over the terminal. Raw mode or the alternate screen failing to
    /// come up is logged and the menu runs degraded.
    pub fn new() -> Result<Self> {
        enter_screen();
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .map_err(Error::terminal("open the terminal"))?;
        terminal
            .hide_cursor()
            .map_err(Error::terminal("hide the cursor"))?;
        terminal.clear().map_err(Error::terminal("clear the screen"))?;
        Ok(Self { terminal })
    }
}

fn enter_screen() {
    if let Err(e) = enable_raw_mode() {
        warn!("Exception during initialization (raw mode): {e}");
    }
    if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
        warn!("Exception during initialization (alternate screen): {e}");
    }
}

impl Display for TerminalDisplay {
    fn size(&self) -> (u16, u16) {
        match self.terminal.size() {
            Ok(size) => (size.width, size.height),
            Err(e) => {
                warn!("cannot query terminal size: {e}");
                (80, 24)
            }
        }
    }

    fn render(&mut self, items: &[String], cursor: Cursor, hovered: Option<usize>) -> Result<()> {
        self.terminal
            .draw(|frame| ui::draw(frame, items, cursor, hovered))
            .map_err(Error::terminal("draw the menu"))?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        debug!("suspending menu");
        disable_raw_mode().map_err(Error::terminal("leave raw mode"))?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(Error::terminal("leave the alternate screen"))?;
        self.terminal
            .show_cursor()
            .map_err(Error::terminal("show the cursor"))?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        debug!("resuming menu");
        enter_screen();
        self.terminal
            .hide_cursor()
            .map_err(Error::terminal("hide the cursor"))?;
        self.terminal
            .clear()
            .map_err(Error::terminal("clear the screen"))?;
        input::discard_pending()
    }
}
