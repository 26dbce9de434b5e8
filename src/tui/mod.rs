#![forbid(unsafe_code)]

pub mod app;
pub mod picker;

use std::io;
use std::io::IsTerminal as _;

use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::error::WtnavError;

// Screens are drawn on stderr so stdout stays free for a hand-off path.
type CrosstermTerminal = ratatui::Terminal<ratatui::backend::CrosstermBackend<io::Stderr>>;

/// True when a user can interact with a screen drawn on stderr.
#[must_use]
pub fn is_tty() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

pub fn init_terminal() -> Result<CrosstermTerminal, WtnavError> {
    use crossterm::terminal::enable_raw_mode;
    use ratatui::backend::CrosstermBackend;

    enable_raw_mode().map_err(|e| WtnavError::Other(format!("failed to enable raw mode: {e}")))?;
    let mut stderr = io::stderr();
    crossterm::execute!(stderr, crossterm::terminal::EnterAlternateScreen)
        .map_err(|e| WtnavError::Other(format!("failed to enter alt screen: {e}")))?;
    let backend = CrosstermBackend::new(stderr);
    let terminal = ratatui::Terminal::new(backend)
        .map_err(|e| WtnavError::Other(format!("failed to create terminal: {e}")))?;
    Ok(terminal)
}

pub fn restore_terminal(mut terminal: CrosstermTerminal) -> Result<(), WtnavError> {
    use crossterm::terminal::disable_raw_mode;

    disable_raw_mode()
        .map_err(|e| WtnavError::Other(format!("failed to disable raw mode: {e}")))?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )
    .map_err(|e| WtnavError::Other(format!("failed to leave alt screen: {e}")))?;
    terminal
        .show_cursor()
        .map_err(|e| WtnavError::Other(format!("failed to show cursor: {e}")))?;
    Ok(())
}

/// Restores the terminal when dropped, including on early returns and panics
/// that unwind through the event loop.
pub(crate) struct TerminalGuard {
    pub(crate) terminal: Option<CrosstermTerminal>,
}

impl TerminalGuard {
    pub(crate) fn new(terminal: CrosstermTerminal) -> Self {
        Self {
            terminal: Some(terminal),
        }
    }

    pub(crate) fn terminal(&mut self) -> Result<&mut CrosstermTerminal, WtnavError> {
        self.terminal
            .as_mut()
            .ok_or_else(|| WtnavError::Other("terminal unavailable".to_owned()))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Some(terminal) = self.terminal.take() {
            let _ = restore_terminal(terminal);
        }
    }
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
