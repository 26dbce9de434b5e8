#![forbid(unsafe_code)]

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::core::table::WorktreeTable;
use crate::core::worktree::Worktree;
use crate::error::WtnavError;
use crate::tui;

/// Asks the user to choose one of `candidates`, narrowing with `query` to
/// start with. Returns the chosen worktree.
pub fn pick_worktree(
    title: &str,
    candidates: &[Worktree],
    query: &str,
) -> Result<Worktree, WtnavError> {
    if candidates.is_empty() {
        return Err(WtnavError::Other(
            "no worktrees available for selection".to_owned(),
        ));
    }
    if !tui::is_tty() {
        return Err(WtnavError::Other(
            "interactive selection requires a TTY".to_owned(),
        ));
    }

    let mut state = PickerState::new(candidates.to_vec(), query);

    let terminal = tui::init_terminal()?;
    let mut guard = tui::TerminalGuard::new(terminal);

    loop {
        guard
            .terminal()?
            .draw(|f| draw_ui(f, title, &mut state))
            .map_err(|e| WtnavError::Other(format!("failed to draw picker: {e}")))?;

        if event::poll(Duration::from_millis(50))
            .map_err(|e| WtnavError::Other(format!("event poll failed: {e}")))?
            && let Event::Key(key) =
                event::read().map_err(|e| WtnavError::Other(format!("event read failed: {e}")))?
            && let Some(picked) = state.handle_key(key)?
        {
            return Ok(picked);
        }
    }
}

struct PickerState {
    table: WorktreeTable,
    query: String,
    list_state: ListState,
}

impl PickerState {
    fn new(candidates: Vec<Worktree>, query: &str) -> Self {
        let mut table = WorktreeTable::new();
        table.set_worktrees(candidates);
        let mut state = Self {
            table,
            query: query.to_owned(),
            list_state: ListState::default(),
        };
        state.apply_query();
        state
    }

    fn selected(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    fn select(&mut self, idx: usize) {
        if self.table.is_empty() {
            self.list_state.select(None);
        } else {
            self.list_state.select(Some(idx.min(self.table.len() - 1)));
        }
    }

    fn apply_query(&mut self) {
        self.table.set_filter(&self.query);
        self.select(self.selected());
    }

    /// `Ok(Some(_))` once a worktree is accepted.
    fn handle_key(&mut self, key: KeyEvent) -> Result<Option<Worktree>, WtnavError> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            return Err(WtnavError::Cancelled);
        }

        match key.code {
            KeyCode::Esc => return Err(WtnavError::Cancelled),
            KeyCode::Enter => {
                return Ok(self.table.row_at(self.selected()).cloned());
            }
            KeyCode::Up => self.select(self.selected().saturating_sub(1)),
            KeyCode::Down => self.select(self.selected() + 1),
            KeyCode::PageUp => self.select(self.selected().saturating_sub(10)),
            KeyCode::PageDown => self.select(self.selected() + 10),
            KeyCode::Backspace => {
                self.query.pop();
                self.apply_query();
            }
            KeyCode::Char(c)
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                self.query.push(c);
                self.apply_query();
            }
            _ => {}
        }
        Ok(None)
    }
}

fn draw_ui(f: &mut Frame<'_>, title: &str, state: &mut PickerState) {
    let area = f.area();
    let outer = Block::default().title(title).borders(Borders::ALL);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[0]);

    let items: Vec<ListItem> = state
        .table
        .rows()
        .iter()
        .map(|wt| {
            ListItem::new(Line::from(vec![
                Span::raw(wt.display_branch().to_owned()),
                Span::styled(
                    format!("  {}", wt.directory_name()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Worktrees"))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    f.render_stateful_widget(list, body[0], &mut state.list_state);

    let details = match state.table.row_at(state.selected()) {
        Some(wt) => details_text(wt),
        None => "No matching worktrees".to_owned(),
    };
    let preview = Paragraph::new(details)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: false });
    f.render_widget(preview, body[1]);

    let bottom = Paragraph::new(Line::from(vec![
        Span::styled("Query: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(state.query.as_str()),
        Span::raw("  "),
        Span::styled(
            "↑/↓ move • Enter accept • Esc cancel",
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    f.render_widget(bottom, chunks[1]);
}

fn details_text(wt: &Worktree) -> String {
    let mut out = format!(
        "Branch: {}\nPath:   {}\nCommit: {}",
        wt.display_branch(),
        wt.path,
        wt.short_hash()
    );
    let status = wt.status_label();
    if !status.is_empty() {
        out.push_str("\nStatus: ");
        out.push_str(&status);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wt(path: &str, branch: &str) -> Worktree {
        Worktree {
            path: path.to_owned(),
            commit_hash: "0123456789abcdef".to_owned(),
            branch: Some(branch.to_owned()),
            ..Worktree::default()
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn initial_query_narrows_and_enter_accepts() {
        let mut state = PickerState::new(
            vec![
                wt("/r/main", "main"),
                wt("/r/feat-a", "feature/a"),
                wt("/r/feat-b", "feature/b"),
            ],
            "feat",
        );
        assert_eq!(state.table.len(), 2);

        state.handle_key(key(KeyCode::Down)).expect("down");
        let picked = state.handle_key(key(KeyCode::Enter)).expect("enter");
        assert_eq!(picked.map(|w| w.path), Some("/r/feat-b".to_owned()));
    }

    #[test]
    fn typing_refilters_and_clamps_selection() {
        let mut state = PickerState::new(vec![wt("/r/a", "alpha"), wt("/r/b", "beta")], "");
        state.handle_key(key(KeyCode::Down)).expect("down");
        assert_eq!(state.selected(), 1);

        state.handle_key(key(KeyCode::Char('l'))).expect("type");
        assert_eq!(state.table.len(), 1);
        assert_eq!(state.selected(), 0);
    }

    #[test]
    fn enter_without_matches_accepts_nothing() {
        let mut state = PickerState::new(vec![wt("/r/a", "alpha")], "zzz");
        assert!(state.table.is_empty());
        assert!(state.handle_key(key(KeyCode::Enter)).expect("enter").is_none());
    }

    #[test]
    fn escape_cancels() {
        let mut state = PickerState::new(vec![wt("/r/a", "alpha")], "");
        let err = state.handle_key(key(KeyCode::Esc)).expect_err("cancel");
        assert!(matches!(err, WtnavError::Cancelled));
    }

    #[test]
    fn details_include_status_when_present() {
        let mut locked = wt("/r/a", "alpha");
        locked.is_locked = true;
        assert!(details_text(&locked).ends_with("Status: locked"));
        assert!(!details_text(&wt("/r/b", "beta")).contains("Status"));
    }
}
