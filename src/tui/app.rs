#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
};
use tokio::sync::mpsc;

use crate::config;
use crate::core::refresh::Refresher;
use crate::core::service::WorktreeService;
use crate::core::table::{Column, SortOrder, WorktreeTable};
use crate::core::worktree::Worktree;
use crate::error::WtnavError;
use crate::nav::editor::LaunchFailure;
use crate::nav::{
    self, Notification, Notifier, OpenMode, Opened, Severity, SwitchOutcome, WindowHost,
};
use crate::tui;

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub icons: bool,
    pub tilde_home: bool,
    pub toast_duration: Duration,
    pub initial_sort: Option<(Column, SortOrder)>,
}

impl AppOptions {
    #[must_use]
    pub fn from_config(cfg: &config::Config) -> Self {
        Self {
            icons: cfg.ui.icons,
            tilde_home: cfg.ui.tilde_home,
            toast_duration: Duration::from_secs(cfg.ui.toast_seconds),
            initial_sort: cfg.ui.initial_sort(),
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            icons: true,
            tilde_home: true,
            toast_duration: Duration::from_secs(3),
            initial_sort: None,
        }
    }
}

/// How the TUI ended, and what (if anything) belongs on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Quit,
    /// A worktree to switch to that no window host could open.
    HandOff(PathBuf),
    /// The last path taken with "Copy path".
    Yanked(String),
}

impl Exit {
    #[must_use]
    pub fn stdout_line(&self) -> Option<String> {
        match self {
            Self::Quit => None,
            Self::HandOff(path) => Some(path.display().to_string()),
            Self::Yanked(path) => Some(path.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Searching,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Switch,
    OpenNewWindow,
    CopyPath,
}

impl MenuItem {
    const ALL: [Self; 3] = [Self::Switch, Self::OpenNewWindow, Self::CopyPath];

    fn label(self) -> &'static str {
        match self {
            Self::Switch => "Switch to worktree",
            Self::OpenNewWindow => "Open in new window",
            Self::CopyPath => "Copy path",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TextInput {
    text: String,
    cursor: usize,
}

impl TextInput {
    fn as_str(&self) -> &str {
        &self.text
    }

    fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    fn insert_char(&mut self, c: char) {
        let mut chars: Vec<char> = self.text.chars().collect();
        let cur = self.cursor.min(chars.len());
        chars.insert(cur, c);
        self.text = chars.into_iter().collect();
        self.cursor = cur + 1;
    }

    fn backspace(&mut self) {
        let mut chars: Vec<char> = self.text.chars().collect();
        let cur = self.cursor.min(chars.len());
        if cur == 0 {
            return;
        }
        chars.remove(cur - 1);
        self.text = chars.into_iter().collect();
        self.cursor = cur - 1;
    }

    fn delete(&mut self) {
        let mut chars: Vec<char> = self.text.chars().collect();
        let cur = self.cursor.min(chars.len());
        if cur >= chars.len() {
            return;
        }
        chars.remove(cur);
        self.text = chars.into_iter().collect();
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        let len = self.text.chars().count();
        self.cursor = (self.cursor + 1).min(len);
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }
}

#[derive(Debug, Clone)]
struct Toast {
    title: String,
    message: String,
    severity: Severity,
    until: Instant,
}

/// Shows notifications in the footer, one at a time.
#[derive(Debug)]
struct Toasts {
    current: Option<Toast>,
    duration: Duration,
}

impl Toasts {
    fn expire(&mut self, now: Instant) {
        if self.current.as_ref().is_some_and(|t| now >= t.until) {
            self.current = None;
        }
    }
}

impl Notifier for Toasts {
    fn notify(&mut self, n: Notification) {
        self.current = Some(Toast {
            title: n.title,
            message: n.message,
            severity: n.severity,
            until: Instant::now() + self.duration,
        });
    }
}

#[derive(Debug)]
struct MainLookup {
    mode: OpenMode,
    main: Option<Worktree>,
}

struct App<H> {
    service: Arc<WorktreeService>,
    host: H,
    opts: AppOptions,
    table: WorktreeTable,
    table_state: TableState,
    search: TextInput,
    mode: Mode,
    menu_target: Option<Worktree>,
    menu_state: ListState,
    toasts: Toasts,
    current_path: Option<String>,
    loaded: bool,
    refreshing: bool,
    refresh_requested: bool,
    main_requested: Option<OpenMode>,
    handoff: Option<PathBuf>,
    yanked: Option<String>,
    should_quit: bool,
}

impl<H: WindowHost> App<H> {
    fn new(service: Arc<WorktreeService>, host: H, opts: AppOptions) -> Self {
        let mut table = WorktreeTable::new();
        table.set_sort(opts.initial_sort);
        let toasts = Toasts {
            current: None,
            duration: opts.toast_duration,
        };
        Self {
            service,
            host,
            opts,
            table,
            table_state: TableState::default(),
            search: TextInput::default(),
            mode: Mode::Normal,
            menu_target: None,
            menu_state: ListState::default(),
            toasts,
            current_path: None,
            loaded: false,
            refreshing: false,
            refresh_requested: true,
            main_requested: None,
            handoff: None,
            yanked: None,
            should_quit: false,
        }
    }

    fn exit(self) -> Exit {
        if let Some(path) = self.handoff {
            Exit::HandOff(path)
        } else if let Some(path) = self.yanked {
            Exit::Yanked(path)
        } else {
            Exit::Quit
        }
    }

    fn apply_listing(&mut self, worktrees: Vec<Worktree>) {
        self.current_path = worktrees
            .iter()
            .find(|wt| self.service.is_current_worktree(wt))
            .map(|wt| wt.path.clone());
        let previous = self.selected_path();
        self.table.set_worktrees(worktrees);
        self.loaded = true;
        self.highlight_current(previous);
    }

    /// Selects the current worktree's row, falling back to the row for
    /// `previous`, then to the first row.
    fn highlight_current(&mut self, previous: Option<String>) {
        let idx = self
            .current_path
            .as_deref()
            .and_then(|p| self.table.find_row_index(p))
            .or_else(|| {
                previous
                    .as_deref()
                    .and_then(|p| self.table.find_row_index(p))
            })
            .or_else(|| (!self.table.is_empty()).then_some(0));
        self.table_state.select(idx);
    }

    fn selected_worktree(&self) -> Option<&Worktree> {
        self.table_state
            .selected()
            .and_then(|idx| self.table.row_at(idx))
    }

    fn selected_path(&self) -> Option<String> {
        self.selected_worktree().map(|wt| wt.path.clone())
    }

    fn move_selection(&mut self, delta: isize) {
        if self.table.is_empty() {
            self.table_state.select(None);
            return;
        }
        let last = self.table.len() - 1;
        let cur = self.table_state.selected().unwrap_or(0);
        let next = cur.saturating_add_signed(delta).min(last);
        self.table_state.select(Some(next));
    }

    fn apply_filter(&mut self) {
        let previous = self.selected_path();
        self.table.set_filter(self.search.as_str());
        self.highlight_current(previous);
    }

    fn toggle_sort(&mut self, column: Column) {
        if !column.is_sortable() {
            return;
        }
        let previous = self.selected_path();
        self.table.toggle_sort(column);
        self.highlight_current(previous);
    }

    fn switch_selected(&mut self, mode: OpenMode) {
        if let Some(target) = self.selected_worktree().cloned() {
            self.switch(&target, mode);
        }
    }

    fn switch(&mut self, target: &Worktree, mode: OpenMode) {
        let result =
            nav::switch_to_worktree(&self.service, &mut self.host, &mut self.toasts, target, mode);
        self.report_switch(result, Some(target));
    }

    fn finish_main(&mut self, lookup: MainLookup) {
        let result = nav::finish_switch_to_main(
            &self.service,
            &mut self.host,
            &mut self.toasts,
            lookup.main.as_ref(),
            lookup.mode,
        );
        self.report_switch(result, lookup.main.as_ref());
    }

    fn report_switch(&mut self, result: Result<SwitchOutcome, WtnavError>, target: Option<&Worktree>) {
        let label = target.map_or("worktree", Worktree::display_branch);
        match result {
            Ok(SwitchOutcome::Opened(Opened::HandOff(path))) => {
                self.handoff = Some(path);
                self.should_quit = true;
            }
            Ok(SwitchOutcome::Opened(Opened::Launched)) => {
                self.toasts
                    .notify(Notification::info("Opened", format!("Opened {label}")));
            }
            Ok(SwitchOutcome::FocusedExisting(path)) => {
                self.toasts.notify(Notification::info(
                    "Focused",
                    format!("{label} is already open at {}", path.display()),
                ));
            }
            Ok(SwitchOutcome::AlreadyHere | SwitchOutcome::NoMainWorktree) => {}
            Err(e) => {
                log::warn!("switching to {label} failed: {e}");
                self.toasts
                    .notify(Notification::warning("Switch failed", e.to_string()));
            }
        }
    }

    fn launch_failed(&mut self, failure: LaunchFailure) {
        self.toasts.notify(Notification::warning(
            "Open failed",
            format!("{}: {}", failure.path.display(), failure.message),
        ));
    }

    fn copy_path(&mut self, target: &Worktree) {
        self.yanked = Some(target.path.clone());
        self.toasts.notify(Notification::info(
            "Path copied",
            format!("{} will be printed on exit", target.path),
        ));
    }

    fn open_menu(&mut self) {
        if let Some(target) = self.selected_worktree().cloned() {
            self.menu_target = Some(target);
            self.menu_state.select(Some(0));
            self.mode = Mode::Menu;
        }
    }

    fn run_menu_item(&mut self, item: MenuItem) {
        self.mode = Mode::Normal;
        let Some(target) = self.menu_target.take() else {
            return;
        };
        match item {
            MenuItem::Switch => self.switch(&target, OpenMode::ReplaceCurrent),
            MenuItem::OpenNewWindow => self.switch(&target, OpenMode::NewWindow),
            MenuItem::CopyPath => self.copy_path(&target),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Searching => self.handle_search_key(key),
            Mode::Menu => self.handle_menu_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if self.search.as_str().is_empty() {
                    self.should_quit = true;
                } else {
                    self.search.clear();
                    self.apply_filter();
                }
            }
            KeyCode::Char('/') => {
                self.search.move_end();
                self.mode = Mode::Searching;
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-10),
            KeyCode::PageDown => self.move_selection(10),
            KeyCode::Home | KeyCode::Char('g') => self.move_selection(isize::MIN),
            KeyCode::End | KeyCode::Char('G') => self.move_selection(isize::MAX),
            KeyCode::Enter => self.switch_selected(OpenMode::ReplaceCurrent),
            KeyCode::Char('o') => self.switch_selected(OpenMode::NewWindow),
            KeyCode::Char('m') => self.open_menu(),
            KeyCode::Char('M') => self.main_requested = Some(OpenMode::ReplaceCurrent),
            KeyCode::Char('r') => self.refresh_requested = true,
            KeyCode::Char('y') => {
                if let Some(target) = self.selected_worktree().cloned() {
                    self.copy_path(&target);
                }
            }
            KeyCode::Char('b') => self.toggle_sort(Column::Branch),
            KeyCode::Char('p') => self.toggle_sort(Column::Path),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c.to_digit(10).map_or(0, |d| d as usize - 1);
                if let Some(column) = Column::from_index(idx) {
                    self.toggle_sort(column);
                }
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.mode = Mode::Normal,
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Left => self.search.move_left(),
            KeyCode::Right => self.search.move_right(),
            KeyCode::Home => self.search.move_home(),
            KeyCode::End => self.search.move_end(),
            KeyCode::Backspace => {
                self.search.backspace();
                self.apply_filter();
            }
            KeyCode::Delete => {
                self.search.delete();
                self.apply_filter();
            }
            KeyCode::Char(c)
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                self.search.insert_char(c);
                self.apply_filter();
            }
            _ => {}
        }
    }

    fn handle_menu_key(&mut self, key: KeyEvent) {
        let cur = self.menu_state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.menu_target = None;
                self.mode = Mode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => self.menu_state.select(Some(cur.saturating_sub(1))),
            KeyCode::Down | KeyCode::Char('j') => self
                .menu_state
                .select(Some((cur + 1).min(MenuItem::ALL.len() - 1))),
            KeyCode::Enter => {
                if let Some(&item) = MenuItem::ALL.get(cur) {
                    self.run_menu_item(item);
                }
            }
            _ => {}
        }
    }
}

/// Runs the worktree browser until the user quits or hands off a path.
///
/// Editors launched by `host` keep running in the background; failures they
/// report on `launch_failures` are shown as toasts.
pub async fn run<H: WindowHost>(
    service: Arc<WorktreeService>,
    host: H,
    mut launch_failures: mpsc::UnboundedReceiver<LaunchFailure>,
    opts: AppOptions,
) -> anyhow::Result<Exit> {
    let terminal = tui::init_terminal()?;
    let mut guard = tui::TerminalGuard::new(terminal);

    let (mut refresher, mut refreshed) = Refresher::new(Arc::clone(&service));
    let (main_tx, mut main_rx) = mpsc::unbounded_channel::<MainLookup>();
    let mut app = App::new(service, host, opts);

    loop {
        app.toasts.expire(Instant::now());

        if app.refresh_requested {
            app.refresh_requested = false;
            let generation = refresher.request();
            log::debug!("refresh generation {generation} started");
        }

        if let Some(mode) = app.main_requested.take() {
            let service = Arc::clone(&app.service);
            let tx = main_tx.clone();
            tokio::spawn(async move {
                let main = service.find_main_branch_worktree().await;
                let _ = tx.send(MainLookup { mode, main });
            });
        }

        while let Ok(outcome) = refreshed.try_recv() {
            if let Some(worktrees) = refresher.accept(outcome) {
                app.apply_listing(worktrees);
            }
        }
        while let Ok(lookup) = main_rx.try_recv() {
            app.finish_main(lookup);
        }
        while let Ok(failure) = launch_failures.try_recv() {
            app.launch_failed(failure);
        }
        app.refreshing = refresher.is_pending();

        guard.terminal()?.draw(|f| draw(f, &mut app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
        {
            app.handle_key(key);
        }
    }

    drop(guard);
    Ok(app.exit())
}

fn draw<H: WindowHost>(f: &mut Frame<'_>, app: &mut App<H>) {
    let area = f.area();
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, root[0], app);
    draw_search(f, root[1], app);
    draw_table(f, root[2], app);
    draw_footer(f, root[3], app);

    if app.mode == Mode::Menu {
        draw_menu(f, app);
    }
}

fn draw_header<H>(f: &mut Frame<'_>, area: Rect, app: &App<H>) {
    let repo = match app.service.repository_root() {
        Some(root) => {
            let root = root.display().to_string();
            if app.opts.tilde_home {
                config::tilde_path(&root)
            } else {
                root
            }
        }
        None => "no repository".to_owned(),
    };

    let mut spans = vec![
        Span::styled(
            " wtnav ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(repo),
        Span::styled(
            format!("  {}/{} worktrees", app.table.len(), app.table.all().len()),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if app.refreshing {
        spans.push(Span::styled(
            "  refreshing…",
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_search<H>(f: &mut Frame<'_>, area: Rect, app: &App<H>) {
    let editing = app.mode == Mode::Searching;
    let border = if editing {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title("Search");
    let inner = block.inner(area);

    let line = if app.search.as_str().is_empty() && !editing {
        Line::from(Span::styled(
            "Search worktrees... (/)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(app.search.as_str())
    };
    f.render_widget(Paragraph::new(line).block(block), area);

    if editing {
        let x = inner.x + cursor_x_for_text(app.search.as_str(), app.search.cursor);
        f.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
    }
}

fn draw_table<H>(f: &mut Frame<'_>, area: Rect, app: &mut App<H>) {
    let sort = app.table.sort_state();
    let headers = Row::new(Column::ALL.iter().map(|&c| {
        let indicator = match sort {
            Some((col, SortOrder::Ascending)) if col == c => " ▲",
            Some((col, SortOrder::Descending)) if col == c => " ▼",
            _ => "",
        };
        Cell::from(format!("{}{indicator}", c.title()))
    }))
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = app.table.rows().iter().map(|wt| {
        let is_current = app.current_path.as_deref() == Some(wt.path.as_str());
        let marker = match (is_current, app.opts.icons) {
            (true, true) => "● ",
            (true, false) => "* ",
            (false, _) => "  ",
        };
        let row = Row::new(vec![
            Cell::from(format!("{marker}{}", Column::Branch.value(wt))),
            Cell::from(Column::Path.value(wt)),
            Cell::from(Column::Commit.value(wt)).style(Style::default().fg(Color::DarkGray)),
            Cell::from(Column::Status.value(wt)).style(status_style(wt)),
        ]);
        if is_current {
            row.style(Style::default().add_modifier(Modifier::BOLD))
        } else {
            row
        }
    });

    let widths = [
        Constraint::Percentage(35),
        Constraint::Percentage(30),
        Constraint::Length(10),
        Constraint::Min(10),
    ];

    let title = if app.loaded && app.table.is_empty() {
        if app.table.all().is_empty() {
            "Worktrees (none)"
        } else {
            "Worktrees (no matches)"
        }
    } else {
        "Worktrees"
    };

    let table = Table::new(rows, widths)
        .header(headers)
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::LightBlue)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn status_style(wt: &Worktree) -> Style {
    if wt.is_prunable {
        Style::default().fg(Color::Red)
    } else if wt.is_locked {
        Style::default().fg(Color::Yellow)
    } else if wt.is_main_worktree {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

fn draw_footer<H>(f: &mut Frame<'_>, area: Rect, app: &App<H>) {
    let (text, bg) = if let Some(toast) = &app.toasts.current {
        let bg = match toast.severity {
            Severity::Info => Color::Blue,
            Severity::Warning => Color::Red,
        };
        (format!("{}: {}", toast.title, toast.message), bg)
    } else {
        let keys = match app.mode {
            Mode::Normal => {
                "q quit • j/k move • / search • Enter switch • o new window • m menu • M main • y copy path • b/p sort • r refresh"
            }
            Mode::Searching => "type to filter • ↑/↓ move • Enter/Esc done",
            Mode::Menu => "j/k move • Enter select • Esc close",
        };
        (keys.to_owned(), Color::Blue)
    };

    let p = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::White).bg(bg),
    )))
    .style(Style::default().bg(bg));
    f.render_widget(p, area);
}

fn draw_menu<H>(f: &mut Frame<'_>, app: &mut App<H>) {
    let area = tui::centered_rect(40, 30, f.area());
    f.render_widget(Clear, area);

    let title = app
        .menu_target
        .as_ref()
        .map_or_else(|| "Worktree".to_owned(), |wt| wt.display_branch().to_owned());
    let items: Vec<ListItem> = MenuItem::ALL
        .iter()
        .map(|item| ListItem::new(Line::from(item.label())))
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    f.render_stateful_widget(list, area, &mut app.menu_state);
}

fn cursor_x_for_text(text: &str, cursor: usize) -> u16 {
    u16::try_from(text.chars().take(cursor).count()).unwrap_or(0)
}
