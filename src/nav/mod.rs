#![forbid(unsafe_code)]

pub mod editor;

use std::path::{Path, PathBuf};

use crate::core::service::WorktreeService;
use crate::core::worktree::Worktree;
use crate::error::WtnavError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReplaceCurrent,
    NewWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// A window was launched for the path.
    Launched,
    /// Nothing can open the path here; the caller should hand it to the shell.
    HandOff(PathBuf),
}

/// Whatever owns the windows worktrees are opened in.
///
/// Calls are made from the UI loop and must not wait for a window to close.
pub trait WindowHost {
    /// Returns the window path already showing `path`, if any.
    fn find_open(&self, path: &Path) -> Option<PathBuf>;
    fn focus(&mut self, path: &Path) -> Result<(), WtnavError>;
    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<Opened, WtnavError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

/// Notifier for non-interactive runs.
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&mut self, n: Notification) {
        match n.severity {
            Severity::Info => eprintln!("{}: {}", n.title, n.message),
            Severity::Warning => eprintln!("warning: {}: {}", n.title, n.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    AlreadyHere,
    FocusedExisting(PathBuf),
    Opened(Opened),
    NoMainWorktree,
}

/// Switches to `worktree`: nothing to do if it is the current one, focus its
/// window if one is already open, otherwise open it with `mode`.
pub fn switch_to_worktree(
    service: &WorktreeService,
    host: &mut dyn WindowHost,
    notifier: &mut dyn Notifier,
    worktree: &Worktree,
    mode: OpenMode,
) -> Result<SwitchOutcome, WtnavError> {
    if service.is_current_worktree(worktree) {
        notifier.notify(Notification::info(
            "Already here",
            format!("You are already in {}", worktree.display_branch()),
        ));
        return Ok(SwitchOutcome::AlreadyHere);
    }
    open_or_focus(host, worktree, mode)
}

/// Second half of "switch to main", run once the lookup has finished.
pub fn finish_switch_to_main(
    service: &WorktreeService,
    host: &mut dyn WindowHost,
    notifier: &mut dyn Notifier,
    main: Option<&Worktree>,
    mode: OpenMode,
) -> Result<SwitchOutcome, WtnavError> {
    let Some(main) = main else {
        notifier.notify(Notification::warning(
            "No main worktree found",
            "Could not find a worktree with main, master, or trunk checked out.",
        ));
        return Ok(SwitchOutcome::NoMainWorktree);
    };

    if service.is_current_worktree(main) {
        let branch = main.display_branch();
        notifier.notify(Notification::info(
            format!("Already on {branch}"),
            format!("This worktree already has {branch} checked out."),
        ));
        return Ok(SwitchOutcome::AlreadyHere);
    }
    open_or_focus(host, main, mode)
}

pub async fn switch_to_main(
    service: &WorktreeService,
    host: &mut dyn WindowHost,
    notifier: &mut dyn Notifier,
    mode: OpenMode,
) -> Result<SwitchOutcome, WtnavError> {
    let main = service.find_main_branch_worktree().await;
    finish_switch_to_main(service, host, notifier, main.as_ref(), mode)
}

fn open_or_focus(
    host: &mut dyn WindowHost,
    worktree: &Worktree,
    mode: OpenMode,
) -> Result<SwitchOutcome, WtnavError> {
    let target = Path::new(&worktree.path);
    if let Some(existing) = host.find_open(target) {
        log::debug!("{} is already open, focusing", existing.display());
        host.focus(&existing)?;
        return Ok(SwitchOutcome::FocusedExisting(existing));
    }
    log::debug!("opening {} ({mode:?})", target.display());
    Ok(SwitchOutcome::Opened(host.open(target, mode)?))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Default)]
    pub struct FakeHost {
        pub open_windows: Vec<PathBuf>,
        pub focused: Vec<PathBuf>,
        pub opened: Vec<(PathBuf, OpenMode)>,
    }

    impl WindowHost for FakeHost {
        fn find_open(&self, path: &Path) -> Option<PathBuf> {
            self.open_windows.iter().find(|p| p.as_path() == path).cloned()
        }

        fn focus(&mut self, path: &Path) -> Result<(), WtnavError> {
            self.focused.push(path.to_path_buf());
            Ok(())
        }

        fn open(&mut self, path: &Path, mode: OpenMode) -> Result<Opened, WtnavError> {
            self.opened.push((path.to_path_buf(), mode));
            Ok(Opened::Launched)
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub seen: Vec<Notification>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, notification: Notification) {
            self.seen.push(notification);
        }
    }
}
