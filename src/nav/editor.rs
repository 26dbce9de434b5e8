#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::sync::mpsc;

use crate::config::OpenConfig;
use crate::core::service::canonical;
use crate::error::WtnavError;
use crate::nav::{OpenMode, Opened, WindowHost};

/// An editor command that started but did not exit cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Opens worktrees by running an editor command such as `code` or `idea`.
///
/// The command is spawned and left running; its exit status arrives later on
/// the channel given to [`EditorHost::report_failures_to`]. Windows opened
/// through this host are remembered so a second request focuses them instead
/// of opening a duplicate.
#[derive(Debug, Clone)]
pub struct EditorHost {
    command: String,
    reuse_window_args: Vec<String>,
    new_window_args: Vec<String>,
    opened: BTreeSet<PathBuf>,
    failures: Option<mpsc::UnboundedSender<LaunchFailure>>,
}

impl EditorHost {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self::from_config(&OpenConfig {
            command: command.into(),
            ..OpenConfig::default()
        })
    }

    #[must_use]
    pub fn from_config(cfg: &OpenConfig) -> Self {
        Self {
            command: cfg.command.trim().to_owned(),
            reuse_window_args: cfg.reuse_window_args.clone(),
            new_window_args: cfg.new_window_args.clone(),
            opened: BTreeSet::new(),
            failures: None,
        }
    }

    #[must_use]
    pub fn report_failures_to(mut self, tx: mpsc::UnboundedSender<LaunchFailure>) -> Self {
        self.failures = Some(tx);
        self
    }

    #[must_use]
    pub fn has_command(&self) -> bool {
        !self.command.is_empty()
    }

    /// Starts the editor and returns without waiting for it. Must be called
    /// from within a tokio runtime.
    fn launch(&self, args: &[String], path: &Path) -> Result<(), WtnavError> {
        log::debug!("$ {} {} {}", self.command, args.join(" "), path.display());
        let mut child = tokio::process::Command::new(&self.command)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    WtnavError::Other(format!("{} was not found in PATH", self.command))
                }
                _ => WtnavError::Other(format!("failed to run {}: {e}", self.command)),
            })?;

        let program = self.command.clone();
        let path = path.to_path_buf();
        let failures = self.failures.clone();
        tokio::spawn(async move {
            let message = match child.wait().await {
                Ok(status) if status.success() => return,
                Ok(status) => format!("{program} exited with code {}", status.code().unwrap_or(1)),
                Err(e) => format!("failed to wait for {program}: {e}"),
            };
            log::warn!("opening {} failed: {message}", path.display());
            if let Some(tx) = failures {
                let _ = tx.send(LaunchFailure { path, message });
            }
        });
        Ok(())
    }
}

impl WindowHost for EditorHost {
    fn find_open(&self, path: &Path) -> Option<PathBuf> {
        let target = canonical(path);
        self.opened.contains(&target).then_some(target)
    }

    fn focus(&mut self, path: &Path) -> Result<(), WtnavError> {
        if !self.has_command() {
            return Ok(());
        }
        // Editors raise the existing window when asked to reuse it.
        self.launch(&self.reuse_window_args, path)
    }

    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<Opened, WtnavError> {
        match mode {
            OpenMode::ReplaceCurrent if !self.has_command() => {
                Ok(Opened::HandOff(path.to_path_buf()))
            }
            OpenMode::ReplaceCurrent => {
                self.launch(&self.reuse_window_args, path)?;
                Ok(Opened::Launched)
            }
            OpenMode::NewWindow if !self.has_command() => Err(WtnavError::NoOpenCommand),
            OpenMode::NewWindow => {
                self.launch(&self.new_window_args, path)?;
                self.opened.insert(canonical(path));
                Ok(Opened::Launched)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A host whose editor is `sh -c <body>`, with the worktree path as `$1`.
    #[cfg(unix)]
    fn shell_host(body: &str) -> EditorHost {
        let args = vec!["-c".to_owned(), body.to_owned(), "editor".to_owned()];
        EditorHost::from_config(&OpenConfig {
            command: "sh".to_owned(),
            reuse_window_args: args.clone(),
            new_window_args: args,
        })
    }

    #[test]
    fn without_command_replace_hands_path_back() {
        let mut host = EditorHost::new("");
        let out = host
            .open(Path::new("/repo/feature"), OpenMode::ReplaceCurrent)
            .expect("open");
        assert_eq!(out, Opened::HandOff(PathBuf::from("/repo/feature")));
    }

    #[test]
    fn without_command_new_window_is_an_error() {
        let mut host = EditorHost::new("   ");
        let err = host
            .open(Path::new("/repo/feature"), OpenMode::NewWindow)
            .expect_err("should fail");
        assert!(matches!(err, WtnavError::NoOpenCommand));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn new_windows_are_remembered() {
        let td = tempfile::tempdir().expect("tempdir");
        let mut host = EditorHost::new("true");

        assert!(host.find_open(td.path()).is_none());
        let out = host.open(td.path(), OpenMode::NewWindow).expect("open");
        assert_eq!(out, Opened::Launched);
        assert_eq!(host.find_open(td.path()), Some(canonical(td.path())));
        host.focus(td.path()).expect("focus");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn open_returns_while_the_editor_is_still_running() {
        let td = tempfile::tempdir().expect("tempdir");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = shell_host("sleep 3").report_failures_to(tx);

        let started = std::time::Instant::now();
        let out = host.open(td.path(), OpenMode::NewWindow).expect("open");
        assert_eq!(out, Opened::Launched);
        assert!(
            started.elapsed() < std::time::Duration::from_secs(1),
            "open blocked for {:?}",
            started.elapsed()
        );
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_reported_on_the_channel() {
        let td = tempfile::tempdir().expect("tempdir");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = shell_host("test -d \"$1\" && exit 4").report_failures_to(tx);

        let out = host.open(td.path(), OpenMode::ReplaceCurrent).expect("open");
        assert_eq!(out, Opened::Launched);

        let failure = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("failure in time")
            .expect("failure");
        assert_eq!(failure.path, td.path());
        assert!(failure.message.ends_with("exited with code 4"), "{}", failure.message);
    }

    #[tokio::test]
    async fn missing_command_fails_immediately() {
        let mut host = EditorHost::new("wtnav-no-such-editor");
        let err = host
            .open(Path::new("/tmp"), OpenMode::NewWindow)
            .expect_err("should fail");
        assert!(err.to_string().contains("was not found in PATH"));
        assert!(host.find_open(Path::new("/tmp")).is_none());
    }
}
