#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use crate::error::WtnavError;

pub const DEFAULT_GIT_COMMAND: &str = "git";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle on one repository: where it lives and which `git` to run against it.
#[derive(Debug, Clone)]
pub struct Git {
    repo_root: PathBuf,
    command: String,
}

impl Git {
    pub fn from_dir(dir: &Path) -> Result<Self, WtnavError> {
        let repo_root = find_repo_root(dir).ok_or(WtnavError::NotInGitRepo)?;
        Ok(Self::new(repo_root))
    }

    #[must_use]
    pub fn new(repo_root: PathBuf) -> Self {
        Self {
            repo_root,
            command: DEFAULT_GIT_COMMAND.to_owned(),
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        if !command.trim().is_empty() {
            self.command = command;
        }
        self
    }

    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub async fn list_worktrees_porcelain(&self, timeout: Duration) -> Result<String, WtnavError> {
        self.run(&["worktree", "list", "--porcelain"], timeout)
            .await
    }

    /// Runs git in the repository root and returns stdout. The child is killed
    /// when `timeout` elapses.
    pub async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, WtnavError> {
        let out = self.run_raw(args, timeout).await?;
        if out.status.success() {
            Ok(String::from_utf8_lossy(&out.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&out.stderr);
            Err(WtnavError::GitFailed {
                args: args.join(" "),
                code: out.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_owned(),
            })
        }
    }

    pub async fn run_raw(&self, args: &[&str], timeout: Duration) -> Result<Output, WtnavError> {
        log::debug!(
            "$ {} {} [{}]",
            self.command,
            args.join(" "),
            self.repo_root.display()
        );

        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let Ok(res) = tokio::time::timeout(timeout, cmd.output()).await else {
            return Err(WtnavError::Timeout {
                args: args.join(" "),
                timeout,
            });
        };

        res.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WtnavError::GitNotFound,
            _ => WtnavError::Other(format!("failed to run {}: {e}", self.command)),
        })
    }
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut cur = Some(start);
    while let Some(dir) = cur {
        let candidate = dir.join(".git");
        if candidate.is_dir() || candidate.is_file() {
            return Some(dir.to_path_buf());
        }
        cur = dir.parent();
    }
    None
}

/// Stand-in `git` executables for exercising failure paths.
#[cfg(all(test, unix))]
pub(crate) mod testing {
    use std::os::unix::fs::PermissionsExt as _;
    use std::path::Path;

    /// Writes a `/bin/sh` script running `body` into `dir` and returns its
    /// path, for use with [`super::Git::with_command`].
    pub(crate) fn fake_git(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-git.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake git");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake git");
        path.to_string_lossy().into_owned()
    }
}
