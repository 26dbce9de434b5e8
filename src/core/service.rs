#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::git::{self, Git};
use crate::core::worktree::{Worktree, parse_worktree_porcelain};

/// Answers worktree questions for one workspace.
///
/// Constructed explicitly by the caller and passed by reference to whatever
/// needs it; there is no process-wide instance.
#[derive(Debug, Clone)]
pub struct WorktreeService {
    workspace: PathBuf,
    git: Option<Git>,
    timeout: Duration,
}

impl WorktreeService {
    #[must_use]
    pub fn new(workspace: PathBuf, git_command: &str, timeout: Duration) -> Self {
        let git = Git::from_dir(&workspace)
            .ok()
            .map(|g| g.with_command(git_command));
        Self {
            workspace,
            git,
            timeout,
        }
    }

    #[must_use]
    pub fn from_git(workspace: PathBuf, git: Option<Git>, timeout: Duration) -> Self {
        Self {
            workspace,
            git,
            timeout,
        }
    }

    #[must_use]
    pub fn with_default_timeout(workspace: PathBuf) -> Self {
        Self::new(workspace, git::DEFAULT_GIT_COMMAND, git::DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    #[must_use]
    pub fn repository_root(&self) -> Option<&Path> {
        self.git.as_ref().map(Git::repo_root)
    }

    /// Lists the repository's worktrees. Any git failure is logged and yields
    /// an empty list so the caller can keep showing something.
    pub async fn list_worktrees(&self) -> Vec<Worktree> {
        let Some(git) = &self.git else {
            return Vec::new();
        };

        match git.list_worktrees_porcelain(self.timeout).await {
            Ok(out) => {
                let worktrees = parse_worktree_porcelain(out.lines());
                log::debug!("listed {} worktrees", worktrees.len());
                worktrees
            }
            Err(e) => {
                log::warn!("git worktree list failed: {e}");
                Vec::new()
            }
        }
    }

    pub async fn find_main_branch_worktree(&self) -> Option<Worktree> {
        let worktrees = self.list_worktrees().await;
        find_main_branch(&worktrees).cloned()
    }

    #[must_use]
    pub fn is_current_worktree(&self, worktree: &Worktree) -> bool {
        same_location(&self.workspace, Path::new(&worktree.path))
    }
}

/// First worktree, in listing order, checked out on a conventional main branch.
#[must_use]
pub fn find_main_branch(worktrees: &[Worktree]) -> Option<&Worktree> {
    worktrees.iter().find(|wt| wt.is_on_main_branch())
}

/// Compares two paths after resolving symlinks and relative segments.
#[must_use]
pub fn same_location(a: &Path, b: &Path) -> bool {
    canonical(a) == canonical(b)
}

#[must_use]
pub fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.components().collect())
}
