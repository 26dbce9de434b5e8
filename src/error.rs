#![forbid(unsafe_code)]

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WtnavError {
    #[error("not inside a git repository")]
    NotInGitRepo,

    #[error("git is required but was not found in PATH")]
    GitNotFound,

    #[error("git {args} failed (exit code {code}): {stderr}")]
    GitFailed {
        args: String,
        code: i32,
        stderr: String,
    },

    #[error("git {args} timed out after {timeout:?}")]
    Timeout { args: String, timeout: Duration },

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config key '{0}'")]
    InvalidConfigKey(String),

    #[error("invalid config value for '{key}': {msg}")]
    InvalidConfigValue { key: String, msg: String },

    #[error("worktree not found matching pattern: {0}")]
    WorktreeNotFound(String),

    #[error("multiple worktrees match pattern: {0}")]
    AmbiguousWorktree(String),

    #[error("no open command configured; set open.command to open new windows")]
    NoOpenCommand,

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
