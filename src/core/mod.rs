#![forbid(unsafe_code)]

pub mod git;
pub mod refresh;
pub mod service;
pub mod table;
pub mod worktree;
