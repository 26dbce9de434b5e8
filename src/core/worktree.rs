#![forbid(unsafe_code)]

use serde::Serialize;

/// Branch names treated as the repository's primary line of development.
pub const MAIN_BRANCH_NAMES: [&str; 3] = ["main", "master", "trunk"];

const SHORT_HASH_LEN: usize = 8;

/// One entry of `git worktree list --porcelain`.
///
/// Values are never mutated once parsed; a refresh replaces the whole list.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Worktree {
    pub path: String,
    pub commit_hash: String,
    pub branch: Option<String>,
    /// Set for the first entry of a listing. Git always reports the main
    /// worktree first; nothing in the entry itself says so.
    pub is_main_worktree: bool,
    pub is_bare: bool,
    pub is_detached: bool,
    pub is_locked: bool,
    pub lock_reason: Option<String>,
    pub is_prunable: bool,
}

impl Worktree {
    #[must_use]
    pub fn short_hash(&self) -> String {
        self.commit_hash.chars().take(SHORT_HASH_LEN).collect()
    }

    #[must_use]
    pub fn display_branch(&self) -> &str {
        if self.is_bare {
            "(bare)"
        } else if self.is_detached {
            "(detached HEAD)"
        } else if let Some(branch) = &self.branch {
            branch
        } else {
            "(unknown)"
        }
    }

    #[must_use]
    pub fn is_on_main_branch(&self) -> bool {
        self.branch
            .as_deref()
            .is_some_and(|b| MAIN_BRANCH_NAMES.contains(&b))
    }

    /// Last `/`-separated segment of the path, or the whole path if it has none.
    #[must_use]
    pub fn directory_name(&self) -> &str {
        self.path
            .rsplit_once('/')
            .map_or(self.path.as_str(), |(_, name)| name)
    }

    #[must_use]
    pub fn status_label(&self) -> String {
        let mut parts = Vec::new();
        if self.is_main_worktree {
            parts.push("main worktree".to_owned());
        }
        if self.is_locked {
            match &self.lock_reason {
                Some(reason) => parts.push(format!("locked: {reason}")),
                None => parts.push("locked".to_owned()),
            }
        }
        if self.is_prunable {
            parts.push("prunable".to_owned());
        }
        parts.join(", ")
    }
}

/// Fields collected for the record currently being parsed.
#[derive(Debug, Default)]
struct PendingEntry {
    path: Option<String>,
    commit_hash: String,
    branch: Option<String>,
    is_main_worktree: bool,
    is_bare: bool,
    is_detached: bool,
    is_locked: bool,
    lock_reason: Option<String>,
    is_prunable: bool,
}

impl PendingEntry {
    fn finish(self) -> Option<Worktree> {
        Some(Worktree {
            path: self.path?,
            commit_hash: self.commit_hash,
            branch: self.branch,
            is_main_worktree: self.is_main_worktree,
            is_bare: self.is_bare,
            is_detached: self.is_detached,
            is_locked: self.is_locked,
            lock_reason: self.lock_reason,
            is_prunable: self.is_prunable,
        })
    }
}

/// Parses porcelain listing output into records, in listing order.
///
/// Never fails: unknown lines are skipped and missing attributes keep their
/// defaults. Entries without a `worktree` line are dropped.
pub fn parse_worktree_porcelain<'a, I>(lines: I) -> Vec<Worktree>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut entries = Vec::new();
    let mut cur = PendingEntry::default();
    let mut seen_first = false;

    for line in lines {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim().is_empty() {
            entries.extend(std::mem::take(&mut cur).finish());
            continue;
        }

        if let Some(path) = line.strip_prefix("worktree ") {
            // A new header closes the previous entry even without a blank line.
            entries.extend(std::mem::take(&mut cur).finish());
            cur.path = Some(path.to_owned());
            if !seen_first {
                cur.is_main_worktree = true;
                seen_first = true;
            }
        } else if let Some(hash) = line.strip_prefix("HEAD ") {
            hash.clone_into(&mut cur.commit_hash);
        } else if let Some(branch) = line.strip_prefix("branch ") {
            let name = branch.strip_prefix("refs/heads/").unwrap_or(branch);
            cur.branch = Some(name.to_owned());
        } else if line == "bare" {
            cur.is_bare = true;
        } else if line == "detached" {
            cur.is_detached = true;
        } else if line == "locked" {
            cur.is_locked = true;
        } else if let Some(reason) = line.strip_prefix("locked ") {
            cur.is_locked = true;
            cur.lock_reason = Some(reason.to_owned());
        } else if line == "prunable" || line.starts_with("prunable ") {
            cur.is_prunable = true;
        }
    }
    entries.extend(cur.finish());

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_A: &str = "1111111111111111111111111111111111111111";
    const HASH_B: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn parses_worktree_list_porcelain() {
        let out = format!(
            "worktree /repo
HEAD {HASH_A}
branch refs/heads/main

worktree /repo/.worktrees/feature
HEAD {HASH_B}
branch refs/heads/feature/test

worktree /repo/.worktrees/detached
HEAD 3333333333333333333333333333333333333333
detached
"
        );

        let entries = parse_worktree_porcelain(out.lines());
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            Worktree {
                path: "/repo".to_owned(),
                commit_hash: HASH_A.to_owned(),
                branch: Some("main".to_owned()),
                is_main_worktree: true,
                ..Worktree::default()
            }
        );
        assert_eq!(entries[1].branch.as_deref(), Some("feature/test"));
        assert!(!entries[1].is_main_worktree);
        assert!(entries[2].is_detached);
        assert_eq!(entries[2].branch, None);
        assert!(!entries[2].is_main_worktree);
    }

    #[test]
    fn parses_locked_and_reasonless_flags() {
        let lines = [
            "worktree /repo",
            "HEAD abc123",
            "branch refs/heads/main",
            "",
            "worktree /repo-feat",
            "HEAD def456",
            "branch refs/heads/feature/y",
            "locked wip",
            "",
            "worktree /repo-old",
            "HEAD 0123456789",
            "detached",
            "locked",
            "prunable gitdir file points to non-existent location",
            "",
        ];

        let entries = parse_worktree_porcelain(lines);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].path, "/repo");
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert!(entries[0].is_main_worktree);

        assert_eq!(entries[1].path, "/repo-feat");
        assert_eq!(entries[1].branch.as_deref(), Some("feature/y"));
        assert!(entries[1].is_locked);
        assert_eq!(entries[1].lock_reason.as_deref(), Some("wip"));
        assert!(!entries[1].is_main_worktree);

        assert!(entries[2].is_locked);
        assert_eq!(entries[2].lock_reason, None);
        assert!(entries[2].is_prunable);
    }

    #[test]
    fn bare_block_has_empty_hash_and_no_branch() {
        let entries = parse_worktree_porcelain(["worktree /srv/repo.git", "bare"]);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_bare);
        assert_eq!(entries[0].commit_hash, "");
        assert_eq!(entries[0].branch, None);
        assert_eq!(entries[0].display_branch(), "(bare)");
    }

    #[test]
    fn header_closes_open_entry_without_blank_line() {
        let entries = parse_worktree_porcelain([
            "worktree /a",
            "HEAD aaaa",
            "locked",
            "worktree /b",
            "HEAD bbbb",
        ]);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_locked);
        assert!(!entries[1].is_locked);
        assert_eq!(entries[1].commit_hash, "bbbb");
        assert!(!entries[1].is_main_worktree);
    }

    #[test]
    fn skips_unknown_lines_and_headerless_blocks() {
        let entries = parse_worktree_porcelain([
            "HEAD ffff",
            "branch refs/heads/orphan",
            "",
            "something-new value",
            "worktree /only",
            "future-attribute",
            "",
            "",
        ]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/only");
        assert_eq!(entries[0].branch, None);
        assert_eq!(entries[0].commit_hash, "");
        assert!(entries[0].is_main_worktree);
    }

    #[test]
    fn strips_carriage_returns() {
        let out = "worktree C:/src/repo\r\nHEAD abcd\r\nbranch refs/heads/trunk\r\n\r\n";
        let entries = parse_worktree_porcelain(out.split('\n'));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "C:/src/repo");
        assert_eq!(entries[0].branch.as_deref(), Some("trunk"));
    }

    #[test]
    fn derived_display_values() {
        let wt = Worktree {
            path: "/home/me/src/repo-feature".to_owned(),
            commit_hash: HASH_B.to_owned(),
            branch: Some("master".to_owned()),
            is_main_worktree: true,
            is_locked: true,
            lock_reason: Some("on usb drive".to_owned()),
            is_prunable: true,
            ..Worktree::default()
        };
        assert_eq!(wt.short_hash(), "22222222");
        assert_eq!(wt.directory_name(), "repo-feature");
        assert!(wt.is_on_main_branch());
        assert_eq!(
            wt.status_label(),
            "main worktree, locked: on usb drive, prunable"
        );

        let detached = Worktree {
            path: "relative".to_owned(),
            commit_hash: "abc".to_owned(),
            is_detached: true,
            branch: Some("main".to_owned()),
            ..Worktree::default()
        };
        assert_eq!(detached.display_branch(), "(detached HEAD)");
        assert_eq!(detached.directory_name(), "relative");
        assert_eq!(detached.short_hash(), "abc");
        assert_eq!(detached.status_label(), "");

        let unknown = Worktree::default();
        assert_eq!(unknown.display_branch(), "(unknown)");
        assert!(!unknown.is_on_main_branch());
    }
}
