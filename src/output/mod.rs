#![forbid(unsafe_code)]

pub mod table;

use crate::config;
use crate::core::worktree::Worktree;
use crate::output::table::Table;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListStyle {
    pub icons: bool,
    pub tilde_home: bool,
    pub verbose: bool,
}

/// Builds the `list` table. `is_current` marks the row of the active workspace.
pub fn worktree_table(
    worktrees: &[Worktree],
    style: ListStyle,
    is_current: impl Fn(&Worktree) -> bool,
) -> Table {
    let mut t = if style.verbose {
        Table::new(["BRANCH", "PATH", "COMMIT", "STATUS"])
    } else {
        Table::new(["BRANCH", "PATH", "STATUS"])
    };

    for wt in worktrees {
        let marker = match (style.icons, is_current(wt)) {
            (true, true) => "● ",
            (true, false) => "  ",
            (false, true) => "* ",
            (false, false) => "  ",
        };
        let branch = format!("{marker}{}", wt.display_branch());
        let path = if style.tilde_home {
            config::tilde_path(&wt.path)
        } else {
            wt.path.clone()
        };
        if style.verbose {
            t.row([branch, path, wt.short_hash(), wt.status_label()]);
        } else {
            t.row([branch, path, wt.status_label()]);
        }
    }
    t
}

/// Machine-readable counterpart of [`worktree_table`]: raw values, no markers.
pub fn worktree_csv(worktrees: &[Worktree], is_current: impl Fn(&Worktree) -> bool) -> Table {
    let mut t = Table::new(["branch", "path", "commit", "status", "current"]);
    for wt in worktrees {
        t.row([
            wt.display_branch().to_owned(),
            wt.path.clone(),
            wt.commit_hash.clone(),
            wt.status_label(),
            is_current(wt).to_string(),
        ]);
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(t: &Table) -> String {
        let mut buf = Vec::new();
        t.write_plain(&mut buf).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn marks_current_row_and_shows_status() {
        let list = vec![
            Worktree {
                path: "/srv/repo".to_owned(),
                commit_hash: "0123456789abcdef".to_owned(),
                branch: Some("main".to_owned()),
                is_main_worktree: true,
                ..Worktree::default()
            },
            Worktree {
                path: "/srv/repo-wip".to_owned(),
                commit_hash: "fedcba9876543210".to_owned(),
                is_detached: true,
                is_locked: true,
                lock_reason: Some("wip".to_owned()),
                ..Worktree::default()
            },
        ];

        let style = ListStyle {
            icons: false,
            tilde_home: false,
            verbose: true,
        };
        let out = render(&worktree_table(&list, style, |wt| wt.path == "/srv/repo-wip"));
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].starts_with("BRANCH"));
        assert!(lines[1].starts_with("  main"));
        assert!(lines[1].contains("01234567"));
        assert!(lines[1].ends_with("main worktree"));
        assert!(lines[2].starts_with("* (detached HEAD)"));
        assert!(lines[2].ends_with("locked: wip"));
    }

    #[test]
    fn csv_rows_carry_full_hash_and_current_flag() {
        let list = vec![Worktree {
            path: "/srv/repo".to_owned(),
            commit_hash: "0123456789abcdef".to_owned(),
            branch: Some("main".to_owned()),
            is_main_worktree: true,
            ..Worktree::default()
        }];
        let mut buf = Vec::new();
        worktree_csv(&list, |_| true)
            .write_csv(&mut buf)
            .expect("write");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "branch,path,commit,status,current\nmain,/srv/repo,0123456789abcdef,main worktree,true\n"
        );
    }
}
