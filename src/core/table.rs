#![forbid(unsafe_code)]

use std::cmp::Reverse;

use crate::core::worktree::Worktree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Branch,
    Path,
    Commit,
    Status,
}

impl Column {
    pub const ALL: [Self; 4] = [Self::Branch, Self::Path, Self::Commit, Self::Status];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Branch => "BRANCH",
            Self::Path => "PATH",
            Self::Commit => "COMMIT",
            Self::Status => "STATUS",
        }
    }

    #[must_use]
    pub fn is_sortable(self) -> bool {
        matches!(self, Self::Branch | Self::Path)
    }

    #[must_use]
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    #[must_use]
    pub fn value(self, wt: &Worktree) -> String {
        match self {
            Self::Branch => wt.display_branch().to_owned(),
            Self::Path => wt.directory_name().to_owned(),
            Self::Commit => wt.short_hash(),
            Self::Status => wt.status_label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Filtered and sorted view over the latest worktree listing.
///
/// The filter is applied first; the sort (if any) then orders the filtered
/// rows. Ties keep their filtered order.
#[derive(Debug, Clone, Default)]
pub struct WorktreeTable {
    all: Vec<Worktree>,
    view: Vec<Worktree>,
    filter: String,
    sort: Option<(Column, SortOrder)>,
    revision: u64,
}

impl WorktreeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_worktrees(&mut self, worktrees: Vec<Worktree>) {
        self.all = worktrees;
        self.recompute();
    }

    pub fn set_filter(&mut self, text: &str) {
        text.trim().clone_into(&mut self.filter);
        self.recompute();
    }

    /// Cycles ascending, descending, unsorted on the same column. Another
    /// sortable column starts over at ascending; other columns are ignored.
    pub fn toggle_sort(&mut self, column: Column) {
        if !column.is_sortable() {
            return;
        }
        self.sort = match self.sort {
            Some((c, SortOrder::Ascending)) if c == column => {
                Some((column, SortOrder::Descending))
            }
            Some((c, SortOrder::Descending)) if c == column => None,
            _ => Some((column, SortOrder::Ascending)),
        };
        self.recompute();
    }

    /// Sets the sort directly; used to apply a configured default.
    pub fn set_sort(&mut self, sort: Option<(Column, SortOrder)>) {
        self.sort = sort.filter(|(c, _)| c.is_sortable());
        self.recompute();
    }

    #[must_use]
    pub fn row_at(&self, idx: usize) -> Option<&Worktree> {
        self.view.get(idx)
    }

    #[must_use]
    pub fn find_row_index(&self, path: &str) -> Option<usize> {
        self.view.iter().position(|wt| wt.path == path)
    }

    #[must_use]
    pub fn value_at(&self, idx: usize, column: Column) -> Option<String> {
        self.row_at(idx).map(|wt| column.value(wt))
    }

    #[must_use]
    pub fn rows(&self) -> &[Worktree] {
        &self.view
    }

    #[must_use]
    pub fn all(&self) -> &[Worktree] {
        &self.all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[must_use]
    pub fn sort_state(&self) -> Option<(Column, SortOrder)> {
        self.sort
    }

    /// Bumped every time the view is rebuilt.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn recompute(&mut self) {
        let needle = self.filter.to_lowercase();
        let mut rows: Vec<Worktree> = if needle.is_empty() {
            self.all.clone()
        } else {
            self.all
                .iter()
                .filter(|wt| matches_filter(wt, &needle))
                .cloned()
                .collect()
        };

        // Both arms are stable sorts, so equal keys keep their filtered order.
        match self.sort {
            Some((column, SortOrder::Ascending)) => {
                rows.sort_by_cached_key(|wt| column.value(wt).to_lowercase());
            }
            Some((column, SortOrder::Descending)) => {
                rows.sort_by_cached_key(|wt| Reverse(column.value(wt).to_lowercase()));
            }
            None => {}
        }

        self.view = rows;
        self.revision = self.revision.wrapping_add(1);
    }
}

fn matches_filter(wt: &Worktree, needle: &str) -> bool {
    wt.branch
        .as_deref()
        .is_some_and(|b| b.to_lowercase().contains(needle))
        || wt.path.to_lowercase().contains(needle)
        || wt.directory_name().to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wt(path: &str, branch: Option<&str>) -> Worktree {
        Worktree {
            path: path.to_owned(),
            commit_hash: "abcdef0123456789".to_owned(),
            branch: branch.map(str::to_owned),
            ..Worktree::default()
        }
    }

    fn sample() -> Vec<Worktree> {
        let mut main = wt("/src/repo", Some("main"));
        main.is_main_worktree = true;
        vec![
            main,
            wt("/src/wt/zeta", Some("Feature/Login")),
            wt("/src/wt/alpha", Some("bugfix/crash")),
            wt("/src/wt/mid", None),
        ]
    }

    fn paths(t: &WorktreeTable) -> Vec<&str> {
        t.rows().iter().map(|w| w.path.as_str()).collect()
    }

    #[test]
    fn filter_matches_branch_only_case_insensitively() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());

        t.set_filter("  LOGIN ");
        assert_eq!(t.filter(), "LOGIN");
        assert_eq!(paths(&t), vec!["/src/wt/zeta"]);

        t.set_filter("no-such-thing");
        assert!(t.is_empty());
        assert_eq!(t.row_at(0), None);

        t.set_filter("");
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn filter_matches_path_and_directory_name() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());

        t.set_filter("/src/wt");
        assert_eq!(paths(&t), vec!["/src/wt/zeta", "/src/wt/alpha", "/src/wt/mid"]);

        t.set_filter("ALPHA");
        assert_eq!(paths(&t), vec!["/src/wt/alpha"]);
    }

    #[test]
    fn sort_cycles_back_to_filtered_order() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());
        let original: Vec<String> = paths(&t).into_iter().map(str::to_owned).collect();

        t.toggle_sort(Column::Branch);
        assert_eq!(t.sort_state(), Some((Column::Branch, SortOrder::Ascending)));
        // "(unknown)" < "bugfix/crash" < "feature/login" < "main"
        assert_eq!(
            paths(&t),
            vec!["/src/wt/mid", "/src/wt/alpha", "/src/wt/zeta", "/src/repo"]
        );

        t.toggle_sort(Column::Branch);
        assert_eq!(t.sort_state(), Some((Column::Branch, SortOrder::Descending)));
        assert_eq!(
            paths(&t),
            vec!["/src/repo", "/src/wt/zeta", "/src/wt/alpha", "/src/wt/mid"]
        );

        t.toggle_sort(Column::Branch);
        assert_eq!(t.sort_state(), None);
        assert_eq!(paths(&t), original);
    }

    #[test]
    fn switching_columns_restarts_ascending() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());

        t.toggle_sort(Column::Branch);
        t.toggle_sort(Column::Branch);
        t.toggle_sort(Column::Path);
        assert_eq!(t.sort_state(), Some((Column::Path, SortOrder::Ascending)));
        assert_eq!(
            paths(&t),
            vec!["/src/wt/alpha", "/src/wt/mid", "/src/repo", "/src/wt/zeta"]
        );
    }

    #[test]
    fn unsortable_columns_are_ignored() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());
        let before = t.revision();

        t.toggle_sort(Column::Commit);
        t.toggle_sort(Column::Status);
        assert_eq!(t.sort_state(), None);
        assert_eq!(t.revision(), before);

        t.set_sort(Some((Column::Status, SortOrder::Ascending)));
        assert_eq!(t.sort_state(), None);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(vec![
            wt("/a/one", Some("Same")),
            wt("/b/two", Some("same")),
            wt("/c/three", Some("SAME")),
        ]);

        t.toggle_sort(Column::Branch);
        assert_eq!(paths(&t), vec!["/a/one", "/b/two", "/c/three"]);
        t.toggle_sort(Column::Branch);
        assert_eq!(paths(&t), vec!["/a/one", "/b/two", "/c/three"]);
    }

    #[test]
    fn sort_applies_to_filtered_subset() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());
        t.toggle_sort(Column::Path);
        t.set_filter("wt/");
        assert_eq!(paths(&t), vec!["/src/wt/alpha", "/src/wt/mid", "/src/wt/zeta"]);
        assert_eq!(t.find_row_index("/src/wt/zeta"), Some(2));
        assert_eq!(t.find_row_index("/src/repo"), None);
    }

    #[test]
    fn lookups_and_cell_values() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());
        assert_eq!(t.value_at(0, Column::Branch).as_deref(), Some("main"));
        assert_eq!(t.value_at(0, Column::Path).as_deref(), Some("repo"));
        assert_eq!(t.value_at(0, Column::Commit).as_deref(), Some("abcdef01"));
        assert_eq!(t.value_at(0, Column::Status).as_deref(), Some("main worktree"));
        assert_eq!(t.value_at(3, Column::Branch).as_deref(), Some("(unknown)"));
        assert_eq!(t.value_at(9, Column::Branch), None);
        assert_eq!(Column::from_index(1), Some(Column::Path));
        assert_eq!(Column::from_index(4), None);
    }

    #[test]
    fn new_listing_replaces_rows_and_bumps_revision() {
        let mut t = WorktreeTable::new();
        t.set_worktrees(sample());
        let rev = t.revision();
        t.set_worktrees(vec![wt("/other", Some("trunk"))]);
        assert!(t.revision() > rev);
        assert_eq!(paths(&t), vec!["/other"]);
        assert_eq!(t.all().len(), 1);
    }
}
