//! Replica: one side of the sync
//!
//! Bundles a tree with the bookkeeping the propagator needs across a run:
//! the deferred-rmdir queue and the ignore-before-cleanup map the directory
//! and remove operators populate and the cleanup pass consumes.

use std::collections::HashMap;

use crate::config::ReplicaKind;
use crate::tree::Tree;

/// One replica: its kind, root URI, reconciled tree, and the bookkeeping
/// the directory-removal passes need.
#[derive(Debug)]
pub struct Replica {
    /// Which replica this is; used to pick VIO dispatch and URI joining.
    pub kind: ReplicaKind,
    /// Root URI entries' paths are joined onto.
    pub uri: String,
    /// The reconciled tree for this replica.
    pub tree: Tree,
    /// Directories whose `rmdir` failed `ENOTEMPTY` on the first pass,
    /// queued for the cleanup pass. Holds `phash` keys into `tree`.
    pub deferred_rmdir: Vec<u64>,
    /// Paths to unlink before retrying `rmdir`, keyed by the containing
    /// directory's `phash`. Populated for children whose instruction is
    /// `IGNORE` (excluded from sync but still blocking an empty-dir check).
    pub ignored_cleanup: HashMap<u64, Vec<String>>,
}

impl Replica {
    /// A replica with an empty tree and no pending cleanup.
    #[must_use]
    pub fn new(kind: ReplicaKind, uri: impl Into<String>) -> Self {
        Self {
            kind,
            uri: uri.into(),
            tree: Tree::new(),
            deferred_rmdir: Vec::new(),
            ignored_cleanup: HashMap::new(),
        }
    }

    /// Join `path` onto this replica's root URI.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        crate::pathutil::join_uri(&self.uri, path)
    }

    /// Queue `phash` for the deferred-rmdir cleanup pass, sorted so the
    /// pass can later process entries in reverse path order.
    pub fn defer_rmdir(&mut self, phash: u64) {
        self.deferred_rmdir.push(phash);
    }

    /// Record that `child_path` must be unlinked before `dir_phash` can be
    /// rmdir'd.
    pub fn ignore_for_cleanup(&mut self, dir_phash: u64, child_path: impl Into<String>) {
        self.ignored_cleanup
            .entry(dir_phash)
            .or_default()
            .push(child_path.into());
    }

    /// Drain the deferred-rmdir queue in reverse path-sorted order, as the
    /// cleanup pass requires (children before parents when paths share a
    /// prefix).
    ///
    /// `phash` keys here are computed from the source (current-direction)
    /// tree's entries, not this replica's own tree — in a single sync run
    /// only one replica's tree is ever populated with reconciled entries, so
    /// paths are resolved against `source_tree` rather than `self.tree`.
    pub fn drain_deferred_rmdir_sorted(&mut self, source_tree: &Tree) -> Vec<u64> {
        let mut entries: Vec<(String, u64)> = self
            .deferred_rmdir
            .drain(..)
            .filter_map(|phash| source_tree.get(phash).map(|e| (e.path.clone(), phash)))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, phash)| phash).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{EntryType, FileStat, Instruction};

    #[test]
    fn join_handles_trailing_slash() {
        let r = Replica::new(ReplicaKind::Local, "/srv/data/");
        assert_eq!(r.join("a/b.txt"), "/srv/data/a/b.txt");
    }

    #[test]
    fn drain_deferred_rmdir_is_reverse_path_sorted() {
        let mut r = Replica::new(ReplicaKind::Local, "/srv/data");
        let mut source_tree = Tree::new();
        for path in ["a", "a/b", "a/b/c"] {
            let entry = FileStat::new(path, EntryType::Dir, Instruction::Remove);
            r.defer_rmdir(entry.phash);
            source_tree.insert(entry);
        }
        let order = r.drain_deferred_rmdir_sorted(&source_tree);
        let paths: Vec<_> = order
            .iter()
            .map(|h| source_tree.get(*h).unwrap().path.clone())
            .collect();
        assert_eq!(paths, vec!["a/b/c", "a/b", "a"]);
    }
}
