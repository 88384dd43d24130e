//! The reconciled-tree data model
//!
//! A [`Tree`] holds one replica's entries keyed by `phash`
//! ([`crate::hash::jhash64`] of the normalised path). There is no
//! parent-pointer field on [`FileStat`]: ancestor lookups re-derive the
//! parent path with [`crate::pathutil::dirname`] and hash it again. This
//! keeps the tree acyclic and the entries independently owned.

use std::collections::HashMap;

use crate::hash::jhash64;
use crate::pathutil::dirname;

/// What kind of filesystem object an entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link.
    Slink,
}

/// The reconciler's verdict for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// No action needed.
    None,
    /// Does not exist on the destination; create it.
    New,
    /// Exists on both sides and needs content/metadata reconciliation.
    Sync,
    /// Exists only on the destination; delete it there.
    Remove,
    /// Moved; `dest_path` names the new location.
    Rename,
    /// Both sides changed since the last sync; back up then overwrite.
    Conflict,
    /// Excluded from sync entirely (not walked for transfer, only for
    /// deferred-cleanup bookkeeping).
    Ignore,
    /// Set by the propagator after a successful push or directory sync.
    Updated,
    /// Set by the propagator after a successful removal.
    Deleted,
    /// Set by the propagator after a failed operation; also propagated to
    /// ancestor directories.
    Error,
}

/// One path in one replica's tree.
#[derive(Debug, Clone)]
pub struct FileStat {
    /// Normalised, slash-separated path relative to the replica root.
    pub path: String,
    /// Destination path for a `RENAME` instruction.
    pub dest_path: Option<String>,
    /// `jhash64` of `path`'s bytes; the tree key and progress key.
    pub phash: u64,
    /// File, directory, or symlink.
    pub entry_type: EntryType,
    /// The reconciler's (or propagator's updated) verdict.
    pub instruction: Instruction,
    /// Size in bytes, as last observed by the reconciler.
    pub size: u64,
    /// Modification time, unix seconds.
    pub modtime: i64,
    /// POSIX permission bits.
    pub mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Inode number, informational.
    pub inode: u64,
    /// Opaque content/identity token assigned by the remote replica.
    pub md5: String,
    /// First error recorded against this entry, if any. First-write wins.
    pub error_string: Option<String>,
}

impl FileStat {
    /// Build a new entry, deriving `phash` from `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, entry_type: EntryType, instruction: Instruction) -> Self {
        let path = path.into();
        let phash = jhash64(path.as_bytes());
        Self {
            path,
            dest_path: None,
            phash,
            entry_type,
            instruction,
            size: 0,
            modtime: 0,
            mode: 0,
            uid: 0,
            gid: 0,
            inode: 0,
            md5: String::new(),
            error_string: None,
        }
    }

    /// Mark this entry `ERROR`, keeping the first error message written.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.instruction = Instruction::Error;
        if self.error_string.is_none() {
            self.error_string = Some(message.into());
        }
    }
}

/// One replica's set of entries, keyed by `phash`.
///
/// Iteration order is insertion order, which callers are expected to
/// populate in tree-walk (path) order; the propagator relies on that order
/// for the file and directory passes.
#[derive(Debug, Default)]
pub struct Tree {
    order: Vec<u64>,
    entries: HashMap<u64, FileStat>,
}

impl Tree {
    /// An empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// Insert or replace an entry, keyed by its `phash`.
    pub fn insert(&mut self, entry: FileStat) {
        let phash = entry.phash;
        if self.entries.insert(phash, entry).is_none() {
            self.order.push(phash);
        }
    }

    /// Look up an entry by `phash`.
    #[must_use]
    pub fn get(&self, phash: u64) -> Option<&FileStat> {
        self.entries.get(&phash)
    }

    /// Look up an entry by `phash`, mutably.
    pub fn get_mut(&mut self, phash: u64) -> Option<&mut FileStat> {
        self.entries.get_mut(&phash)
    }

    /// Look up an entry by path, computing its `phash`.
    #[must_use]
    pub fn get_by_path(&self, path: &str) -> Option<&FileStat> {
        self.get(jhash64(path.as_bytes()))
    }

    /// Iterate entries in tree-walk (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &FileStat> {
        self.order.iter().filter_map(move |h| self.entries.get(h))
    }

    /// Iterate the `phash` keys of entries whose type matches `entry_type`,
    /// in tree-walk order. Used to build the file pass and directory pass.
    pub fn phashes_of_type(&self, entry_type: EntryType) -> impl Iterator<Item = u64> + '_ {
        self.iter()
            .filter(move |e| e.entry_type == entry_type)
            .map(|e| e.phash)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walk ancestor directories of `path`, marking each `ERROR` with
    /// `reason` (first-write-wins) until the root is reached or an
    /// ancestor is not present in this tree.
    ///
    /// Mirrors the invariant that every entry with `instruction == ERROR`
    /// has every ancestor directory entry also `ERROR`.
    pub fn mark_ancestors_error(&mut self, path: &str, reason: &str) {
        let mut current = path;
        while let Some(parent) = dirname(current) {
            let parent_hash = jhash64(parent.as_bytes());
            match self.entries.get_mut(&parent_hash) {
                Some(entry) => {
                    entry.mark_error(reason);
                    current = parent;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FileStat {
        FileStat::new(path, EntryType::File, Instruction::New)
    }

    fn dir(path: &str) -> FileStat {
        FileStat::new(path, EntryType::Dir, Instruction::New)
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let mut tree = Tree::new();
        let entry = file("a/b.txt");
        let phash = entry.phash;
        tree.insert(entry);
        assert_eq!(tree.get(phash).unwrap().path, "a/b.txt");
    }

    #[test]
    fn get_by_path_matches_hash_lookup() {
        let mut tree = Tree::new();
        tree.insert(file("a/b.txt"));
        assert!(tree.get_by_path("a/b.txt").is_some());
        assert!(tree.get_by_path("a/missing.txt").is_none());
    }

    #[test]
    fn mark_ancestors_error_walks_to_root() {
        let mut tree = Tree::new();
        tree.insert(dir("a"));
        tree.insert(dir("a/b"));
        tree.insert(file("a/b/c.txt"));

        tree.mark_ancestors_error("a/b/c.txt", "Error within the directory");

        assert_eq!(
            tree.get_by_path("a/b").unwrap().instruction,
            Instruction::Error
        );
        assert_eq!(
            tree.get_by_path("a").unwrap().instruction,
            Instruction::Error
        );
    }

    #[test]
    fn mark_ancestors_error_first_write_wins() {
        let mut tree = Tree::new();
        tree.insert(dir("a"));
        tree.insert(file("a/b.txt"));
        tree.insert(file("a/c.txt"));

        tree.mark_ancestors_error("a/b.txt", "first");
        tree.mark_ancestors_error("a/c.txt", "second");

        assert_eq!(
            tree.get_by_path("a").unwrap().error_string.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn mark_ancestors_error_stops_if_ancestor_absent() {
        let mut tree = Tree::new();
        tree.insert(file("a/b/c.txt"));
        tree.mark_ancestors_error("a/b/c.txt", "Error within the directory");
        assert!(tree.get_by_path("a/b").is_none());
    }

    #[test]
    fn iter_preserves_insertion_order() {
        let mut tree = Tree::new();
        tree.insert(file("z.txt"));
        tree.insert(file("a.txt"));
        let paths: Vec<_> = tree.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["z.txt", "a.txt"]);
    }
}
