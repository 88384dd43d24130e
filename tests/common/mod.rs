//! Shared fixture helpers for the integration tests.
//!
//! Grounded on the teacher's `tests/common/` support module pattern: each
//! test builds two real temp directories standing in for the local and
//! remote replica roots, backed by the reference [`propagator::drivers::LocalFsDriver`]
//! on both sides.

use std::fs;
use std::path::Path;

use propagator::{Direction, EntryType, FileStat, Instruction, PropagateContext, Replica, ReplicaKind};
use tempfile::TempDir;

/// Two temp directories standing in for the local and remote replica roots.
pub struct Roots {
    pub local: TempDir,
    pub remote: TempDir,
}

pub fn roots() -> Roots {
    Roots {
        local: TempDir::new().expect("create local temp root"),
        remote: TempDir::new().expect("create remote temp root"),
    }
}

/// Write `content` to `root`/`rel`, creating parent directories as needed.
pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, content).expect("write fixture file");
}

/// Build a `FileStat` for `rel`, reading its real size/modtime off disk
/// under `root` (the entry must already exist there).
pub fn file_entry(root: &Path, rel: &str, instruction: Instruction) -> FileStat {
    let meta = fs::metadata(root.join(rel)).expect("stat fixture file");
    let mut st = FileStat::new(rel, EntryType::File, instruction);
    st.size = meta.len();
    let modtime = filetime::FileTime::from_last_modification_time(&meta);
    st.modtime = modtime.unix_seconds();
    st
}

/// Build a `FileStat` for a directory entry, no backing file required.
pub fn dir_entry(rel: &str, instruction: Instruction) -> FileStat {
    FileStat::new(rel, EntryType::Dir, instruction)
}

/// A `PropagateContext` over `roots`, rooted at each temp dir, with empty
/// trees the caller populates directly.
pub fn context(direction: Direction, roots: &Roots) -> PropagateContext {
    let local = Replica::new(ReplicaKind::Local, roots.local.path().display().to_string());
    let remote = Replica::new(
        ReplicaKind::Remote,
        roots.remote.path().display().to_string(),
    );
    PropagateContext::new(local, remote, direction)
}
