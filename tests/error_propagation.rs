//! Error propagation through a real transfer failure (§4.7): a missing
//! source file marks its own entry and its ancestor directory `ERROR`.

mod common;

use propagator::drivers::LocalFsDriver;
use propagator::{Direction, EntryType, FileStat, Instruction};

#[test]
fn missing_source_file_marks_entry_and_ancestor_error() {
    let roots = common::roots();
    // Ancestor directory exists on both sides, but "a/b.txt" was planned
    // without ever landing on the remote source root.
    std::fs::create_dir_all(roots.remote.path().join("a")).unwrap();
    std::fs::create_dir_all(roots.local.path().join("a")).unwrap();

    let dir = common::dir_entry("a", Instruction::None);

    let mut file = FileStat::new("a/b.txt", EntryType::File, Instruction::New);
    file.size = 5;
    file.modtime = 1_700_000_000;
    let phash = file.phash;

    let mut ctx = common::context(Direction::RemoteToLocal, &roots);
    ctx.remote.tree.insert(dir);
    ctx.remote.tree.insert(file);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();
    let statedb = propagator::InMemoryStateDb::new();

    let outcome = propagator::engine::file_transfer::push_file(
        &mut ctx,
        &remote_driver,
        &local_driver,
        phash,
        &statedb,
    )
    .expect("push_file classifies a missing source as a soft error, not a hard failure");
    assert_eq!(outcome, propagator::engine::OpOutcome::Success);

    assert_eq!(
        ctx.remote.tree.get(phash).unwrap().instruction,
        Instruction::Error
    );
    assert_eq!(
        ctx.remote.tree.get_by_path("a").unwrap().instruction,
        Instruction::Error
    );
    assert_eq!(ctx.progress_info.len(), 1);
    assert!(!roots.local.path().join("a/b.txt").exists());
}

#[test]
fn blacklisted_entry_is_skipped_and_marks_no_new_error() {
    let roots = common::roots();
    common::write_file(roots.remote.path(), "a.txt", b"hello");
    let entry = common::file_entry(roots.remote.path(), "a.txt", Instruction::New);
    let phash = entry.phash;
    let modtime = entry.modtime;

    let mut ctx = common::context(Direction::RemoteToLocal, &roots);
    ctx.remote.tree.insert(entry);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();
    let statedb = propagator::InMemoryStateDb::new();
    let mut pi = propagator::ProgressInfo::new(phash, modtime, String::new());
    pi.error = 4;
    statedb.put(pi);

    let outcome = propagator::engine::file_transfer::push_file(
        &mut ctx,
        &remote_driver,
        &local_driver,
        phash,
        &statedb,
    )
    .unwrap();

    assert_eq!(outcome, propagator::engine::OpOutcome::Skip);
    assert!(!roots.local.path().join("a.txt").exists());
    assert_eq!(
        ctx.remote.tree.get(phash).unwrap().instruction,
        Instruction::New,
        "a skipped (blacklisted) entry is left untouched, not marked error"
    );
}
