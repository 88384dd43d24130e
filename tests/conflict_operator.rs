//! The conflict operator (§4.5, §8 property 8, scenario 4).

mod common;

use propagator::drivers::LocalFsDriver;
use propagator::{Direction, Instruction};

#[test]
fn divergent_conflict_backs_up_existing_destination_then_pushes() {
    let roots = common::roots();
    common::write_file(roots.local.path(), "a.txt", b"new content");
    common::write_file(roots.remote.path(), "a.txt", b"old content");
    let entry = common::file_entry(roots.local.path(), "a.txt", Instruction::Conflict);
    let phash = entry.phash;
    let modtime = entry.modtime;

    let mut ctx = common::context(Direction::LocalToRemote, &roots);
    ctx.local.tree.insert(entry);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();
    let statedb = propagator::InMemoryStateDb::new();

    propagator::engine::conflict_op::handle_conflict(
        &mut ctx,
        &local_driver,
        &remote_driver,
        phash,
        &statedb,
    )
    .expect("conflict handling should not hard-fail");

    assert_eq!(
        std::fs::read(roots.remote.path().join("a.txt")).unwrap(),
        b"new content"
    );

    let ts = propagator::time_fmt::conflict_timestamp(modtime);
    let backup = roots.remote.path().join(format!("a_conflict-{ts}.txt"));
    assert_eq!(std::fs::read(&backup).unwrap(), b"old content");
}

#[test]
fn download_conflict_with_identical_outcome_removes_backup() {
    let roots = common::roots();
    let content = b"same on both sides".to_vec();
    common::write_file(roots.remote.path(), "a.txt", &content);
    common::write_file(roots.local.path(), "a.txt", &content);

    // The source entry for a download lives in the remote tree.
    let meta = std::fs::metadata(roots.remote.path().join("a.txt")).unwrap();
    let modtime = filetime::FileTime::from_last_modification_time(&meta).unix_seconds();
    let mut entry =
        propagator::FileStat::new("a.txt", propagator::EntryType::File, Instruction::Conflict);
    entry.size = meta.len();
    entry.modtime = modtime;
    let phash = entry.phash;

    let mut ctx = common::context(Direction::RemoteToLocal, &roots);
    ctx.remote.tree.insert(entry);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();
    let statedb = propagator::InMemoryStateDb::new();

    propagator::engine::conflict_op::handle_conflict(
        &mut ctx,
        &remote_driver,
        &local_driver,
        phash,
        &statedb,
    )
    .expect("conflict handling should not hard-fail");

    assert_eq!(
        std::fs::read(roots.local.path().join("a.txt")).unwrap(),
        content
    );

    let ts = propagator::time_fmt::conflict_timestamp(modtime);
    let backup = roots.local.path().join(format!("a_conflict-{ts}.txt"));
    assert!(!backup.exists(), "identical backup should have been removed");
}
