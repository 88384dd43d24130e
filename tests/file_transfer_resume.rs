//! Crash-safe, resumable file transfer (§4.2, §8 properties 1-3, scenario 6).

mod common;

use propagator::drivers::LocalFsDriver;
use propagator::{Direction, Instruction, InMemoryStateDb, ProgressInfo};

#[test]
fn new_file_upload_stages_and_renames_into_place() {
    let roots = common::roots();
    common::write_file(roots.local.path(), "a.txt", b"hello world");
    let entry = common::file_entry(roots.local.path(), "a.txt", Instruction::New);
    let phash = entry.phash;

    let mut ctx = common::context(Direction::LocalToRemote, &roots);
    ctx.local.tree.insert(entry);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();
    let statedb = InMemoryStateDb::new();

    propagator::engine::file_transfer::push_file(
        &mut ctx,
        &local_driver,
        &remote_driver,
        phash,
        &statedb,
    )
    .expect("push_file should not hard-fail");

    let dest = roots.remote.path().join("a.txt");
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");

    let updated = ctx.local.tree.get(phash).unwrap();
    assert_eq!(updated.instruction, Instruction::Updated);
    assert!(!updated.md5.is_empty());
    assert_eq!(ctx.overall_progress.byte_current, 11);

    // no stray tmp sibling left behind
    let leftovers: Vec<_> = std::fs::read_dir(roots.remote.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n != "a.txt")
        .collect();
    assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");
}

#[test]
fn resume_from_surviving_tmp_file_does_not_duplicate_content() {
    let roots = common::roots();
    let full_content = b"0123456789abcdef".to_vec();
    common::write_file(roots.local.path(), "a.txt", &full_content);
    let entry = common::file_entry(roots.local.path(), "a.txt", Instruction::New);
    let phash = entry.phash;
    let modtime = entry.modtime;
    let md5 = entry.md5.clone();

    // Simulate a prior run that staged half the file before failing.
    let tmp_path = roots.remote.path().join(".a.txt.~resume-test-0");
    std::fs::write(&tmp_path, &full_content[..8]).unwrap();

    let statedb = InMemoryStateDb::new();
    let mut pi = ProgressInfo::new(phash, modtime, md5);
    pi.tmpfile = Some(tmp_path.display().to_string());
    pi.error = 1;
    statedb.put(pi);

    let mut ctx = common::context(Direction::LocalToRemote, &roots);
    ctx.local.tree.insert(entry);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();

    propagator::engine::file_transfer::push_file(
        &mut ctx,
        &local_driver,
        &remote_driver,
        phash,
        &statedb,
    )
    .expect("resume should not hard-fail");

    let dest = roots.remote.path().join("a.txt");
    assert_eq!(std::fs::read(&dest).unwrap(), full_content);
    assert_eq!(
        ctx.local.tree.get(phash).unwrap().instruction,
        Instruction::Updated
    );
}

#[test]
fn blacklisted_entry_is_skipped_without_a_transfer_attempt() {
    let roots = common::roots();
    common::write_file(roots.local.path(), "bad.txt", b"payload");
    let entry = common::file_entry(roots.local.path(), "bad.txt", Instruction::New);
    let phash = entry.phash;
    let modtime = entry.modtime;
    let md5 = entry.md5.clone();

    let statedb = InMemoryStateDb::new();
    let mut pi = ProgressInfo::new(phash, modtime, md5);
    pi.error = 4;
    statedb.put(pi);

    let mut ctx = common::context(Direction::LocalToRemote, &roots);
    ctx.local.tree.insert(entry);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();

    let outcome = propagator::engine::file_transfer::push_file(
        &mut ctx,
        &local_driver,
        &remote_driver,
        phash,
        &statedb,
    )
    .unwrap();

    assert_eq!(outcome, propagator::engine::OpOutcome::Skip);
    assert!(!roots.remote.path().join("bad.txt").exists());
    // Instruction is untouched: the entry is retried unchanged next run.
    assert_eq!(ctx.local.tree.get(phash).unwrap().instruction, Instruction::New);
}
