//! Deferred rmdir cleanup on ENOTEMPTY (§4.3, §5 ordering, §8 property 5,
//! scenario 5).

mod common;

use propagator::drivers::LocalFsDriver;
use propagator::{Direction, Instruction};

#[test]
fn enotempty_defers_then_cleanup_pass_unlinks_ignored_child_and_rmdirs() {
    let roots = common::roots();
    std::fs::create_dir(roots.remote.path().join("d")).unwrap();
    common::write_file(roots.remote.path(), "d/.cache", b"ignored");

    let dir = common::dir_entry("d", Instruction::Remove);
    let phash = dir.phash;

    let mut ctx = common::context(Direction::LocalToRemote, &roots);
    ctx.local.tree.insert(dir);

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();

    let outcome =
        propagator::engine::directory_op::remove_dir(&mut ctx, &remote_driver, phash).unwrap();
    assert_eq!(outcome, propagator::engine::OpOutcome::Success);
    assert!(roots.remote.path().join("d").exists(), "rmdir deferred, not removed yet");
    assert_eq!(ctx.remote.deferred_rmdir, vec![phash]);

    ctx.remote.ignore_for_cleanup(phash, "d/.cache");

    let statedb = propagator::InMemoryStateDb::new();
    propagator::engine::visitor::cleanup_pass(&mut ctx, &local_driver, &remote_driver, &statedb)
        .expect("cleanup pass should not hard-fail");

    assert!(!roots.remote.path().join("d").exists());
    assert_eq!(
        ctx.local.tree.get(phash).unwrap().instruction,
        Instruction::Deleted
    );
}

#[test]
fn cleanup_pass_processes_nested_dirs_in_reverse_path_order() {
    let roots = common::roots();
    for p in ["a", "a/b", "a/b/c"] {
        std::fs::create_dir_all(roots.remote.path().join(p)).unwrap();
    }

    let mut ctx = common::context(Direction::LocalToRemote, &roots);
    let mut phashes = Vec::new();
    for p in ["a", "a/b", "a/b/c"] {
        let dir = common::dir_entry(p, Instruction::Remove);
        let phash = dir.phash;
        phashes.push(phash);
        ctx.local.tree.insert(dir);
        ctx.remote.defer_rmdir(phash);
    }

    let remote_driver = LocalFsDriver::new();
    let local_driver = LocalFsDriver::new();
    let statedb = propagator::InMemoryStateDb::new();

    propagator::engine::visitor::cleanup_pass(&mut ctx, &local_driver, &remote_driver, &statedb)
        .expect("cleanup pass should not hard-fail");

    for p in ["a", "a/b", "a/b/c"] {
        assert!(!roots.remote.path().join(p).exists(), "{p} should be removed");
    }
    for phash in phashes {
        assert_eq!(ctx.local.tree.get(phash).unwrap().instruction, Instruction::Deleted);
    }
}
