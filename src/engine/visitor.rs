//! Tree walks: the file pass, the directory pass, and the deferred-rmdir
//! cleanup pass (§4.1, §5 ordering guarantees)
//!
//! Mirrors the original C propagator's `csync_walk_tree`, re-invoked once
//! per `filter` (`FILE_TYPE`/`DIR_TYPE`) rather than unified into one
//! generic walk with per-node-kind callbacks.

use tracing::debug;

use crate::config::Direction;
use crate::context::PropagateContext;
use crate::error::{ErrorClass, PropagateError, Result};
use crate::statedb::StateDb;
use crate::tree::{EntryType, Instruction};
use crate::vio::ReplicaDriver;

use super::{conflict_op, directory_op, file_transfer, remove_op, rename_op, OpOutcome};

fn check_abort(ctx: &PropagateContext) -> Result<()> {
    if ctx.is_aborted() {
        return Err(PropagateError::Aborted);
    }
    Ok(())
}

fn current_instruction(ctx: &PropagateContext, phash: u64) -> Option<Instruction> {
    let tree = match ctx.direction {
        Direction::LocalToRemote => &ctx.local.tree,
        Direction::RemoteToLocal => &ctx.remote.tree,
    };
    tree.get(phash).map(|e| e.instruction)
}

fn settle(
    ctx: &mut PropagateContext,
    phash: u64,
    outcome: Result<OpOutcome>,
    statedb: &dyn StateDb,
) -> Result<()> {
    match outcome {
        Ok(_) => Ok(()),
        Err(err) => match err.classify() {
            ErrorClass::Fatal => Err(err),
            ErrorClass::Soft => {
                super::error_prop::record_error(ctx, phash, &err, None, statedb);
                Ok(())
            }
        },
    }
}

/// Visit every `FILE` entry in tree-walk order, dispatching to the
/// matching operator by instruction.
///
/// `R: ReplicaDriver<Handle = L::Handle>` is required by `file_transfer`'s
/// `sendfile` dispatch, which hands both the source and destination
/// handles to a single driver call and so needs them to share a concrete
/// handle type; see `file_transfer`'s module doc.
pub fn file_pass<L: ReplicaDriver, R: ReplicaDriver<Handle = L::Handle>>(
    ctx: &mut PropagateContext,
    local_driver: &L,
    remote_driver: &R,
    statedb: &dyn StateDb,
) -> Result<()> {
    let phashes: Vec<u64> = match ctx.direction {
        Direction::LocalToRemote => ctx.local.tree.phashes_of_type(EntryType::File).collect(),
        Direction::RemoteToLocal => ctx.remote.tree.phashes_of_type(EntryType::File).collect(),
    };

    for phash in phashes {
        check_abort(ctx)?;
        let Some(instruction) = current_instruction(ctx, phash) else {
            continue;
        };

        let outcome = match (ctx.direction, instruction) {
            (Direction::LocalToRemote, Instruction::New | Instruction::Sync) => {
                file_transfer::push_file(ctx, local_driver, remote_driver, phash, statedb)
            }
            (Direction::RemoteToLocal, Instruction::New | Instruction::Sync) => {
                file_transfer::push_file(ctx, remote_driver, local_driver, phash, statedb)
            }
            (Direction::LocalToRemote, Instruction::Conflict) => conflict_op::handle_conflict(
                ctx,
                local_driver,
                remote_driver,
                phash,
                statedb,
            ),
            (Direction::RemoteToLocal, Instruction::Conflict) => conflict_op::handle_conflict(
                ctx,
                remote_driver,
                local_driver,
                phash,
                statedb,
            ),
            (Direction::LocalToRemote, Instruction::Remove) => {
                remove_op::remove_file(ctx, remote_driver, phash)
            }
            (Direction::RemoteToLocal, Instruction::Remove) => {
                remove_op::remove_file(ctx, local_driver, phash)
            }
            (Direction::RemoteToLocal, Instruction::Rename) => {
                rename_op::rename_file(ctx, remote_driver, phash, statedb)
            }
            _ => {
                debug!(phash, ?instruction, "no file operator for this instruction");
                Ok(OpOutcome::Success)
            }
        };

        settle(ctx, phash, outcome, statedb)?;
    }
    Ok(())
}

/// Visit every `DIR` entry in tree-walk order, dispatching to the
/// matching directory operator.
pub fn directory_pass<L: ReplicaDriver, R: ReplicaDriver>(
    ctx: &mut PropagateContext,
    local_driver: &L,
    remote_driver: &R,
    statedb: &dyn StateDb,
) -> Result<()> {
    let phashes: Vec<u64> = match ctx.direction {
        Direction::LocalToRemote => ctx.local.tree.phashes_of_type(EntryType::Dir).collect(),
        Direction::RemoteToLocal => ctx.remote.tree.phashes_of_type(EntryType::Dir).collect(),
    };

    for phash in phashes {
        check_abort(ctx)?;
        let Some(instruction) = current_instruction(ctx, phash) else {
            continue;
        };

        let outcome = match (ctx.direction, instruction) {
            (Direction::LocalToRemote, Instruction::New) => {
                directory_op::new_dir(ctx, remote_driver, phash)
            }
            (Direction::RemoteToLocal, Instruction::New) => {
                directory_op::new_dir(ctx, local_driver, phash)
            }
            (Direction::LocalToRemote, Instruction::Sync | Instruction::Conflict) => {
                directory_op::sync_dir(ctx, remote_driver, phash)
            }
            (Direction::RemoteToLocal, Instruction::Sync | Instruction::Conflict) => {
                directory_op::sync_dir(ctx, local_driver, phash)
            }
            (Direction::LocalToRemote, Instruction::Remove) => {
                directory_op::remove_dir(ctx, remote_driver, phash)
            }
            (Direction::RemoteToLocal, Instruction::Remove) => {
                directory_op::remove_dir(ctx, local_driver, phash)
            }
            _ => {
                debug!(phash, ?instruction, "no directory operator for this instruction");
                Ok(OpOutcome::Success)
            }
        };

        settle(ctx, phash, outcome, statedb)?;
    }
    Ok(())
}

/// Process the deferred-rmdir queue in reverse path-sorted order: unlink
/// each directory's ignored-cleanup children, then retry `rmdir`.
pub fn cleanup_pass<L: ReplicaDriver, R: ReplicaDriver>(
    ctx: &mut PropagateContext,
    local_driver: &L,
    remote_driver: &R,
    statedb: &dyn StateDb,
) -> Result<()> {
    let dest_is_remote = ctx.direction.destination_is_remote();

    let sorted = if dest_is_remote {
        let source_tree = &ctx.local.tree;
        ctx.remote.drain_deferred_rmdir_sorted(source_tree)
    } else {
        let source_tree = &ctx.remote.tree;
        ctx.local.drain_deferred_rmdir_sorted(source_tree)
    };

    for phash in sorted {
        check_abort(ctx)?;

        // The entry's path lives in the source (current-direction) tree,
        // same as every other operator; the deferred queue and ignored
        // children live on the destination replica, the physical side
        // where the directory still has children blocking `rmdir`.
        let path = match ctx.direction {
            Direction::LocalToRemote => ctx.local.tree.get(phash).map(|e| e.path.clone()),
            Direction::RemoteToLocal => ctx.remote.tree.get(phash).map(|e| e.path.clone()),
        }
        .unwrap_or_default();
        let children: Vec<String> = if dest_is_remote {
            ctx.remote.ignored_cleanup.get(&phash).cloned()
        } else {
            ctx.local.ignored_cleanup.get(&phash).cloned()
        }
        .unwrap_or_default();

        let root = if dest_is_remote {
            ctx.remote.uri.as_str()
        } else {
            ctx.local.uri.as_str()
        };
        for child in &children {
            let uri = crate::pathutil::join_uri(root, child);
            let res = if dest_is_remote {
                remote_driver.unlink(&uri)
            } else {
                local_driver.unlink(&uri)
            };
            let _ = res;
        }

        let uri = crate::pathutil::join_uri(root, &path);
        let outcome = if dest_is_remote {
            remote_driver.rmdir(&uri)
        } else {
            local_driver.rmdir(&uri)
        }
        .map(|()| OpOutcome::Success);

        if outcome.is_ok() {
            let tree = match ctx.direction {
                Direction::LocalToRemote => &mut ctx.local.tree,
                Direction::RemoteToLocal => &mut ctx.remote.tree,
            };
            if let Some(entry) = tree.get_mut(phash) {
                entry.instruction = Instruction::Deleted;
            }
        }

        settle(ctx, phash, outcome, statedb)?;
    }
    Ok(())
}
