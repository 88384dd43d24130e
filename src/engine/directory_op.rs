//! The directory operator (§4.3)

use crate::config::Direction;
use crate::context::PropagateContext;
use crate::error::{PropagateError, Result};
use crate::pathutil::join_uri;
use crate::tree::Instruction;
use crate::vio::ReplicaDriver;

use super::OpOutcome;

fn dest_root(ctx: &PropagateContext) -> &str {
    match ctx.direction {
        Direction::LocalToRemote => ctx.remote.uri.as_str(),
        Direction::RemoteToLocal => ctx.local.uri.as_str(),
    }
}

fn entry_snapshot(ctx: &PropagateContext, phash: u64) -> (String, u32, u32, u32, i64) {
    let tree = match ctx.direction {
        Direction::LocalToRemote => &ctx.local.tree,
        Direction::RemoteToLocal => &ctx.remote.tree,
    };
    let entry = tree
        .get(phash)
        .expect("directory operator called with absent phash");
    (
        super::rename_adjust(entry).to_string(),
        entry.mode,
        entry.uid,
        entry.gid,
        entry.modtime,
    )
}

fn set_instruction(ctx: &mut PropagateContext, phash: u64, instruction: Instruction) {
    let tree = match ctx.direction {
        Direction::LocalToRemote => &mut ctx.local.tree,
        Direction::RemoteToLocal => &mut ctx.remote.tree,
    };
    if let Some(entry) = tree.get_mut(phash) {
        entry.instruction = instruction;
    }
}

/// `mkdirs` the destination, reconcile its attributes, mark `UPDATED`.
pub fn new_dir<D: ReplicaDriver>(ctx: &mut PropagateContext, dest_driver: &D, phash: u64) -> Result<OpOutcome> {
    let (path, mode, uid, gid, modtime) = entry_snapshot(ctx, phash);
    let uri = join_uri(dest_root(ctx), &path);
    dest_driver.mkdirs(&uri, 0o755)?;
    reconcile_attrs(dest_driver, &uri, mode, uid, gid, modtime, 0o755)?;
    set_instruction(ctx, phash, Instruction::Updated);
    Ok(OpOutcome::Success)
}

/// Reconcile attributes on a directory that already exists on both sides.
/// A `CONFLICT` instruction on a directory is treated the same as `SYNC`:
/// there is no content to back up, only attributes to reconcile.
pub fn sync_dir<D: ReplicaDriver>(ctx: &mut PropagateContext, dest_driver: &D, phash: u64) -> Result<OpOutcome> {
    let (path, mode, uid, gid, modtime) = entry_snapshot(ctx, phash);
    let uri = join_uri(dest_root(ctx), &path);
    reconcile_attrs(dest_driver, &uri, mode, uid, gid, modtime, 0o755)?;
    set_instruction(ctx, phash, Instruction::Updated);
    Ok(OpOutcome::Success)
}

/// `rmdir` the destination; on `ENOTEMPTY`, defer to the cleanup pass.
pub fn remove_dir<D: ReplicaDriver>(ctx: &mut PropagateContext, dest_driver: &D, phash: u64) -> Result<OpOutcome> {
    let (path, ..) = entry_snapshot(ctx, phash);
    let uri = join_uri(dest_root(ctx), &path);
    match dest_driver.rmdir(&uri) {
        Ok(()) => {
            set_instruction(ctx, phash, Instruction::Deleted);
            Ok(OpOutcome::Success)
        }
        Err(PropagateError::Vio {
            errno: Some(errno), ..
        }) if errno == libc::ENOTEMPTY => {
            let replica = match ctx.direction {
                Direction::LocalToRemote => &mut ctx.remote,
                Direction::RemoteToLocal => &mut ctx.local,
            };
            replica.defer_rmdir(phash);
            Ok(OpOutcome::Success)
        }
        Err(err) => Err(err),
    }
}

fn reconcile_attrs<D: ReplicaDriver>(
    dest_driver: &D,
    uri: &str,
    mode: u32,
    uid: u32,
    gid: u32,
    modtime: i64,
    default_mode: u32,
) -> Result<()> {
    if mode & 0o7777 != default_mode {
        dest_driver.chmod(uri, mode)?;
    }
    if crate::config::running_as_root() {
        let _ = dest_driver.chown(uri, uid, gid);
    }
    dest_driver.utimes(uri, modtime)?;
    Ok(())
}
