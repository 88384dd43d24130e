//! The rename operator (§4.4)
//!
//! Rename is reflected server-side only; it is reachable solely from the
//! remote tree (direction `RemoteToLocal`, i.e. `ctx.direction`'s source is
//! remote). A local-direction rename instruction never reaches this
//! operator — the reconciler only assigns `RENAME` to remote-tree entries.

use crate::config::Direction;
use crate::error::PropagateError;
use crate::pathutil::dirname;
use crate::tree::Instruction;
use crate::vio::ReplicaDriver;

use super::error_prop::record_error;
use super::{rename_adjust, OpOutcome};
use crate::context::PropagateContext;
use crate::statedb::StateDb;

/// Rename `phash`'s entry within the remote replica and mirror the result
/// onto the corresponding local-tree entry.
pub fn rename_file<R: ReplicaDriver>(
    ctx: &mut PropagateContext,
    remote_driver: &R,
    phash: u64,
    statedb: &dyn StateDb,
) -> crate::error::Result<OpOutcome> {
    assert!(
        matches!(ctx.direction, Direction::RemoteToLocal),
        "rename is only reachable from the remote-direction walk"
    );

    let (src_path, dst_path, is_dir, uid, gid, modtime) = {
        let entry = ctx
            .remote
            .tree
            .get(phash)
            .expect("rename operator called with absent phash");
        let dst = entry
            .dest_path
            .clone()
            .unwrap_or_else(|| entry.path.clone());
        (
            rename_adjust(entry).to_string(),
            dst,
            entry.entry_type == crate::tree::EntryType::Dir,
            entry.uid,
            entry.gid,
            entry.modtime,
        )
    };

    if src_path == dst_path {
        if let Some(entry) = ctx.remote.tree.get_mut(phash) {
            entry.instruction = Instruction::Deleted;
        }
        return Ok(OpOutcome::Success);
    }

    let src_uri = ctx.remote.join(&src_path);
    let dst_uri = ctx.remote.join(&dst_path);

    let rename_result = rename_with_mkdir_retry(remote_driver, &src_uri, &dst_uri);

    match rename_result {
        Ok(()) => {
            if crate::config::running_as_root() {
                let _ = remote_driver.chown(&dst_uri, uid, gid);
            }
            let _ = remote_driver.utimes(&dst_uri, modtime);

            let fresh_md5 = if is_dir {
                ctx.remote
                    .tree
                    .get(phash)
                    .map(|e| e.md5.clone())
                    .unwrap_or_default()
            } else {
                remote_driver.file_id(&dst_uri).unwrap_or_default()
            };

            let dest_phash = crate::hash::jhash64(dst_path.as_bytes());
            if let Some(mirror) = ctx.local.tree.get_mut(dest_phash) {
                mirror.md5 = fresh_md5;
                mirror.instruction = Instruction::Updated;
            }

            if let Some(entry) = ctx.remote.tree.get_mut(phash) {
                entry.instruction = Instruction::Deleted;
            }
            Ok(OpOutcome::Success)
        }
        Err(err) => {
            if let Some(entry) = ctx.remote.tree.get_mut(phash) {
                entry.instruction = Instruction::Updated;
            }
            let dest_phash = crate::hash::jhash64(dst_path.as_bytes());
            record_error(ctx, dest_phash, &err, None, statedb);
            Ok(OpOutcome::Success)
        }
    }
}

fn rename_with_mkdir_retry<R: ReplicaDriver>(
    remote_driver: &R,
    src_uri: &str,
    dst_uri: &str,
) -> crate::error::Result<()> {
    let mut last_parent: Option<String> = None;
    loop {
        match remote_driver.rename(src_uri, dst_uri) {
            Ok(()) => return Ok(()),
            Err(PropagateError::Vio {
                errno: Some(errno), ..
            }) if errno == libc::ENOENT => {
                let parent = dirname(dst_uri).unwrap_or("").to_string();
                if last_parent.as_deref() == Some(parent.as_str()) {
                    return Err(PropagateError::StagingLoop(dst_uri.to_string()));
                }
                remote_driver.mkdirs(&parent, 0o755)?;
                last_parent = Some(parent);
            }
            Err(err) => return Err(err),
        }
    }
}
