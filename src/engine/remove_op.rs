//! The remove operator for files (§4.6)

use crate::config::Direction;
use crate::context::PropagateContext;
use crate::progress::ProgressKind;
use crate::tree::Instruction;
use crate::vio::ReplicaDriver;

use super::OpOutcome;

/// Unlink the entry from the current replica. On failure, reset the
/// instruction to `NONE` so the entry is retried unchanged next run.
pub fn remove_file<D: ReplicaDriver>(
    ctx: &mut PropagateContext,
    dest_driver: &D,
    phash: u64,
) -> crate::error::Result<OpOutcome> {
    let path = {
        let tree = match ctx.direction {
            Direction::LocalToRemote => &ctx.local.tree,
            Direction::RemoteToLocal => &ctx.remote.tree,
        };
        let entry = tree
            .get(phash)
            .expect("remove operator called with absent phash");
        super::rename_adjust(entry).to_string()
    };

    let root = match ctx.direction {
        Direction::LocalToRemote => ctx.remote.uri.as_str(),
        Direction::RemoteToLocal => ctx.local.uri.as_str(),
    };
    let uri = crate::pathutil::join_uri(root, &path);

    notify(ctx, ProgressKind::StartDelete, &path);

    match dest_driver.unlink(&uri) {
        Ok(()) => {
            set_instruction(ctx, phash, Instruction::Deleted);
            notify(ctx, ProgressKind::EndDelete, &path);
            Ok(OpOutcome::Success)
        }
        Err(err) => {
            set_instruction(ctx, phash, Instruction::None);
            Err(err)
        }
    }
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

fn notify(ctx: &PropagateContext, kind: ProgressKind, path: &str) {
    if let Some(callback) = ctx.callback.as_deref() {
        callback.on_progress(&crate::progress::Progress {
            kind,
            path: path.to_string(),
            curr_bytes: 0,
            file_size: 0,
            overall_transmission_size: ctx.overall_progress.byte_sum,
            current_overall_bytes: ctx.overall_progress.byte_current,
            overall_file_count: ctx.overall_progress.file_count,
            current_file_no: ctx.overall_progress.current_file_no,
        });
    }
}
