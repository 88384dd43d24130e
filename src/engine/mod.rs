//! The propagator driver and its per-operator submodules
//!
//! Mirrors the original C propagator's decomposition: one free-function
//! module per operator (`file_transfer`, `directory_op`, `rename_op`,
//! `conflict_op`, `remove_op`) plus a `visitor` module for the two-pass
//! file/directory walk and its deferred-cleanup pass, rather than one
//! dispatch-by-instruction monolith.

pub mod conflict_op;
pub mod directory_op;
pub mod error_prop;
pub mod file_transfer;
pub mod remove_op;
pub mod rename_op;
pub mod visitor;

use tracing::info;

use crate::context::PropagateContext;
use crate::error::Result;
use crate::progress::{Progress, ProgressKind};
use crate::statedb::StateDb;
use crate::tree::{EntryType, FileStat, Instruction};
use crate::vio::ReplicaDriver;

/// Result of one operator invocation that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// The operation completed; the entry's instruction has been updated.
    Success,
    /// The operation was deliberately skipped (blacklisted entry, or a
    /// source that changed since planning). Not an error: the walk
    /// continues and the entry is left as-is for the next run.
    Skip,
}

/// The path a "rename-adjusted" push reads from or writes to: a file
/// simultaneously renamed and modified is addressed at its new location.
#[must_use]
pub fn rename_adjust(entry: &FileStat) -> &str {
    entry.dest_path.as_deref().unwrap_or(&entry.path)
}

/// Walk both trees' FILE entries with instruction in `{NEW, SYNC,
/// CONFLICT}`, accumulating totals, then publish them and emit
/// `START_SYNC_SEQUENCE`. A no-op when no callback is registered.
pub fn init_progress(ctx: &mut PropagateContext) {
    let Some(callback) = ctx.callback.as_deref() else {
        return;
    };

    let mut file_count = 0u64;
    let mut byte_sum = 0u64;
    for tree in [&ctx.remote.tree, &ctx.local.tree] {
        for entry in tree.iter() {
            if entry.entry_type == EntryType::File
                && matches!(
                    entry.instruction,
                    Instruction::New | Instruction::Sync | Instruction::Conflict
                )
            {
                file_count += 1;
                byte_sum += entry.size;
            }
        }
    }

    ctx.overall_progress.file_count = file_count;
    ctx.overall_progress.byte_sum = byte_sum;
    info!(file_count, byte_sum, "starting sync sequence");

    callback.on_progress(&Progress {
        kind: ProgressKind::StartSyncSequence,
        path: String::new(),
        curr_bytes: 0,
        file_size: 0,
        overall_transmission_size: byte_sum,
        current_overall_bytes: 0,
        overall_file_count: file_count,
        current_file_no: 0,
    });
}

/// Run the file pass, directory pass, and deferred-rmdir cleanup pass for
/// the current direction's tree. Per-entry failures are recorded on the
/// entry and do not stop the walk; a fatal failure aborts immediately.
pub fn propagate_files<L: ReplicaDriver, R: ReplicaDriver<Handle = L::Handle>>(
    ctx: &mut PropagateContext,
    local_driver: &L,
    remote_driver: &R,
    statedb: &dyn StateDb,
) -> Result<()> {
    visitor::file_pass(ctx, local_driver, remote_driver, statedb)?;
    visitor::directory_pass(ctx, local_driver, remote_driver, statedb)?;
    visitor::cleanup_pass(ctx, local_driver, remote_driver, statedb)?;
    Ok(())
}

/// Emit `FINISHED_SYNC_SEQUENCE` and clear the published totals.
pub fn finalize_progress(ctx: &mut PropagateContext) {
    let Some(callback) = ctx.callback.as_deref() else {
        return;
    };
    info!("finished sync sequence");
    callback.on_progress(&Progress {
        kind: ProgressKind::FinishedSyncSequence,
        path: String::new(),
        curr_bytes: 0,
        file_size: 0,
        overall_transmission_size: ctx.overall_progress.byte_sum,
        current_overall_bytes: ctx.overall_progress.byte_current,
        overall_file_count: ctx.overall_progress.file_count,
        current_file_no: ctx.overall_progress.current_file_no,
    });
    ctx.overall_progress = crate::progress::OverallProgress::default();
}
