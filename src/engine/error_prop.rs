//! Error propagation and the progress journal (§4.7)

use tracing::warn;

use crate::context::PropagateContext;
use crate::error::PropagateError;
use crate::progress::ProgressInfo;
use crate::statedb::StateDb;
use crate::tree::Tree;

fn current_tree(ctx: &mut PropagateContext) -> &mut Tree {
    match ctx.direction {
        crate::config::Direction::LocalToRemote => &mut ctx.local.tree,
        crate::config::Direction::RemoteToLocal => &mut ctx.remote.tree,
    }
}

/// Mark `phash`'s entry and its ancestors `ERROR`, and append a progress
/// record for the statedb handoff.
///
/// `pi_override` lets the file transfer engine supply a progress record
/// that already carries resume state (a surviving tmp file, a chunk
/// cursor, a doubled error counter); everything else builds a fresh
/// lookup-or-new record per §4.7 step 4.
pub fn record_error(
    ctx: &mut PropagateContext,
    phash: u64,
    err: &PropagateError,
    pi_override: Option<ProgressInfo>,
    statedb: &dyn StateDb,
) {
    let message = err.to_string();
    warn!(phash, error = %message, "entry failed");

    let tree = current_tree(ctx);
    let Some((path, modtime, md5)) = tree.get_mut(phash).map(|entry| {
        entry.mark_error(message.clone());
        (entry.path.clone(), entry.modtime, entry.md5.clone())
    }) else {
        return;
    };
    tree.mark_ancestors_error(&path, "Error within the directory");

    let mut pi = match pi_override {
        Some(pi) => pi,
        None => match statedb.get_progressinfo(phash, modtime, &md5) {
            Some(mut existing) => {
                existing.error += 1;
                existing
            }
            None => ProgressInfo::new(phash, modtime, md5),
        },
    };
    pi.error_string = Some(message);
    ctx.record_progress(pi);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Direction, ReplicaKind};
    use crate::replica::Replica;
    use crate::statedb::InMemoryStateDb;
    use crate::tree::{EntryType, FileStat, Instruction};

    fn ctx_with_file() -> (PropagateContext, u64) {
        let mut local = Replica::new(ReplicaKind::Local, "/local");
        let remote = Replica::new(ReplicaKind::Remote, "remote://bucket");
        let mut dir = FileStat::new("a", EntryType::Dir, Instruction::None);
        dir.instruction = Instruction::None;
        let file = FileStat::new("a/b.txt", EntryType::File, Instruction::New);
        let phash = file.phash;
        local.tree.insert(dir);
        local.tree.insert(file);
        (
            PropagateContext::new(local, remote, Direction::LocalToRemote),
            phash,
        )
    }

    #[test]
    fn marks_entry_and_ancestor_error() {
        let (mut ctx, phash) = ctx_with_file();
        let statedb = InMemoryStateDb::new();
        let err = PropagateError::SourceChanged("a/b.txt".into());
        record_error(&mut ctx, phash, &err, None, &statedb);

        assert_eq!(
            ctx.local.tree.get(phash).unwrap().instruction,
            Instruction::Error
        );
        assert_eq!(
            ctx.local.tree.get_by_path("a").unwrap().instruction,
            Instruction::Error
        );
        assert_eq!(ctx.progress_info.len(), 1);
        assert_eq!(ctx.progress_info[0].error, 1);
    }

    #[test]
    fn increments_existing_progress_record() {
        let (mut ctx, phash) = ctx_with_file();
        let statedb = InMemoryStateDb::new();
        statedb.put(ProgressInfo::new(phash, 0, String::new()));
        let err = PropagateError::SourceChanged("a/b.txt".into());
        record_error(&mut ctx, phash, &err, None, &statedb);
        assert_eq!(ctx.progress_info[0].error, 2);
    }
}
