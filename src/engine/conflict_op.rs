//! The conflict operator (§4.5)

use tracing::info;

use crate::config::Direction;
use crate::context::PropagateContext;
use crate::statedb::StateDb;
use crate::time_fmt::conflict_timestamp;
use crate::vio::ReplicaDriver;

use super::file_transfer::push_file;
use super::OpOutcome;

/// Back up the existing destination to a timestamped name, then push the
/// source file over it. When the direction is a download and the backup
/// turns out byte-identical to what was just downloaded, remove the
/// spurious backup.
pub fn handle_conflict<S: ReplicaDriver, D: ReplicaDriver>(
    ctx: &mut PropagateContext,
    source_driver: &S,
    dest_driver: &D,
    phash: u64,
    statedb: &dyn StateDb,
) -> crate::error::Result<OpOutcome> {
    let (path, modtime) = {
        let tree = match ctx.direction {
            Direction::LocalToRemote => &ctx.local.tree,
            Direction::RemoteToLocal => &ctx.remote.tree,
        };
        let entry = tree
            .get(phash)
            .expect("conflict operator called with absent phash");
        (super::rename_adjust(entry).to_string(), entry.modtime)
    };

    let dest_root = match ctx.direction {
        Direction::LocalToRemote => ctx.remote.uri.as_str(),
        Direction::RemoteToLocal => ctx.local.uri.as_str(),
    };
    let dest_uri = crate::pathutil::join_uri(dest_root, &path);

    let (dir, base) = match crate::pathutil::dirname(&path) {
        Some(dir) => (dir, crate::pathutil::basename(&path)),
        None => ("", path.as_str()),
    };
    let (stem, ext) = crate::pathutil::split_extension(base);
    let backup_name = format!("{stem}_conflict-{}{ext}", conflict_timestamp(modtime));
    let backup_path = if dir.is_empty() {
        backup_name
    } else {
        format!("{dir}/{backup_name}")
    };
    let backup_uri = crate::pathutil::join_uri(dest_root, &backup_path);

    if dest_driver.exists(&dest_uri) {
        dest_driver.rename(&dest_uri, &backup_uri)?;
    }

    let outcome = push_file(ctx, source_driver, dest_driver, phash, statedb)?;

    if ctx.direction == Direction::RemoteToLocal && dest_driver.exists(&backup_uri) {
        let identical = files_are_identical(dest_driver, &backup_uri, &dest_uri);
        if identical {
            info!(path, "conflict resolved to identical content, removing backup");
            let _ = dest_driver.unlink(&backup_uri);
        }
    }

    Ok(outcome)
}

fn files_are_identical<D: ReplicaDriver>(dest_driver: &D, a_uri: &str, b_uri: &str) -> bool {
    let (a_stat, b_stat) = match (dest_driver.stat(a_uri), dest_driver.stat(b_uri)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return false,
    };
    if a_stat.size != b_stat.size {
        return false;
    }
    match (dest_driver.file_id(a_uri), dest_driver.file_id(b_uri)) {
        (Ok(a), Ok(b)) if !a.is_empty() && !b.is_empty() => a == b,
        _ => byte_compare(dest_driver, a_uri, b_uri),
    }
}

fn byte_compare<D: ReplicaDriver>(dest_driver: &D, a_uri: &str, b_uri: &str) -> bool {
    let (mut a, mut b) = match (dest_driver.open_read(a_uri), dest_driver.open_read(b_uri)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return false,
    };
    use std::io::Read;
    let mut buf_a = Vec::new();
    let mut buf_b = Vec::new();
    if a.read_to_end(&mut buf_a).is_err() || b.read_to_end(&mut buf_b).is_err() {
        return false;
    }
    buf_a == buf_b
}
