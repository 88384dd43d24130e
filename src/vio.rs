//! The virtual I/O (VIO) driver abstraction
//!
//! Grounded on the teacher's `AsyncFileSystem` trait: associated handle
//! type, one method per filesystem primitive, and capability query methods
//! with sensible defaults for drivers that don't implement an optional
//! transport. Adapted to this crate's synchronous execution model (plain
//! `fn`, not `async fn`) since the specification requires no suspension
//! points be visible to other tasks.
//!
//! A driver is generic over neither replica: the same trait describes both
//! the local filesystem and a remote object-store driver, and the engine's
//! transfer functions are themselves generic over `S: ReplicaDriver, D:
//! ReplicaDriver` so the same code pushes in both directions.

use crate::config::Capabilities;
use crate::error::{PropagateError, Result};
use crate::tree::FileStat;

/// Resume cursor for a chunked `sendfile` transfer (§4.2 step 3), paired
/// with `ProgressInfo::{transfer_id, chunk}`. `Default` (`{0, 0}`) starts a
/// fresh transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendfileCursor {
    /// Identifier the driver assigned the in-progress transfer.
    pub transfer_id: u64,
    /// Chunk index already written; the driver resumes after this one.
    pub chunk: u64,
}

/// What `ReplicaDriver::stat` reports about a URI.
#[derive(Debug, Clone)]
pub struct VioFileStat {
    /// Size in bytes.
    pub size: u64,
    /// Modification time, unix seconds.
    pub modtime: i64,
    /// Inode number, informational.
    pub inode: u64,
    /// Identity token, if the driver assigns one eagerly.
    pub md5: Option<String>,
}

fn unsupported(operation: &'static str, uri: &str) -> PropagateError {
    PropagateError::Vio {
        operation,
        uri: uri.to_string(),
        message: "not supported by this driver".to_string(),
        errno: None,
    }
}

/// A replica's filesystem-like interface, consumed by the propagator's
/// engine.
///
/// `Handle` need not be a raw file descriptor: a remote driver might make it
/// an in-memory buffer or an HTTP upload session. It must support
/// `std::io::Read` and `std::io::Write` so the buffered fallback transfer
/// path (§4.2 step 4) can drive it generically, and `std::io::Seek` so that
/// path can reposition the source reader past the bytes a resumed tmp file
/// already holds.
pub trait ReplicaDriver {
    /// An open file handle.
    type Handle: std::io::Read + std::io::Write + std::io::Seek;

    /// Capabilities this driver declares, fixed for its lifetime.
    fn capabilities(&self) -> Capabilities;

    /// Open `uri` read-only. Implementations should avoid updating the
    /// source's access time when the platform and permissions allow it.
    fn open_read(&self, uri: &str) -> Result<Self::Handle>;

    /// Create `uri` for writing, failing if it already exists
    /// (`O_CREAT|O_EXCL|O_WRONLY`).
    fn create_new(&self, uri: &str) -> Result<Self::Handle>;

    /// Open an existing file at `uri` for appending, used to resume a
    /// staged transfer from a surviving temp file.
    fn open_append(&self, uri: &str) -> Result<Self::Handle>;

    /// Release a handle. Errors are logged by the caller but otherwise
    /// non-fatal, except a destination close failing `ENOSPC`/`EDQUOT`
    /// (the caller classifies that from the returned error).
    fn close(&self, handle: Self::Handle) -> Result<()>;

    /// Stat `uri`.
    fn stat(&self, uri: &str) -> Result<VioFileStat>;

    /// `true` if `uri` exists. The default implementation is a stat probe.
    fn exists(&self, uri: &str) -> bool {
        self.stat(uri).is_ok()
    }

    /// Rename `from` to `to` within this replica.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Remove a file.
    fn unlink(&self, uri: &str) -> Result<()>;

    /// Remove an empty directory.
    fn rmdir(&self, uri: &str) -> Result<()>;

    /// Create `uri` and any missing parents with `mode`.
    fn mkdirs(&self, uri: &str, mode: u32) -> Result<()>;

    /// Change permission bits.
    fn chmod(&self, uri: &str, mode: u32) -> Result<()>;

    /// Change ownership. No-op on drivers without the concept (e.g. most
    /// object stores); default implementation succeeds trivially.
    fn chown(&self, _uri: &str, _uid: u32, _gid: u32) -> Result<()> {
        Ok(())
    }

    /// Set modification time.
    fn utimes(&self, uri: &str, modtime: i64) -> Result<()>;

    /// Mark a staged temp file hidden, on platforms where that is
    /// meaningful. Default is a no-op.
    fn set_hidden(&self, _uri: &str, _hidden: bool) -> Result<()> {
        Ok(())
    }

    /// Fetch the current identity token for `uri`.
    fn file_id(&self, uri: &str) -> Result<String>;

    /// One-shot local-source transfer, used when `capabilities().put_support`
    /// is set and the source replica is local. Default: unsupported.
    fn put(&self, _src_uri: &str, dst_uri: &str, _st: &FileStat) -> Result<()> {
        Err(unsupported("put", dst_uri))
    }

    /// One-shot remote-source transfer, used when
    /// `capabilities().get_support` is set and the source replica is
    /// remote. Default: unsupported.
    fn get(&self, dst_uri: &str, _src_uri: &str, _st: &FileStat) -> Result<()> {
        Err(unsupported("get", dst_uri))
    }

    /// Zero-copy transfer between two already-open handles of this driver,
    /// used when `capabilities().use_send_file_to_propagate` is set and the
    /// destination is written to directly (no tmp staging). `cursor` seeds
    /// a resume from a previously-interrupted transfer; `SendfileCursor`'s
    /// default starts fresh. Returns the number of bytes transferred.
    ///
    /// A driver that is interrupted mid-transfer but can report where it
    /// left off should fail with [`PropagateError::SendfileInterrupted`]
    /// carrying the cursor the next run should resume from; any other
    /// error is treated as non-resumable. Default: unsupported.
    fn sendfile(
        &self,
        _src: &mut Self::Handle,
        _dst: &mut Self::Handle,
        uri: &str,
        _cursor: SendfileCursor,
    ) -> Result<u64> {
        Err(unsupported("sendfile", uri))
    }

    /// Human-readable driver name, for logging.
    fn name(&self) -> &'static str {
        "unknown"
    }
}
