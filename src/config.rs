//! Capability and direction configuration
//!
//! These are declared per replica driver (`Capabilities`) or per sync pass
//! (`Direction`), fixed for the duration of one `propagate_files` call.

/// Which replica is acting as the source for the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local filesystem is the source, remote driver is the destination.
    LocalToRemote,
    /// Remote driver is the source, local filesystem is the destination.
    RemoteToLocal,
}

impl Direction {
    /// `true` when the destination is the remote replica.
    #[must_use]
    pub fn destination_is_remote(self) -> bool {
        matches!(self, Self::LocalToRemote)
    }
}

/// Which replica an entry or URI belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaKind {
    /// The local filesystem.
    Local,
    /// The pluggable remote replica.
    Remote,
}

/// Capabilities a replica driver declares, fixed per driver instance.
///
/// These select which code paths the file transfer engine takes; see
/// `SPEC_FULL.md` §4.2's staging and transport-selection tables.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// The destination driver replaces files atomically itself; no
    /// temp-sibling staging is required for uploads to it.
    pub atomar_copy_support: bool,
    /// The driver supports a `sendfile`-style zero-copy transfer with a
    /// resumable chunk cursor.
    pub use_send_file_to_propagate: bool,
    /// The driver supports a one-shot `put(source, dest)` transfer.
    pub put_support: bool,
    /// The driver supports a one-shot `get(dest, source)` transfer.
    pub get_support: bool,
    /// After a transfer, re-stat the destination to confirm size and
    /// refresh the identity token.
    pub do_post_copy_stat: bool,
}

impl Capabilities {
    /// No optional transports, no atomic replace, no post-copy stat.
    /// Suitable for a plain local filesystem driver.
    #[must_use]
    pub fn local_fs() -> Self {
        Self {
            atomar_copy_support: false,
            use_send_file_to_propagate: false,
            put_support: false,
            get_support: false,
            do_post_copy_stat: false,
        }
    }
}

/// `true` when the current process is running as root.
///
/// `chown` is only attempted when this holds (§4.2 step 4, §4.3, §4.4):
/// a non-root run has no business reassigning ownership, and most
/// filesystems reject the attempt outright.
#[must_use]
pub fn running_as_root() -> bool {
    // SAFETY: `geteuid` takes no arguments and cannot fail.
    unsafe { libc::geteuid() == 0 }
}
