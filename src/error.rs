//! Error types for the propagator
//!
//! The propagator's operators never return raw `io::Error` to their callers;
//! every fallible step is classified into [`ErrorClass::Soft`] (the entry is
//! marked `ERROR` and the walk continues) or [`ErrorClass::Fatal`] (the whole
//! `propagate_files` invocation aborts) per the errno table in the design
//! document. [`PropagateError`] carries the underlying cause alongside that
//! classification so callers don't have to re-derive it from an errno.

use thiserror::Error;

/// Result type used throughout the propagator.
pub type Result<T> = std::result::Result<T, PropagateError>;

/// Errors produced while walking trees and pushing files.
#[derive(Debug, Error)]
pub enum PropagateError {
    /// A VIO driver call failed. `message` is the driver's own error string
    /// when it supplied one, otherwise the platform errno string.
    #[error("{operation} on {uri}: {message}")]
    Vio {
        /// What we were trying to do (`open`, `rename`, `stat`, ...).
        operation: &'static str,
        /// The URI the call was made against.
        uri: String,
        /// Driver-supplied or errno-derived message.
        message: String,
        /// The errno the driver call failed with, if known.
        errno: Option<i32>,
    },

    /// The destination changed size or mtime between planning and the
    /// pre-copy stat; the push is skipped rather than risking an overwrite
    /// of data that no longer matches what was reconciled.
    #[error("source {0} changed since planning, skipping")]
    SourceChanged(String),

    /// A write during a buffered transfer wrote fewer bytes than were read.
    #[error("short write to {uri}: wrote {wrote} of {read} bytes")]
    ShortWrite {
        /// Destination URI being written.
        uri: String,
        /// Bytes the driver accepted.
        wrote: usize,
        /// Bytes read from the source.
        read: usize,
    },

    /// Destination size did not match the planned size after a post-copy
    /// stat (`do_post_copy_stat`).
    #[error("post-copy size mismatch for {uri}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Destination URI.
        uri: String,
        /// Size recorded in the plan.
        expected: u64,
        /// Size the destination actually reports.
        actual: u64,
    },

    /// A tmp-file naming loop was detected (ENOENT retried against the same
    /// parent directory twice in a row, or the same basename collided ten
    /// times in a row).
    #[error("giving up after repeated collisions staging {0}")]
    StagingLoop(String),

    /// The entry's progress record has `error > 3`; it is blacklisted for
    /// the remainder of this run.
    #[error("{0} is blacklisted after repeated failures")]
    Blacklisted(String),

    /// The host set `ctx.abort` mid-walk.
    #[error("sync aborted by host")]
    Aborted,

    /// A chunked `sendfile` transfer (§4.2 step 3) was interrupted partway
    /// through; `cursor_transfer_id`/`cursor_chunk` is where the driver left
    /// off, to be saved into `ProgressInfo` and replayed on the next run.
    #[error("sendfile to {uri} interrupted at chunk {cursor_chunk}: {message}")]
    SendfileInterrupted {
        /// Destination URI being written.
        uri: String,
        /// Transfer id to resume with.
        cursor_transfer_id: u64,
        /// Chunk index already written.
        cursor_chunk: u64,
        /// Driver-supplied or errno-derived message.
        message: String,
        /// The errno the driver call failed with, if known.
        errno: Option<i32>,
    },
}

/// Whether an error should stop the whole `propagate_files` invocation, or
/// just mark the offending entry and let the walk continue.
///
/// Mirrors the three-valued C return code (0/1/-1): success has no
/// `ErrorClass`, `Soft` is rc=1, `Fatal` is rc=-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Mark the entry (and its ancestors) `ERROR`; the walk continues.
    Soft,
    /// Abort the current `propagate_files` call entirely.
    Fatal,
}

impl PropagateError {
    /// Build a [`PropagateError::Vio`] from an `io::Error`, preferring a
    /// driver-supplied message when one is given.
    #[must_use]
    pub fn from_io(
        operation: &'static str,
        uri: impl Into<String>,
        driver_message: Option<String>,
        err: &std::io::Error,
    ) -> Self {
        Self::Vio {
            operation,
            uri: uri.into(),
            message: driver_message.unwrap_or_else(|| err.to_string()),
            errno: err.raw_os_error(),
        }
    }

    /// Classify this error per the §7 errno table.
    ///
    /// ENOSPC/EDQUOT are only fatal when they come from closing the
    /// destination handle; operators that hit this case tag the operation
    /// as `"close_destination"` so this classification doesn't need a
    /// separate out-of-band flag threaded through every call site.
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Aborted => ErrorClass::Fatal,
            Self::Vio {
                operation, errno, ..
            } => match errno {
                Some(libc::ENOMEM) => ErrorClass::Fatal,
                Some(libc::ENOSPC | libc::EDQUOT) if *operation == "close_destination" => {
                    ErrorClass::Fatal
                }
                _ => ErrorClass::Soft,
            },
            Self::SendfileInterrupted { errno, .. } => match errno {
                Some(libc::ENOMEM) => ErrorClass::Fatal,
                _ => ErrorClass::Soft,
            },
            _ => ErrorClass::Soft,
        }
    }

    /// `true` if this is the sentinel the driver raises for a user-initiated
    /// abort (errno mapped to `ERRNO_USER_ABORT` in the original source).
    #[must_use]
    pub fn is_user_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
