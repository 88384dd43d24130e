//! Durable resume state and the progress callback interface

/// Durable per-entry resume record.
///
/// Identity is the triple `(phash, modtime, md5)`: a lookup only returns a
/// usable record when all three match the entry currently being pushed.
/// Any change invalidates the saved progress and the transfer restarts from
/// scratch.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Key into the owning tree; matches `FileStat::phash`.
    pub phash: u64,
    /// Modification time the progress was recorded against.
    pub modtime: i64,
    /// Identity token the progress was recorded against.
    pub md5: String,
    /// Chunk cursor for `sendfile`-style resumable transfer.
    pub chunk: u64,
    /// Transfer id paired with `chunk` for chunked resume.
    pub transfer_id: u64,
    /// Path of a staged temp file that can be reopened and appended to.
    pub tmpfile: Option<String>,
    /// Number of consecutive failures recorded against this entry.
    pub error: u32,
    /// Message from the most recent failure.
    pub error_string: Option<String>,
}

impl ProgressInfo {
    /// A fresh record for an entry seeing its first failure.
    #[must_use]
    pub fn new(phash: u64, modtime: i64, md5: impl Into<String>) -> Self {
        Self {
            phash,
            modtime,
            md5: md5.into(),
            chunk: 0,
            transfer_id: 0,
            tmpfile: None,
            error: 1,
            error_string: None,
        }
    }

    /// `true` once this record has failed enough times to be blacklisted
    /// for the remainder of the run.
    #[must_use]
    pub fn is_blacklisted(&self) -> bool {
        self.error > 3
    }

    /// Whether `(phash, modtime, md5)` still identifies the same content
    /// this record was saved against.
    #[must_use]
    pub fn matches(&self, phash: u64, modtime: i64, md5: &str) -> bool {
        self.phash == phash && self.modtime == modtime && self.md5 == md5
    }
}

/// Running totals for the whole sync, published to progress callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverallProgress {
    /// Total number of files the sync expects to transfer.
    pub file_count: u64,
    /// Total bytes the sync expects to transfer.
    pub byte_sum: u64,
    /// Index (1-based) of the file currently being transferred.
    pub current_file_no: u64,
    /// Bytes transferred so far across the whole sync.
    pub byte_current: u64,
}

/// The kind of lifecycle event a [`Progress`] notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// Emitted once by `init_progress`, before any transfers start.
    StartSyncSequence,
    /// Emitted once by `finalize_progress`, after all passes complete.
    FinishedSyncSequence,
    /// A file push to the remote replica is starting.
    StartUpload,
    /// A file push to the remote replica finished (success or failure).
    FinishedUpload,
    /// A file push to the local replica is starting.
    StartDownload,
    /// A file push to the local replica finished (success or failure).
    FinishedDownload,
    /// A file removal is starting.
    StartDelete,
    /// A file removal finished.
    EndDelete,
}

/// One progress notification.
#[derive(Debug, Clone)]
pub struct Progress {
    /// What lifecycle point this notification reports.
    pub kind: ProgressKind,
    /// Path of the entry this notification is about, empty for
    /// sync-sequence-level events.
    pub path: String,
    /// Bytes transferred for the current file so far.
    pub curr_bytes: u64,
    /// Size of the current file.
    pub file_size: u64,
    /// Total bytes the whole sync expects to transfer.
    pub overall_transmission_size: u64,
    /// Bytes transferred so far across the whole sync.
    pub current_overall_bytes: u64,
    /// Total number of files the whole sync expects to transfer.
    pub overall_file_count: u64,
    /// Index (1-based) of the file currently being processed.
    pub current_file_no: u64,
}

/// Receives [`Progress`] notifications as the sync proceeds.
///
/// Registering no callback is a valid, zero-cost configuration:
/// `init_progress` skips the counting walk entirely when
/// `PropagateContext::callback` is `None`.
pub trait ProgressCallback {
    /// Called synchronously at each notification point named in
    /// `SPEC_FULL.md` §6. Must not block indefinitely; the propagator makes
    /// no forward progress while this call is in flight.
    fn on_progress(&self, progress: &Progress);
}

#[cfg(test)]
mod tests {
    use super::ProgressInfo;

    #[test]
    fn blacklist_threshold_is_four() {
        let mut pi = ProgressInfo::new(1, 0, "abc");
        pi.error = 3;
        assert!(!pi.is_blacklisted());
        pi.error = 4;
        assert!(pi.is_blacklisted());
    }

    #[test]
    fn matches_requires_all_three_fields() {
        let pi = ProgressInfo::new(1, 100, "abc");
        assert!(pi.matches(1, 100, "abc"));
        assert!(!pi.matches(1, 101, "abc"));
        assert!(!pi.matches(1, 100, "def"));
        assert!(!pi.matches(2, 100, "abc"));
    }
}
