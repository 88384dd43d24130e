//! The persistent state database interface
//!
//! The database's schema and storage engine are out of scope; the
//! propagator only depends on this lookup/handoff contract. Records the
//! propagator produces during a run are appended to
//! `PropagateContext::progress_info`; the host is responsible for handing
//! that list to a `StateDb` implementation at the end of the sync.

use crate::progress::ProgressInfo;

/// Looks up and releases durable [`ProgressInfo`] records.
pub trait StateDb {
    /// Fetch the progress record for `(phash, modtime, md5)`, if the
    /// database has one matching exactly.
    fn get_progressinfo(&self, phash: u64, modtime: i64, md5: &str) -> Option<ProgressInfo>;

    /// Release a record the caller is done with. The default is a no-op;
    /// in-memory implementations don't need explicit release.
    fn free_progressinfo(&self, _pi: ProgressInfo) {}
}

/// An in-memory [`StateDb`] for tests and the demo binary.
///
/// Real deployments persist records keyed by `phash` across runs; this
/// implementation only lives as long as the process, which is sufficient
/// for exercising the resume logic within a single test.
#[derive(Debug, Default)]
pub struct InMemoryStateDb {
    records: std::cell::RefCell<std::collections::HashMap<u64, ProgressInfo>>,
}

impl InMemoryStateDb {
    /// An empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, as the propagator's end-of-sync handoff
    /// would.
    pub fn put(&self, pi: ProgressInfo) {
        self.records.borrow_mut().insert(pi.phash, pi);
    }

    /// Remove the record for `phash`, if any (a successful run clears it).
    pub fn remove(&self, phash: u64) {
        self.records.borrow_mut().remove(&phash);
    }
}

impl StateDb for InMemoryStateDb {
    fn get_progressinfo(&self, phash: u64, modtime: i64, md5: &str) -> Option<ProgressInfo> {
        let records = self.records.borrow();
        records
            .get(&phash)
            .filter(|pi| pi.matches(phash, modtime, md5))
            .cloned()
    }
}
