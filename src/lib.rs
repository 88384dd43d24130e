//! Propagator: applies a reconciled sync plan between a local filesystem
//! tree and a pluggable remote replica.
//!
//! The reconciler that assigns per-entry instructions and the concrete
//! remote transport are external collaborators; this crate walks the
//! resulting trees and executes them with four properties preserved:
//! crash-safe file transfer (temp-sibling staging plus atomic rename),
//! resumable transfer across runs via durable progress records,
//! bounded-error isolation (a failing entry marks itself and its
//! ancestors without aborting the sync), and deterministic ordering
//! (files, then directories, then deferred directory cleanup).
//!
//! Entry points: [`engine::init_progress`], [`engine::propagate_files`],
//! [`engine::finalize_progress`].

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod hash;
pub mod pathutil;
pub mod progress;
pub mod replica;
pub mod statedb;
pub mod time_fmt;
pub mod tree;
pub mod vio;

pub mod drivers;

pub use config::{Capabilities, Direction, ReplicaKind};
pub use context::PropagateContext;
pub use error::{ErrorClass, PropagateError, Result};
pub use progress::{OverallProgress, Progress, ProgressCallback, ProgressInfo, ProgressKind};
pub use replica::Replica;
pub use statedb::{InMemoryStateDb, StateDb};
pub use tree::{EntryType, FileStat, Instruction, Tree};
pub use vio::{ReplicaDriver, VioFileStat};
