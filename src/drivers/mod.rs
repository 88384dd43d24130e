//! Concrete `ReplicaDriver` implementations
//!
//! Out of scope per the specification in general (drivers are external
//! collaborators), but a reference local-filesystem driver is included so
//! the demo binary and the integration tests have something real to run
//! against. Grounded on the teacher's `backends::local::LocalFileSystem`,
//! reimplemented with synchronous `std::fs` calls instead of `compio`.

pub mod local_fs;

pub use local_fs::LocalFsDriver;
