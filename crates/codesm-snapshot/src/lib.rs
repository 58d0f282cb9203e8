//! Content-addressed shadow snapshot store backing undo/diff/restore.
//!
//! The store never touches the project's own `.git`; it keeps a separate
//! bare repository under the user's cache directory and uses it purely as
//! a content-addressed object store with a linear commit history.

pub mod backend;
pub mod git;

pub use backend::{FileDiff, GcConfig, GcResult, Patch, SnapshotBackend, SnapshotError, SnapshotId, SnapshotResult};
pub use git::GitSnapshotBackend;
