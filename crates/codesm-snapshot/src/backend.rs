//! Trait definition, error, and config types for the snapshot store.

use std::path::{Path, PathBuf};

pub type SnapshotId = String;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("filesystem error: {0}")]
    Filesystem(String),
    #[error("shadow repository error: {0}")]
    Repository(String),
    #[error("snapshot not found: {0}")]
    NotFound(String),
    #[error("invalid snapshot id: {0}")]
    InvalidSnapshotId(String),
    #[error("background task panicked")]
    TaskPanicked,
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// A set of changed paths bound to the snapshot they were compared against.
#[derive(Debug, Clone)]
pub struct Patch {
    pub from: SnapshotId,
    pub changed_files: Vec<PathBuf>,
}

/// Exact before/after text and numstat counts for one changed file.
/// Binary files carry empty texts and zero counts.
#[derive(Debug, Clone, Default)]
pub struct FileDiff {
    pub path: PathBuf,
    pub before: String,
    pub after: String,
    pub additions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone)]
pub struct GcConfig {
    pub max_snapshots: Option<usize>,
    pub max_age_days: Option<u64>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            max_snapshots: Some(100),
            max_age_days: Some(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GcResult {
    pub removed_count: usize,
    pub remaining_count: usize,
}

/// A content-addressed shadow history of one working directory.
///
/// Implementations must never let a failure propagate into the calling
/// tool: callers that cannot get a snapshot hash should still be able to
/// perform their mutation, just without undo capability.
pub trait SnapshotBackend: Send + Sync {
    fn is_available(&self, worktree: &Path) -> bool;

    /// Stages the working tree and returns a deterministic content hash.
    /// Calling `track` again without changes returns the same hash.
    fn track(&self, worktree: &Path) -> SnapshotResult<SnapshotId>;

    /// Paths that differ between two snapshots.
    fn diff_paths(&self, worktree: &Path, from: &SnapshotId, to: &SnapshotId) -> SnapshotResult<Vec<PathBuf>>;

    /// Unified diff text between a snapshot and the current working tree.
    fn diff_text(&self, worktree: &Path, from: &SnapshotId) -> SnapshotResult<String>;

    /// Exact before/after text and numstat for each changed path between two snapshots.
    fn diff_full(&self, worktree: &Path, from: &SnapshotId, to: &SnapshotId) -> SnapshotResult<Vec<FileDiff>>;

    /// Overwrites the whole working tree to match `snapshot`.
    fn restore(&self, worktree: &Path, snapshot: &SnapshotId) -> SnapshotResult<()>;

    /// Restores only the listed paths, each from the snapshot in its own patch.
    fn revert_files(&self, worktree: &Path, patches: &[(SnapshotId, PathBuf)]) -> SnapshotResult<Vec<PathBuf>>;

    fn gc(&self, worktree: &Path, config: &GcConfig) -> SnapshotResult<GcResult>;

    fn cleanup(&self, worktree: &Path) -> SnapshotResult<()>;
}
