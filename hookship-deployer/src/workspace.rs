//! Per-run workspaces
//!
//! A [`Workspace`] is a directory exclusively owned by one run. Its path is
//! `<root>/<repository>-<run id>`, so runs for different repositories and
//! successive runs for the same repository never share a path. The
//! directory is removed when the workspace is released or dropped.

use hookship_core::domain::repository::RepositoryRef;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Managed root directory for workspaces
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    path: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates a fresh, empty workspace for one run
    ///
    /// Fails if the directory already exists.
    pub fn allocate(&self, repository: &RepositoryRef, run_id: Uuid) -> io::Result<Workspace> {
        std::fs::create_dir_all(&self.path)?;

        let path = self
            .path
            .join(format!("{}-{}", repository.name(), run_id.simple()));
        std::fs::create_dir(&path)?;

        debug!("Allocated workspace {}", path.display());

        Ok(Workspace {
            path,
            released: false,
        })
    }
}

/// Scoped checkout directory for one run
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the workspace directory, reporting any failure
    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        remove(&self.path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(e) = remove(&self.path) {
            warn!(
                "Failed to remove workspace {} on drop: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn remove(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed workspace {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str) -> RepositoryRef {
        RepositoryRef::new(name, format!("https://src/{}", name)).unwrap()
    }

    #[test]
    fn test_allocate_creates_unique_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path().join("workspaces"));

        let first = root.allocate(&repo("svc-a"), Uuid::new_v4()).unwrap();
        let second = root.allocate(&repo("svc-a"), Uuid::new_v4()).unwrap();

        assert!(first.path().is_dir());
        assert!(second.path().is_dir());
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(root.path()));
        assert!(
            first
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("svc-a-")
        );
    }

    #[test]
    fn test_same_run_id_collides() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path());
        let run_id = Uuid::new_v4();

        let _held = root.allocate(&repo("svc-a"), run_id).unwrap();
        assert!(root.allocate(&repo("svc-a"), run_id).is_err());
    }

    #[test]
    fn test_drop_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path());

        let workspace = root.allocate(&repo("svc-a"), Uuid::new_v4()).unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("Dockerfile"), "FROM scratch\n").unwrap();
        std::fs::create_dir(path.join("src")).unwrap();

        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_release_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path());

        let workspace = root.allocate(&repo("svc-b"), Uuid::new_v4()).unwrap();
        let path = workspace.path().to_path_buf();

        workspace.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_release_tolerates_already_removed_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path());

        let workspace = root.allocate(&repo("svc-c"), Uuid::new_v4()).unwrap();
        std::fs::remove_dir_all(workspace.path()).unwrap();

        assert!(workspace.release().is_ok());
    }
}
