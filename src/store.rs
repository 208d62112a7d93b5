//! Local mirror store: where each repository lives on disk and whether it is there.

use crate::domain::{LocalMirrorState, RepoId};
use crate::error::VcsError;
use crate::ports::{FileSystem, OsFileSystem, VcsPort};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct MirrorStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    /// Store backed by the real filesystem
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(OsFileSystem))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root / owner_name`
    pub fn path_for(&self, id: &RepoId) -> PathBuf {
        self.root.join(id.dir_name())
    }

    pub fn exists(&self, id: &RepoId) -> bool {
        self.fs.exists(&self.path_for(id))
    }

    /// Resolve the mirror's HEAD, or `Absent` if the directory does not exist
    pub fn state(&self, id: &RepoId, vcs: &dyn VcsPort) -> Result<LocalMirrorState, VcsError> {
        if !self.exists(id) {
            return Ok(LocalMirrorState::Absent);
        }
        vcs.head(&self.path_for(id)).map(LocalMirrorState::Present)
    }

    /// Create the mirror root if needed
    pub fn ensure_root(&self) -> io::Result<()> {
        if !self.fs.exists(&self.root) {
            self.fs.create_dir_all(&self.root)?;
            tracing::info!("Created repositories directory: {}", self.root.display());
        }
        Ok(())
    }

    /// Single delete attempt of a mirror directory
    pub fn remove(&self, id: &RepoId) -> io::Result<()> {
        self.fs.remove_dir_all(&self.path_for(id))
    }
}

impl std::fmt::Debug for MirrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorStore").field("root", &self.root).finish()
    }
}
