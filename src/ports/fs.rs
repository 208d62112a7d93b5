use std::io;
use std::path::Path;

/// Filesystem operations the mirror store needs
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Recursively delete a directory
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}
