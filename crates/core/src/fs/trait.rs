//! FileSystem trait definition

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Type of file system entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// Abstraction over file system operations so that locating, cataloguing and
/// indexing can run against an in-memory tree in tests.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Read first N bytes of file (for binary detection)
    fn read_bytes(&self, path: &Path, max_bytes: usize) -> Result<Vec<u8>>;

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Recursively list regular files below `root`, skipping directories that
    /// match any gitignore-style glob in `excluded_dirs` (e.g. `node_modules`,
    /// `*[Tt]est*`). Paths are sorted.
    fn walk_files(&self, root: &Path, excluded_dirs: &[&str]) -> Result<Vec<PathBuf>>;

    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}
