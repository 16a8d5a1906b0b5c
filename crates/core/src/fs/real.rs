use super::{DirEntry, FileSystem, FileType};
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn file_type_of(path: &Path) -> FileType {
    if path.is_file() {
        FileType::File
    } else if path.is_dir() {
        FileType::Directory
    } else {
        FileType::Symlink
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context(format!("Failed to read file {:?}", path))
    }

    fn read_bytes(&self, path: &Path, max_bytes: usize) -> Result<Vec<u8>> {
        let file = fs::File::open(path).context(format!("Failed to open file {:?}", path))?;
        let mut buffer = Vec::with_capacity(max_bytes);
        file.take(max_bytes as u64)
            .read_to_end(&mut buffer)
            .context(format!("Failed to read bytes from {:?}", path))?;
        Ok(buffer)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let entries = fs::read_dir(path).context(format!("Failed to read directory {:?}", path))?;

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            result.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                file_type: file_type_of(&path),
                path,
            });
        }
        result.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(result)
    }

    fn walk_files(&self, root: &Path, excluded_dirs: &[&str]) -> Result<Vec<PathBuf>> {
        let overrides = super::dir_overrides(root, excluded_dirs)?;

        let mut files = Vec::new();
        for result in WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(root.join(".git").exists())
            .git_global(false)
            .git_exclude(false)
            .overrides(overrides)
            .build()
        {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        Ok(files)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        path.canonicalize()
            .context(format!("Failed to canonicalize path {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let base = dir.path();

        fs::create_dir_all(base.join("orders/src")).unwrap();
        fs::create_dir_all(base.join("orders/node_modules/dep")).unwrap();
        fs::create_dir_all(base.join("orders/src/__tests__")).unwrap();
        fs::write(base.join("orders/src/__tests__/client.test.ts"), "it()").unwrap();
        fs::write(base.join("orders/src/client.ts"), "fetch('http://gateway')").unwrap();
        fs::write(base.join("orders/node_modules/dep/index.js"), "x").unwrap();
        fs::write(base.join("README.md"), "hello world").unwrap();

        dir
    }

    #[test]
    fn test_exists_and_kinds() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        assert!(fs.exists(temp.path()));
        assert!(fs.is_dir(&temp.path().join("orders")));
        assert!(fs.is_file(&temp.path().join("README.md")));
        assert!(!fs.exists(&temp.path().join("nonexistent")));
    }

    #[test]
    fn test_read_bytes() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let bytes = fs.read_bytes(&temp.path().join("README.md"), 5).unwrap();
        assert_eq!(bytes, b"hello");

        let bytes = fs.read_bytes(&temp.path().join("README.md"), 100).unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn test_read_dir() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let entries = fs.read_dir(temp.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name()).collect();

        assert_eq!(names, vec!["README.md", "orders"]);
    }

    #[test]
    fn test_walk_files_honours_exclusions() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let files = fs
            .walk_files(&temp.path().join("orders"), &["node_modules", "*[Tt]est*"])
            .unwrap();

        assert_eq!(files, vec![temp.path().join("orders/src/client.ts")]);
    }
}
