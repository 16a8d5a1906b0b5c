use super::{DirEntry, FileSystem, FileType};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct MockEntry {
    content: Option<Vec<u8>>,
    file_type: FileType,
}

/// In-memory project tree. Relative paths are resolved against the root.
pub struct MockFileSystem {
    files: RwLock<BTreeMap<PathBuf, MockEntry>>,
    root: PathBuf,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/mock"))
    }

    pub fn with_root(root: PathBuf) -> Self {
        let fs = Self {
            files: RwLock::new(BTreeMap::new()),
            root: root.clone(),
        };
        fs.add_dir(&root);
        fs
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        self.insert_file(path.as_ref(), content.as_bytes().to_vec());
    }

    pub fn add_binary(&self, path: impl AsRef<Path>, content: &[u8]) {
        self.insert_file(path.as_ref(), content.to_vec());
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = self.normalize_path(path.as_ref());
        let mut files = self.files.write().unwrap();
        Self::ensure_parents(&mut files, &path);
    }

    fn insert_file(&self, path: &Path, content: Vec<u8>) {
        let path = self.normalize_path(path);
        let mut files = self.files.write().unwrap();

        if let Some(parent) = path.parent() {
            Self::ensure_parents(&mut files, parent);
        }

        files.insert(
            path,
            MockEntry {
                content: Some(content),
                file_type: FileType::File,
            },
        );
    }

    fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn ensure_parents(files: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            files.entry(current.clone()).or_insert(MockEntry {
                content: None,
                file_type: FileType::Directory,
            });
        }
    }

    fn file_type(&self, path: &Path) -> Option<FileType> {
        let path = self.normalize_path(path);
        self.files.read().unwrap().get(&path).map(|e| e.file_type)
    }

    fn content(&self, path: &Path) -> Result<Vec<u8>> {
        let path = self.normalize_path(path);
        let files = self.files.read().unwrap();
        let entry = files
            .get(&path)
            .ok_or_else(|| anyhow!("File not found: {:?}", path))?;

        entry
            .content
            .clone()
            .ok_or_else(|| anyhow!("Not a file: {:?}", path))
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.file_type(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.file_type(path) == Some(FileType::Directory)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.file_type(path) == Some(FileType::File)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.content(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("File {:?} is not UTF-8: {}", path, e))
    }

    fn read_bytes(&self, path: &Path, max_bytes: usize) -> Result<Vec<u8>> {
        let mut bytes = self.content(path)?;
        bytes.truncate(max_bytes);
        Ok(bytes)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let path = self.normalize_path(path);
        let files = self.files.read().unwrap();

        if !files.contains_key(&path) {
            return Err(anyhow!("Directory not found: {:?}", path));
        }

        Ok(files
            .iter()
            .filter(|(file_path, _)| file_path.parent() == Some(path.as_path()))
            .map(|(file_path, entry)| DirEntry {
                path: file_path.clone(),
                name: file_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("")
                    .to_string(),
                file_type: entry.file_type,
            })
            .collect())
    }

    fn walk_files(&self, root: &Path, excluded_dirs: &[&str]) -> Result<Vec<PathBuf>> {
        let root = self.normalize_path(root);
        if !self.is_dir(&root) {
            return Err(anyhow!("Directory not found: {:?}", root));
        }
        let overrides = super::dir_overrides(&root, excluded_dirs)?;

        let files = self.files.read().unwrap();
        Ok(files
            .iter()
            .filter(|(path, entry)| entry.file_type == FileType::File && path.starts_with(&root))
            .filter(|(path, _)| {
                !path
                    .ancestors()
                    .skip(1)
                    .take_while(|dir| *dir != root.as_path())
                    .any(|dir| overrides.matched(dir, true).is_ignore())
            })
            .map(|(path, _)| path.clone())
            .collect())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let normalized = self.normalize_path(path);
        if self.exists(&normalized) {
            Ok(normalized)
        } else {
            Err(anyhow!("Path not found: {:?}", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file() {
        let fs = MockFileSystem::new();
        fs.add_file("test.txt", "hello");

        assert!(fs.exists(Path::new("/mock/test.txt")));
        assert!(fs.is_file(Path::new("/mock/test.txt")));
    }

    #[test]
    fn test_read_to_string() {
        let fs = MockFileSystem::new();
        fs.add_file("test.txt", "hello world");

        let content = fs.read_to_string(Path::new("/mock/test.txt")).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_read_bytes_of_binary() {
        let fs = MockFileSystem::new();
        fs.add_binary("logo.png", &[0x89, 0x50, 0x00, 0x47]);

        let bytes = fs.read_bytes(Path::new("/mock/logo.png"), 3).unwrap();
        assert_eq!(bytes, vec![0x89, 0x50, 0x00]);
        assert!(crate::fs::is_binary(&fs, Path::new("/mock/logo.png")).unwrap());
    }

    #[test]
    fn test_read_dir() {
        let fs = MockFileSystem::new();
        fs.add_dir("subdir");
        fs.add_file("test.txt", "content");
        fs.add_file("subdir/nested.txt", "nested");

        let entries = fs.read_dir(Path::new("/mock")).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name()).collect();

        assert_eq!(names, vec!["subdir", "test.txt"]);
    }

    #[test]
    fn test_walk_files_skips_excluded_dirs() {
        let fs = MockFileSystem::with_root(PathBuf::from("/shop"));
        fs.add_file("orders/src/main.ts", "fetch('http://gateway')");
        fs.add_file("orders/node_modules/left-pad/index.js", "module.exports = 1");
        fs.add_file("orders/src/Tests/client.spec.ts", "it()");
        fs.add_file("orders/package.json", "{}");

        let files = fs
            .walk_files(Path::new("/shop/orders"), &["node_modules", "*[Tt]est*"])
            .unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("/shop/orders/package.json"),
                PathBuf::from("/shop/orders/src/main.ts"),
            ]
        );
    }

    #[test]
    fn test_parent_directories_created() {
        let fs = MockFileSystem::new();
        fs.add_file("a/b/c/file.txt", "content");

        assert!(fs.is_dir(Path::new("/mock/a")));
        assert!(fs.is_dir(Path::new("/mock/a/b/c")));
        assert!(fs.is_file(Path::new("/mock/a/b/c/file.txt")));
    }
}
