//! FileSystem abstraction for testable file operations

mod mock;
mod real;
mod r#trait;

pub use mock::MockFileSystem;
pub use r#trait::{DirEntry, FileSystem, FileType};
pub use real::RealFileSystem;

/// Size of the prefix inspected for NUL bytes when deciding whether a file is binary.
pub const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// Returns true when the first [`BINARY_SNIFF_BYTES`] of the file contain a NUL byte.
pub fn is_binary(fs: &dyn FileSystem, path: &std::path::Path) -> anyhow::Result<bool> {
    let head = fs.read_bytes(path, BINARY_SNIFF_BYTES)?;
    Ok(head.contains(&0))
}

/// Builds a matcher that reports directories matching any of the
/// gitignore-style `patterns` (relative to `root`) as ignored.
pub(crate) fn dir_overrides(
    root: &std::path::Path,
    patterns: &[&str],
) -> anyhow::Result<ignore::overrides::Override> {
    use anyhow::Context;

    let mut builder = ignore::overrides::OverrideBuilder::new(root);
    for pattern in patterns {
        builder
            .add(&format!("!{}/", pattern))
            .context(format!("Invalid exclusion pattern {:?}", pattern))?;
    }
    builder.build().context("Failed to build walk overrides")
}
