//! Paths never indexed or scanned for manifests

use ignore::overrides::{Override, OverrideBuilder};
use std::path::Path;
use tracing::warn;

/// Directory globs skipped while walking a project.
pub const DIR_BLACKLIST: &[&str] = &[
    "*[Bb]uild*",
    "*[Dd]atabase*",
    "*[Ss]tatic*",
    "*[Tt]est*",
    "*pipeline*",
    ".circleci",
    ".git",
    ".github",
    ".idea",
    ".ipynb_checkpoints",
    ".mvn",
    ".vs",
    ".vscode",
    "[Ii]mage",
    "[Ii]mages",
    "[Tt]emplate*",
    "bin",
    "node_modules",
    "obj",
    "[Pp]ublic",
    "[Ww]ebroot",
    "wwwroot",
    "target",
    "dist",
    "vendor",
    "__pycache__",
];

/// File globs never indexed.
pub const FILE_BLACKLIST: &[&str] = &[
    "*.sql",
    "*lock*",
    ".*rc",
    ".*rc.*",
    ".DS_Store",
    ".docker*",
    ".editorconfig",
    "mvnw*",
    ".git*",
    ".prettier*",
    ".travis.yml",
    "LICENSE",
    "gradlew*",
    "secrets.dev.yaml",
    "tsconfig.*json",
    "values.dev.yaml",
    ".classpath",
    "*.html",
    "*.css",
    "*.scss",
    "*.js.map",
    "*.css.map",
    "*.min.js",
    "*.svg",
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.pem",
    "*.jar",
    "*_test.go",
];

/// Matcher for [`FILE_BLACKLIST`] rooted at `root`.
pub struct FileBlacklist {
    matcher: Override,
}

impl FileBlacklist {
    pub fn new(root: &Path) -> Self {
        let mut builder = OverrideBuilder::new(root);
        for pattern in FILE_BLACKLIST {
            if let Err(err) = builder.add(&format!("!{}", pattern)) {
                warn!(pattern, error = %err, "Skipping invalid blacklist pattern");
            }
        }
        let matcher = builder.build().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to build file blacklist, indexing every file");
            Override::empty()
        });
        Self { matcher }
    }

    pub fn is_blacklisted(&self, path: &Path) -> bool {
        self.matcher.matched(path, false).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        lock_file = { "/repo/orders/package-lock.json", true },
        stylesheet = { "/repo/web/src/app.css", true },
        go_test = { "/repo/api/client_test.go", true },
        minified = { "/repo/web/vendor.min.js", true },
        source = { "/repo/orders/src/client.ts", false },
        config = { "/repo/orders/application.yml", false },
    )]
    fn test_file_blacklist(path: &str, expected: bool) {
        let blacklist = FileBlacklist::new(Path::new("/repo"));
        assert_eq!(blacklist.is_blacklisted(Path::new(path)), expected);
    }
}
