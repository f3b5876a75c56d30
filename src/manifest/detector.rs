//! Manifest and lockfile discovery
//!
//! Features:
//! - Recursive walk from a project root
//! - Skips dependency caches and build outputs (node_modules, target, vendor, ...)
//! - Applies ignore globs, matched against paths relative to the root
//! - Deterministic, sorted output

use super::{recognize, FileFormat};
use crate::error::IoError;
use globset::GlobSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories never descended into
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "vendor",
    "deps",
    "_build",
    "tmp",
];

/// A recognized file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path to the file
    pub path: PathBuf,
    /// Recognized format
    pub format: FileFormat,
}

/// Detect all manifest and lockfile candidates under `root`
///
/// A `root` that is itself a file is returned alone when recognized.
pub fn discover(root: &Path, ignore: &GlobSet) -> Result<Vec<DiscoveredFile>, IoError> {
    if root.is_file() {
        return Ok(recognize(root)
            .map(|format| DiscoveredFile {
                path: root.to_path_buf(),
                format,
            })
            .into_iter()
            .collect());
    }
    if !root.is_dir() {
        return Err(IoError::directory_not_found(root));
    }

    let mut found = Vec::new();
    walk(root, root, ignore, &mut found)?;
    found.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), files = found.len(), "discovered manifest files");
    Ok(found)
}

fn walk(
    root: &Path,
    dir: &Path,
    ignore: &GlobSet,
    found: &mut Vec<DiscoveredFile>,
) -> Result<(), IoError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IoError::generic(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| IoError::generic(dir, e))?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path);
        if ignore.is_match(relative) {
            debug!(path = %relative.display(), "ignored by configuration");
            continue;
        }

        let file_type = entry.file_type().map_err(|e| IoError::generic(&path, e))?;
        if file_type.is_dir() {
            let skipped = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| DEFAULT_SKIP_DIRS.contains(&name));
            if !skipped {
                walk(root, &path, ignore, found)?;
            }
        } else if file_type.is_file() {
            if let Some(format) = recognize(&path) {
                found.push(DiscoveredFile { path, format });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::FileKind;
    use globset::{Glob, GlobSetBuilder};
    use std::fs;
    use tempfile::TempDir;

    fn no_ignore() -> GlobSet {
        GlobSet::empty()
    }

    fn names(files: &[DiscoveredFile], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.strip_prefix(root).unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn test_discover_recursive() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("package.json"), "{}").unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();
        fs::write(root.join("README.md"), "").unwrap();
        fs::create_dir_all(root.join("api")).unwrap();
        fs::write(root.join("api/go.mod"), "module api").unwrap();

        let files = discover(root, &no_ignore()).unwrap();
        assert_eq!(
            names(&files, root),
            vec!["api/go.mod", "package-lock.json", "package.json"]
        );
        assert_eq!(files[1].format.kind, FileKind::Lockfile);
    }

    #[test]
    fn test_discover_skips_dependency_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
        fs::write(root.join("node_modules/left-pad/package.json"), "{}").unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("target/Cargo.toml"), "").unwrap();
        fs::write(root.join("Cargo.toml"), "").unwrap();

        let files = discover(root, &no_ignore()).unwrap();
        assert_eq!(names(&files, root), vec!["Cargo.toml"]);
    }

    #[test]
    fn test_discover_ignore_globs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("examples/demo")).unwrap();
        fs::write(root.join("examples/demo/package.json"), "{}").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();

        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("examples/**").unwrap());
        let ignore = builder.build().unwrap();

        let files = discover(root, &ignore).unwrap();
        assert_eq!(names(&files, root), vec!["package.json"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let err = discover(Path::new("/nonexistent/depshub"), &no_ignore()).unwrap_err();
        assert!(matches!(err, IoError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_discover_single_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("Gemfile");
        fs::write(&file, "").unwrap();
        let files = discover(&file, &no_ignore()).unwrap();
        assert_eq!(files.len(), 1);
    }
}
