//! File discovery and size filtering for path scans.
//!
//! A path expression resolves, in order, to a single file, a directory tree,
//! or a glob pattern matched against the files under the project root (or,
//! for an absolute pattern, under its literal directory prefix).

use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::service::language::{language_for_path, matches_language};
use crate::types::{DiscoveredFile, GateOutcome, SkippedFile};
use crate::DEFAULT_MAX_FILE_SIZE;

/// `*` and `?` stay within one path segment; a whole `**` segment spans
/// any number of directories.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Resolves path expressions into candidate files under a base directory.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    base: PathBuf,
}

impl FileDiscovery {
    /// Create a discovery engine anchored at `base` (the project root).
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `path_expr` into an ordered list of files.
    ///
    /// A nonexistent path without glob characters yields an empty list.
    /// Relative patterns match below the base; absolute patterns are walked
    /// from their leading literal directories, which may lie outside it.
    /// Walk errors (permissions, I/O, link loops) are returned as errors.
    pub fn discover(&self, path_expr: &str, language: Option<&str>) -> Result<Vec<DiscoveredFile>> {
        let expr = path_expr.trim();
        if expr.is_empty() {
            return Err(Error::InvalidPath("path must not be empty".to_string()));
        }
        let language = language.map(str::trim).filter(|l| !l.is_empty());

        let target = self.base.join(expr);
        if let Ok(meta) = fs::metadata(&target) {
            if !meta.is_dir() {
                debug!("Discovery: direct file {:?}", target);
                if !passes_filter(&target, language) {
                    return Ok(Vec::new());
                }
                return Ok(vec![self.describe(&target, meta.len())]);
            }

            debug!("Discovery: walking directory {:?}", target);
            return self.walk(&target, |path| passes_filter(path, language));
        }

        if !has_glob_chars(expr) {
            debug!("Discovery: {:?} does not exist", target);
            return Ok(Vec::new());
        }

        let pattern = Pattern::new(&normalize_pattern(expr))?;
        let absolute = Path::new(expr).is_absolute();
        let root = if absolute {
            literal_prefix(expr)
        } else {
            self.base.clone()
        };
        if !root.is_dir() {
            debug!("Discovery: pattern root {:?} does not exist", root);
            return Ok(Vec::new());
        }
        debug!("Discovery: matching pattern {:?} under {:?}", pattern.as_str(), root);

        let base = self.base.clone();
        self.walk(&root, |path| {
            let candidate = if absolute {
                to_slash(path)
            } else {
                to_slash(path.strip_prefix(&base).unwrap_or(path))
            };
            pattern.matches_with(&candidate, GLOB_OPTIONS) && passes_filter(path, language)
        })
    }

    fn walk<F>(&self, root: &Path, mut keep: F) -> Result<Vec<DiscoveredFile>>
    where
        F: FnMut(&Path) -> bool,
    {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            if !keep(entry.path()) {
                continue;
            }
            let size = entry.metadata()?.len();
            files.push(self.describe(entry.path(), size));
        }

        Ok(files)
    }

    fn describe(&self, absolute: &Path, size: u64) -> DiscoveredFile {
        let path = absolute
            .strip_prefix(&self.base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| absolute.to_path_buf());

        DiscoveredFile {
            path,
            absolute: absolute.to_path_buf(),
            size,
            language: language_for_path(absolute).map(String::from),
        }
    }
}

fn passes_filter(path: &Path, language: Option<&str>) -> bool {
    language.map_or(true, |lang| matches_language(path, lang))
}

fn has_glob_chars(expr: &str) -> bool {
    expr.contains(['*', '?', '['])
}

/// Leading components of `expr` that contain no glob characters.
fn literal_prefix(expr: &str) -> PathBuf {
    Path::new(expr)
        .components()
        .take_while(|c| !has_glob_chars(&c.as_os_str().to_string_lossy()))
        .collect()
}

/// Strip a leading `./` so patterns line up with root-relative paths.
fn normalize_pattern(expr: &str) -> String {
    let mut expr = expr;
    while let Some(rest) = expr.strip_prefix("./") {
        expr = rest;
    }
    expr.replace('\\', "/")
}

fn to_slash(path: &Path) -> String {
    let mut parts = Vec::new();
    let mut rooted = false;
    for component in path.components() {
        match component {
            Component::RootDir => rooted = true,
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy()),
            Component::CurDir | Component::ParentDir => {}
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Partitions discovered files by a byte-size ceiling.
#[derive(Debug, Clone, Copy)]
pub struct SizeGate {
    ceiling: u64,
}

impl SizeGate {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Re-stat each file; anything above the ceiling is skipped, anything
    /// that vanished since discovery is dropped from both lists.
    pub fn filter(&self, files: Vec<DiscoveredFile>) -> GateOutcome {
        let mut outcome = GateOutcome::default();

        for mut file in files {
            let size = match fs::metadata(&file.absolute) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!("Could not stat file {:?}: {}", file.path, e);
                    continue;
                }
            };

            if size > self.ceiling {
                debug!(
                    "Skipping file {:?} (size: {} bytes > {} byte limit)",
                    file.path, size, self.ceiling
                );
                outcome.skipped.push(SkippedFile {
                    path: file.path,
                    size,
                });
                continue;
            }

            file.size = size;
            outcome.valid.push(file);
        }

        outcome
    }
}

impl Default for SizeGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, size: usize) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; size]).unwrap();
    }

    fn paths(files: &[DiscoveredFile]) -> Vec<String> {
        files.iter().map(|f| to_slash(&f.path)).collect()
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "main.go", 10);
        write(temp.path(), "util.py", 10);
        write(temp.path(), "README.md", 10);
        write(temp.path(), "internal/server.go", 10);
        write(temp.path(), "internal/server_test.go", 10);
        write(temp.path(), "internal/deep/handler.go", 10);
        write(temp.path(), "web/app.js", 10);
        temp
    }

    #[test]
    fn test_directory_with_language_filter() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let files = discovery.discover(".", Some("go")).unwrap();
        assert_eq!(files.len(), 4);
        for file in &files {
            assert!(matches_language(&file.path, "go"));
            assert_eq!(file.language.as_deref(), Some("go"));
        }
    }

    #[test]
    fn test_directory_without_filter_returns_everything() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let files = discovery.discover(".", None).unwrap();
        assert_eq!(files.len(), 7);
        assert!(paths(&files).contains(&"README.md".to_string()));
    }

    #[test]
    fn test_subdirectory_walk_is_relative_to_base() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let files = discovery.discover("internal", None).unwrap();
        assert_eq!(
            paths(&files),
            vec![
                "internal/deep/handler.go",
                "internal/server.go",
                "internal/server_test.go"
            ]
        );
    }

    #[test]
    fn test_single_file() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let files = discovery.discover("main.go", None).unwrap();
        assert_eq!(paths(&files), vec!["main.go"]);
        assert_eq!(files[0].size, 10);
        assert_eq!(files[0].absolute, temp.path().join("main.go"));

        let excluded = discovery.discover("main.go", Some("python")).unwrap();
        assert!(excluded.is_empty());
    }

    #[test]
    fn test_absolute_file_path() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let absolute = temp.path().join("util.py");
        let files = discovery
            .discover(absolute.to_str().unwrap(), Some("python"))
            .unwrap();
        assert_eq!(paths(&files), vec!["util.py"]);
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("empty")).unwrap();
        let discovery = FileDiscovery::new(temp.path());

        assert!(discovery.discover("empty", None).unwrap().is_empty());
    }

    #[test]
    fn test_nonexistent_path_is_empty() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        assert!(discovery.discover("does/not/exist.go", None).unwrap().is_empty());
    }

    #[test]
    fn test_empty_expression_is_invalid() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        assert!(matches!(
            discovery.discover("   ", None),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_single_level_glob() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let files = discovery.discover("*.go", None).unwrap();
        assert_eq!(paths(&files), vec!["main.go"]);

        let files = discovery.discover("internal/*.go", None).unwrap();
        assert_eq!(
            paths(&files),
            vec!["internal/server.go", "internal/server_test.go"]
        );
    }

    #[test]
    fn test_recursive_glob() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let files = discovery.discover("**/*.go", None).unwrap();
        assert_eq!(
            paths(&files),
            vec![
                "internal/deep/handler.go",
                "internal/server.go",
                "internal/server_test.go",
                "main.go"
            ]
        );

        let files = discovery.discover("./internal/**/*_test.go", None).unwrap();
        assert_eq!(paths(&files), vec!["internal/server_test.go"]);
    }

    #[test]
    fn test_glob_with_language_filter() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        let files = discovery.discover("**/*", Some("javascript")).unwrap();
        assert_eq!(paths(&files), vec!["web/app.js"]);
    }

    #[test]
    fn test_absolute_glob_outside_base() {
        let project = fixture();
        let other = fixture();
        let discovery = FileDiscovery::new(project.path());

        let pattern = format!("{}/internal/**/*.go", to_slash(other.path()));
        let files = discovery.discover(&pattern, None).unwrap();
        assert_eq!(files.len(), 3);
        for file in &files {
            assert!(file.absolute.starts_with(other.path()));
            assert!(file.path.is_absolute());
        }

        let pattern = format!("{}/*.go", to_slash(project.path()));
        let files = discovery.discover(&pattern, None).unwrap();
        assert_eq!(paths(&files), vec!["main.go"]);

        let pattern = format!("{}/missing/**/*.go", to_slash(other.path()));
        assert!(discovery.discover(&pattern, None).unwrap().is_empty());
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("/srv/app/**/*.go"), PathBuf::from("/srv/app"));
        assert_eq!(literal_prefix("/srv/a?p/x.go"), PathBuf::from("/srv"));
        assert_eq!(literal_prefix("/*.go"), PathBuf::from("/"));
    }

    #[test]
    fn test_invalid_glob_pattern() {
        let temp = fixture();
        let discovery = FileDiscovery::new(temp.path());

        assert!(matches!(
            discovery.discover("src/[abc", None),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_discovery_error() {
        let temp = fixture();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("internal/loop")).unwrap();
        let discovery = FileDiscovery::new(temp.path());

        assert!(matches!(
            discovery.discover(".", None),
            Err(Error::Discovery(_))
        ));
        assert!(matches!(
            discovery.discover("**/*.go", None),
            Err(Error::Discovery(_))
        ));
    }

    #[test]
    fn test_size_gate_partitions_by_ceiling() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "small.go", 100);
        write(temp.path(), "exact.go", 1024);
        write(temp.path(), "large.go", 1025);
        let files = FileDiscovery::new(temp.path()).discover(".", None).unwrap();

        let outcome = SizeGate::new(1024).filter(files);
        assert_eq!(paths(&outcome.valid), vec!["exact.go", "small.go"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].path, PathBuf::from("large.go"));
        assert_eq!(outcome.skipped[0].size, 1025);
    }

    #[test]
    fn test_size_gate_drops_vanished_files() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "keep.go", 10);
        write(temp.path(), "gone.go", 10);
        let files = FileDiscovery::new(temp.path()).discover(".", None).unwrap();
        fs::remove_file(temp.path().join("gone.go")).unwrap();

        let outcome = SizeGate::default().filter(files);
        assert_eq!(paths(&outcome.valid), vec!["keep.go"]);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_size_gate_uses_current_size() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "grows.go", 10);
        let files = FileDiscovery::new(temp.path()).discover(".", None).unwrap();
        write(temp.path(), "grows.go", 2048);

        let outcome = SizeGate::new(1024).filter(files);
        assert!(outcome.valid.is_empty());
        assert_eq!(outcome.skipped[0].size, 2048);
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("a/b/c.go")), "a/b/c.go");
        assert_eq!(to_slash(Path::new("/tmp/x.go")), "/tmp/x.go");
        assert_eq!(to_slash(Path::new("./a/./b")), "a/b");
    }
}
