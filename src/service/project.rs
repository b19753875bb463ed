//! Project root discovery and the marker configuration document.
//!
//! The project root is the nearest directory, walking upward from the start
//! directory, that directly contains `sgconfig.yml`. It is recomputed for
//! every operation and never cached.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{InitOutcome, MarkerConfig};
use crate::{DEFAULT_RULES_DIR, MARKER_FILE};

/// Locates the project root and reads its marker configuration.
#[derive(Debug, Clone, Default)]
pub struct ProjectRootResolver {
    start_override: Option<PathBuf>,
}

impl ProjectRootResolver {
    /// Create a resolver; an empty override is treated as absent.
    pub fn new(start_override: Option<PathBuf>) -> Self {
        Self {
            start_override: start_override.filter(|p| !p.as_os_str().is_empty()),
        }
    }

    /// The directory the upward walk starts from.
    pub fn start_dir(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Internal(format!("could not get current directory: {}", e)))?;

        Ok(match &self.start_override {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        })
    }

    /// Find the project root.
    pub fn resolve(&self) -> Result<PathBuf> {
        let start = self.start_dir()?;
        find_root_from(&start)
    }

    /// Path of the marker document under a resolved root.
    pub fn marker_path(root: &Path) -> PathBuf {
        root.join(MARKER_FILE)
    }

    /// Read and parse the marker document under `root`.
    pub fn load_config(root: &Path) -> Result<MarkerConfig> {
        let path = Self::marker_path(root);
        let data = fs::read_to_string(&path).map_err(|e| {
            Error::InvalidConfiguration(format!("error reading {}: {}", MARKER_FILE, e))
        })?;

        serde_yaml::from_str(&data).map_err(|e| {
            Error::InvalidConfiguration(format!("error parsing {}: {}", MARKER_FILE, e))
        })
    }

    /// The active rule directory: the first `ruleDirs` entry, resolved
    /// against the project root.
    pub fn rule_dir(&self) -> Result<PathBuf> {
        let root = self.resolve()?;
        let config = Self::load_config(&root)?;

        let first = config
            .rule_dirs
            .first()
            .map(|dir| dir.trim())
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!("ruleDirs not specified in {}", MARKER_FILE))
            })?;

        Ok(root.join(first))
    }

    /// Create a marker document and rule directory at the start directory.
    ///
    /// An existing marker document is never overwritten.
    pub fn initialize(&self) -> Result<InitOutcome> {
        let dir = self.start_dir()?;
        let config = Self::marker_path(&dir);

        if config.exists() {
            info!("Project already initialized at {:?}", dir);
            return Ok(InitOutcome::AlreadyInitialized { config });
        }

        let rules_dir = dir.join(DEFAULT_RULES_DIR);
        fs::create_dir_all(&rules_dir)?;
        fs::write(&config, format!("ruleDirs:\n  - {}\n", DEFAULT_RULES_DIR))?;

        info!("Initialized project at {:?}", dir);
        Ok(InitOutcome::Created { config, rules_dir })
    }
}

/// Walk upward from `start` until a directory containing the marker is found.
pub fn find_root_from(start: &Path) -> Result<PathBuf> {
    let mut dir = start;

    loop {
        if dir.join(MARKER_FILE).is_file() {
            debug!("Project root: {:?}", dir);
            return Ok(dir.to_path_buf());
        }

        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }

    Err(Error::ConfigurationMissing {
        start: start.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_project(dir: &Path, rule_dirs: &str) {
        fs::write(dir.join(MARKER_FILE), rule_dirs).unwrap();
    }

    #[test]
    fn test_resolve_from_nested_descendant() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "ruleDirs:\n  - rules\n");

        let nested = temp.path().join("a/b/c/d/e/f");
        fs::create_dir_all(&nested).unwrap();

        let resolver = ProjectRootResolver::new(Some(nested));
        assert_eq!(resolver.resolve().unwrap(), temp.path());
    }

    #[test]
    fn test_resolve_at_root_itself() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "ruleDirs:\n  - rules\n");

        assert_eq!(find_root_from(temp.path()).unwrap(), temp.path());
    }

    #[test]
    fn test_nearest_marker_wins() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "ruleDirs:\n  - rules\n");
        let inner = temp.path().join("sub");
        fs::create_dir_all(inner.join("deeper")).unwrap();
        init_project(&inner, "ruleDirs:\n  - inner-rules\n");

        assert_eq!(find_root_from(&inner.join("deeper")).unwrap(), inner);
    }

    #[test]
    fn test_missing_marker_is_configuration_missing() {
        let temp = TempDir::new().unwrap();
        let err = find_root_from(temp.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_rule_dir_uses_first_entry() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "ruleDirs:\n  - ' rules '\n  - other\n");

        let resolver = ProjectRootResolver::new(Some(temp.path().to_path_buf()));
        assert_eq!(resolver.rule_dir().unwrap(), temp.path().join("rules"));
    }

    #[test]
    fn test_rule_dir_empty_list_is_invalid() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "ruleDirs: []\n");

        let resolver = ProjectRootResolver::new(Some(temp.path().to_path_buf()));
        let err = resolver.rule_dir().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("ruleDirs not specified"));
    }

    #[test]
    fn test_rule_dir_malformed_yaml_is_invalid() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "ruleDirs: [unterminated\n");

        let resolver = ProjectRootResolver::new(Some(temp.path().to_path_buf()));
        let err = resolver.rule_dir().unwrap_err();
        assert!(err.to_string().contains("error parsing sgconfig.yml"));
    }

    #[test]
    fn test_initialize_creates_layout() {
        let temp = TempDir::new().unwrap();
        let resolver = ProjectRootResolver::new(Some(temp.path().to_path_buf()));

        let outcome = resolver.initialize().unwrap();
        assert!(matches!(outcome, InitOutcome::Created { .. }));
        assert!(temp.path().join("rules").is_dir());
        assert_eq!(resolver.rule_dir().unwrap(), temp.path().join("rules"));
    }

    #[test]
    fn test_initialize_keeps_existing_config() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "ruleDirs:\n  - custom\n");
        let resolver = ProjectRootResolver::new(Some(temp.path().to_path_buf()));

        let outcome = resolver.initialize().unwrap();
        assert!(matches!(outcome, InitOutcome::AlreadyInitialized { .. }));
        assert_eq!(resolver.rule_dir().unwrap(), temp.path().join("custom"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let resolver = ProjectRootResolver::new(Some(PathBuf::new()));
        assert_eq!(
            resolver.start_dir().unwrap(),
            std::env::current_dir().unwrap()
        );
    }
}
