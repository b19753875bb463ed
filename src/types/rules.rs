//! Rule documents and community registry types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The marker configuration document (`sgconfig.yml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Rule directories, relative to the directory holding the document.
    #[serde(rename = "ruleDirs", default)]
    pub rule_dirs: Vec<String>,
}

/// A rule in the community repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityRule {
    pub id: String,
    #[serde(default)]
    pub tool: String,
    /// Path of the rule document relative to the registry base.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub author: String,
    /// Matched as a set, displayed in stored order.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl CommunityRule {
    /// Filename the rule is stored under locally (last segment of its path).
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Snapshot of the community `index.json` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityIndex {
    pub version: i64,
    #[serde(default)]
    pub rules: Vec<CommunityRule>,
}

impl CommunityIndex {
    /// Look up a rule by exact id.
    pub fn find(&self, id: &str) -> Option<&CommunityRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }
}

/// Filter criteria for a community rule search.
#[derive(Debug, Clone, Default)]
pub struct RuleQuery {
    /// Free text matched against id, description, and tags.
    pub text: Option<String>,
    pub language: Option<String>,
    /// Every tag must be present on a matching rule.
    pub tags: Vec<String>,
}

impl RuleQuery {
    /// Build a query from raw tool arguments; `tags` is comma-separated.
    pub fn parse(text: &str, language: Option<&str>, tags: Option<&str>) -> Self {
        let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
        let language = language
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty());
        let tags = tags
            .map(|raw| {
                raw.split(',')
                    .map(|tag| tag.trim().to_lowercase())
                    .filter(|tag| !tag.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            text,
            language,
            tags,
        }
    }
}

/// Outcome of removing a rule document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(PathBuf),
    /// The document did not exist; informational, not an error.
    NotFound(PathBuf),
}

/// Outcome of project initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created { config: PathBuf, rules_dir: PathBuf },
    AlreadyInitialized { config: PathBuf },
}
