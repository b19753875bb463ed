//! Rule documents in the project's rule directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::service::project::ProjectRootResolver;
use crate::types::RemoveOutcome;

/// Extension of rule documents written by [`RuleStore::add`].
pub const RULE_EXTENSION: &str = "yml";

/// The fields every rule document must carry. Everything else is checked by
/// the engine at scan time.
#[derive(Debug, Deserialize)]
struct RuleHeader {
    #[serde(default)]
    id: String,
    #[serde(default)]
    language: String,
}

/// Minimal structural check of a rule document.
///
/// The document must parse as YAML and carry a non-empty `id` and
/// `language`. The error names the first missing field.
pub fn validate_rule(yaml: &str) -> Result<()> {
    let header: RuleHeader = serde_yaml::from_str(yaml)
        .map_err(|e| Error::rule_validation("document", format!("could not parse YAML: {}", e)))?;

    if header.id.trim().is_empty() {
        return Err(Error::rule_validation("id", "rule 'id' is missing or empty"));
    }
    if header.language.trim().is_empty() {
        return Err(Error::rule_validation(
            "language",
            "rule 'language' is missing or empty",
        ));
    }
    Ok(())
}

/// Reject names that could escape the rule directory.
pub fn validate_file_name(name: &str) -> Result<()> {
    let name_trimmed = name.trim();
    if name_trimmed.is_empty()
        || name_trimmed.contains('/')
        || name_trimmed.contains('\\')
        || name_trimmed.contains("..")
    {
        return Err(Error::InvalidRuleId(name.to_string()));
    }
    Ok(())
}

/// Create, replace and delete rule documents.
#[derive(Clone)]
pub struct RuleStore {
    resolver: ProjectRootResolver,
    metrics: Arc<Metrics>,
}

impl RuleStore {
    pub fn new(resolver: ProjectRootResolver, metrics: Arc<Metrics>) -> Self {
        Self { resolver, metrics }
    }

    /// The active rule directory.
    pub fn rule_dir(&self) -> Result<PathBuf> {
        self.resolver.rule_dir()
    }

    /// Path a rule id is stored under.
    pub fn rule_path(dir: &Path, id: &str) -> PathBuf {
        dir.join(format!("{}.{}", id, RULE_EXTENSION))
    }

    /// Validate and write `<ruleDir>/<id>.yml`, replacing any existing
    /// document.
    pub async fn add(&self, id: &str, yaml: &str) -> Result<PathBuf> {
        validate_file_name(id)?;
        validate_rule(yaml)?;
        self.write_document(&format!("{}.{}", id, RULE_EXTENSION), yaml)
            .await
    }

    /// Write a document under the rule directory by file name.
    ///
    /// Callers validate the content; only the name is checked here.
    pub async fn write_document(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        validate_file_name(file_name)?;
        let dir = self.rule_dir()?;
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(file_name);
        tokio::fs::write(&path, content).await?;
        self.metrics.inc_rules_written();

        info!("Wrote rule document {:?}", path);
        Ok(path)
    }

    /// Delete `<ruleDir>/<id>.yml`. A missing document is reported, not
    /// treated as an error.
    pub async fn remove(&self, id: &str) -> Result<RemoveOutcome> {
        validate_file_name(id)?;
        let path = Self::rule_path(&self.rule_dir()?, id);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed rule document {:?}", path);
                Ok(RemoveOutcome::Removed(path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Rule document {:?} already absent", path);
                Ok(RemoveOutcome::NotFound(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}
