//! The community rule index: cached catalog, search, and import.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::registry::{Clock, IndexCache, RegistryFetcher};
use crate::service::rules::{validate_rule, RuleStore};
use crate::types::{CommunityIndex, CommunityRule, RuleQuery};

/// A community rule together with its document body.
#[derive(Debug, Clone)]
pub struct RuleDetails {
    pub rule: CommunityRule,
    pub body: String,
}

/// Filter `rules` by language, then tags, then free text.
///
/// Order of the input is preserved.
pub fn search_rules<'a>(rules: &'a [CommunityRule], query: &RuleQuery) -> Vec<&'a CommunityRule> {
    let text = query.text.as_ref().map(|t| t.to_lowercase());

    rules
        .iter()
        .filter(|rule| match &query.language {
            Some(language) => rule.language.to_lowercase() == *language,
            None => true,
        })
        .filter(|rule| {
            query.tags.iter().all(|required| {
                rule.tags
                    .iter()
                    .any(|tag| tag.to_lowercase() == required.to_lowercase())
            })
        })
        .filter(|rule| match &text {
            Some(text) => {
                rule.id.to_lowercase().contains(text)
                    || rule.description.to_lowercase().contains(text)
                    || rule.tags.iter().any(|tag| tag.to_lowercase().contains(text))
            }
            None => true,
        })
        .collect()
}

/// Join a registry base URL and a relative rule path.
pub fn rule_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Fetches, caches, and searches the community rule catalog.
pub struct CommunityRuleIndex {
    fetcher: Arc<dyn RegistryFetcher>,
    cache: IndexCache,
    refresh: Mutex<()>,
    index_url: String,
    base_url: String,
    metrics: Arc<Metrics>,
}

impl CommunityRuleIndex {
    pub fn new(
        fetcher: Arc<dyn RegistryFetcher>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        index_url: impl Into<String>,
        base_url: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            fetcher,
            cache: IndexCache::new(ttl, clock),
            refresh: Mutex::new(()),
            index_url: index_url.into(),
            base_url: base_url.into(),
            metrics,
        }
    }

    /// Return the cached index, refreshing it first if it is older than the
    /// TTL. A failed refresh leaves the cache untouched.
    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<Arc<CommunityIndex>> {
        if let Some(index) = self.cache.fresh().await {
            self.metrics.inc_cache_hits();
            return Ok(index);
        }

        // Single flight: whoever waited on the lock re-checks first.
        let _guard = self.refresh.lock().await;
        if let Some(index) = self.cache.fresh().await {
            self.metrics.inc_cache_hits();
            return Ok(index);
        }

        self.metrics.inc_registry_fetches();
        let body = self.fetcher.fetch(&self.index_url, cancel).await?;
        let index: CommunityIndex = serde_json::from_str(&body)
            .map_err(|e| Error::Registry(format!("malformed community index: {}", e)))?;

        info!(
            "Fetched community index v{} with {} rule(s)",
            index.version,
            index.rules.len()
        );
        Ok(self.cache.store(index).await)
    }

    /// Like [`fetch`](Self::fetch), but falls back to a stale snapshot when
    /// the refresh fails.
    pub async fn snapshot(&self, cancel: &CancellationToken) -> Result<Arc<CommunityIndex>> {
        match self.fetch(cancel).await {
            Ok(index) => Ok(index),
            Err(e) if !e.is_hard_fault() => {
                let Some(stale) = self.cache.any().await else {
                    return Err(e);
                };
                let age = self.cache.age().await.unwrap_or_default();
                warn!(
                    "Community index refresh failed ({}); serving snapshot aged {:?}",
                    e, age
                );
                Ok(stale)
            }
            Err(e) => Err(e),
        }
    }

    /// Rules matching `query`, in index order.
    pub async fn search(
        &self,
        query: &RuleQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommunityRule>> {
        let index = self.snapshot(cancel).await?;
        let matches: Vec<CommunityRule> = search_rules(&index.rules, query)
            .into_iter()
            .cloned()
            .collect();
        debug!("Community search matched {} rule(s)", matches.len());
        Ok(matches)
    }

    /// Look up a rule by id.
    pub async fn find(&self, id: &str, cancel: &CancellationToken) -> Result<CommunityRule> {
        let index = self.snapshot(cancel).await?;
        index
            .find(id)
            .cloned()
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))
    }

    /// Download the document body of `rule`.
    pub async fn fetch_rule_body(
        &self,
        rule: &CommunityRule,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if rule.path.trim().is_empty() {
            return Err(Error::Registry(format!(
                "community rule '{}' has no document path",
                rule.id
            )));
        }
        let url = rule_url(&self.base_url, &rule.path);
        self.fetcher.fetch(&url, cancel).await
    }

    /// Metadata and body of a rule.
    pub async fn details(&self, id: &str, cancel: &CancellationToken) -> Result<RuleDetails> {
        let rule = self.find(id, cancel).await?;
        let body = self.fetch_rule_body(&rule, cancel).await?;
        Ok(RuleDetails { rule, body })
    }

    /// Fetch, validate, and store a rule under the file name of its registry
    /// path. Nothing is written unless validation passes.
    pub async fn import(
        &self,
        id: &str,
        store: &RuleStore,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let RuleDetails { rule, body } = self.details(id, cancel).await?;
        validate_rule(&body)?;

        let path = store.write_document(rule.file_name(), &body).await?;
        self.metrics.inc_rules_imported();
        info!("Imported community rule '{}' to {:?}", id, path);
        Ok(path)
    }
}
