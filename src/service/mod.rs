//! Service layer for Pattern Warden.
//!
//! This module holds the operations behind the MCP tools: project discovery,
//! scanning, rule management and the community registry.

pub mod community;
pub mod discovery;
pub mod language;
pub mod project;
pub mod rules;
pub mod scanner;

pub use community::{CommunityRuleIndex, RuleDetails};
pub use discovery::{FileDiscovery, SizeGate};
pub use project::ProjectRootResolver;
pub use rules::RuleStore;
pub use scanner::{ScanExecutor, ScanService};

use std::sync::Arc;

use crate::config::Config;
use crate::engine::{AstGrepEngine, ScanEngine};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::registry::{Clock, HttpRegistryClient, RegistryFetcher, SystemClock};

/// Every service the tools need, built from one configuration.
#[derive(Clone)]
pub struct Services {
    pub resolver: ProjectRootResolver,
    pub scans: Arc<ScanService>,
    pub rules: Arc<RuleStore>,
    pub community: Arc<CommunityRuleIndex>,
    pub metrics: Arc<Metrics>,
}

impl Services {
    /// Build services backed by ast-grep and the HTTP registry.
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let engine = Arc::new(AstGrepEngine::new(
            config.engine_binary.clone(),
            config.scan_timeout(),
        ));
        let fetcher = Arc::new(HttpRegistryClient::new(config.registry_timeout())?);
        Ok(Self::with_capabilities(
            config,
            engine,
            fetcher,
            Arc::new(SystemClock),
            metrics,
        ))
    }

    /// Build services over explicit engine, fetcher and clock.
    pub fn with_capabilities(
        config: &Config,
        engine: Arc<dyn ScanEngine>,
        fetcher: Arc<dyn RegistryFetcher>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let resolver = ProjectRootResolver::new(config.project_root.clone());

        Self {
            scans: Arc::new(ScanService::new(
                resolver.clone(),
                SizeGate::new(config.max_file_size),
                engine,
                metrics.clone(),
            )),
            rules: Arc::new(RuleStore::new(resolver.clone(), metrics.clone())),
            community: Arc::new(CommunityRuleIndex::new(
                fetcher,
                clock,
                config.cache_ttl(),
                config.registry_index_url.clone(),
                config.registry_base_url.clone(),
                metrics.clone(),
            )),
            resolver,
            metrics,
        }
    }
}
