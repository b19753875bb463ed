//! Scan orchestration.
//!
//! [`ScanExecutor`] turns a batch of files (or an inline snippet) into one
//! engine invocation. [`ScanService`] sits on top and runs the full
//! resolve, discover, size-gate, execute pipeline for the scan tools.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::{ScanEngine, ScanInvocation};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::service::discovery::{FileDiscovery, SizeGate};
use crate::service::language::primary_extension;
use crate::service::project::ProjectRootResolver;
use crate::types::ScanOutcome;
use crate::MARKER_FILE;

/// Prefix of the temporary files inline scans are materialized into.
const INLINE_PREFIX: &str = "ast-grep-scan.";

/// Runs the engine over prepared targets.
#[derive(Clone)]
pub struct ScanExecutor {
    engine: Arc<dyn ScanEngine>,
}

impl ScanExecutor {
    pub fn new(engine: Arc<dyn ScanEngine>) -> Self {
        Self { engine }
    }

    /// Scan an explicit list of files in a single engine invocation.
    ///
    /// An empty list never reaches the engine.
    pub async fn scan_files(
        &self,
        files: &[PathBuf],
        config: &str,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if files.is_empty() {
            return Ok("[]".to_string());
        }

        let invocation = ScanInvocation {
            config: config.to_string(),
            targets: files.to_vec(),
            working_dir: root.to_path_buf(),
        };
        let output = self.engine.scan(&invocation, cancel).await?;
        Ok(output.output)
    }

    /// Scan a code snippet by writing it to a temporary file.
    ///
    /// The file is removed when this returns, on every path.
    pub async fn scan_inline(
        &self,
        code: &str,
        language: &str,
        config: &str,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let ext = primary_extension(language).ok_or_else(|| {
            Error::InvalidToolArguments(format!("unsupported language tag: {:?}", language))
        })?;
        let suffix = format!(".{}", ext);
        let mut file = tempfile::Builder::new()
            .prefix(INLINE_PREFIX)
            .suffix(&suffix)
            .tempfile()
            .map_err(Error::TempFile)?;
        file.write_all(code.as_bytes()).map_err(Error::TempFile)?;
        file.flush().map_err(Error::TempFile)?;

        debug!("Inline scan materialized at {:?}", file.path());
        let target = file.path().to_path_buf();
        self.scan_files(&[target], config, root, cancel).await
    }
}

/// The engine configuration to use, defaulting to the marker document.
/// Relative references are resolved against the project root.
fn config_reference(root: &Path, config: Option<&str>) -> Result<String> {
    let config = config
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(MARKER_FILE)
        .to_string();
    if !root.join(&config).is_file() {
        return Err(Error::ConfigFileNotFound(config));
    }
    Ok(config)
}

/// Path and inline scanning against the current project.
#[derive(Clone)]
pub struct ScanService {
    resolver: ProjectRootResolver,
    gate: SizeGate,
    executor: ScanExecutor,
    metrics: Arc<Metrics>,
}

impl ScanService {
    pub fn new(
        resolver: ProjectRootResolver,
        gate: SizeGate,
        engine: Arc<dyn ScanEngine>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            resolver,
            gate,
            executor: ScanExecutor::new(engine),
            metrics,
        }
    }

    /// Scan an inline snippet against the project rules.
    pub async fn scan_code(
        &self,
        code: &str,
        language: &str,
        config: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let root = self.resolver.resolve()?;
        let config = config_reference(&root, config)?;
        let output = self
            .executor
            .scan_inline(code, language, &config, &root, cancel)
            .await?;
        self.metrics.record_scan(1);
        Ok(output)
    }

    /// Scan files selected by a path expression.
    ///
    /// `config` defaults to the marker document and is resolved against the
    /// project root.
    pub async fn scan_path(
        &self,
        path_expr: &str,
        config: Option<&str>,
        language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let root = self.resolver.resolve()?;
        let config = config_reference(&root, config)?;

        let discovery = FileDiscovery::new(root.clone());
        let expr = path_expr.to_string();
        let lang = language.map(str::to_string);
        let files = tokio::task::spawn_blocking(move || discovery.discover(&expr, lang.as_deref()))
            .await
            .map_err(|e| Error::Internal(format!("discovery task failed: {}", e)))??;

        if files.is_empty() {
            debug!("No files matched {:?}", path_expr);
            return Ok(ScanOutcome::empty(Vec::new()));
        }

        let gate = self.gate;
        let outcome = tokio::task::spawn_blocking(move || gate.filter(files))
            .await
            .map_err(|e| Error::Internal(format!("size check task failed: {}", e)))?;
        self.metrics.add_skipped(outcome.skipped.len());

        if outcome.valid.is_empty() {
            info!(
                "All {} matched file(s) exceed the size ceiling",
                outcome.skipped.len()
            );
            return Ok(ScanOutcome::empty(outcome.skipped));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let targets: Vec<PathBuf> = outcome.valid.iter().map(|f| f.path.clone()).collect();
        info!(
            "Scanning {} file(s), {} skipped by size",
            targets.len(),
            outcome.skipped.len()
        );
        let output = self
            .executor
            .scan_files(&targets, &config, &root, cancel)
            .await?;
        self.metrics.record_scan(targets.len());

        Ok(ScanOutcome {
            output,
            scanned: targets.len(),
            skipped: outcome.skipped,
        })
    }
}
