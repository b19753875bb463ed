//! Prometheus metrics for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total MCP requests processed
    pub requests_total: AtomicU64,
    /// Requests answered with a JSON-RPC error
    pub requests_failed: AtomicU64,
    /// Tool calls
    pub tool_calls: AtomicU64,
    /// Tool calls reported with isError
    pub tool_errors: AtomicU64,
    /// Engine invocations
    pub scans_total: AtomicU64,
    /// Files handed to the engine
    pub files_scanned: AtomicU64,
    /// Files refused by the size ceiling
    pub files_skipped: AtomicU64,
    /// Community index downloads
    pub registry_fetches: AtomicU64,
    /// Index lookups served from the cache
    pub cache_hits: AtomicU64,
    /// Rule documents written or replaced
    pub rules_written: AtomicU64,
    /// Community rules imported
    pub rules_imported: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_calls(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_errors(&self) {
        self.tool_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one engine run over `files` targets.
    pub fn record_scan(&self, files: usize) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
        self.files_scanned.fetch_add(files as u64, Ordering::Relaxed);
    }

    pub fn add_skipped(&self, count: usize) {
        self.files_skipped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn inc_registry_fetches(&self) {
        self.registry_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rules_written(&self) {
        self.rules_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rules_imported(&self) {
        self.rules_imported.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_errors: self.tool_errors.load(Ordering::Relaxed),
            scans_total: self.scans_total.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            registry_fetches: self.registry_fetches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            rules_written: self.rules_written.load(Ordering::Relaxed),
            rules_imported: self.rules_imported.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let counters = [
            ("requests_total", "Total number of MCP requests", s.requests_total),
            ("requests_failed", "Requests answered with a protocol error", s.requests_failed),
            ("tool_calls", "Tool calls count", s.tool_calls),
            ("tool_errors", "Tool calls that reported an error result", s.tool_errors),
            ("scans_total", "Scanning engine invocations", s.scans_total),
            ("files_scanned", "Files handed to the scanning engine", s.files_scanned),
            ("files_skipped", "Files skipped by the size ceiling", s.files_skipped),
            ("registry_fetches", "Community index downloads", s.registry_fetches),
            ("cache_hits", "Community index lookups served from cache", s.cache_hits),
            ("rules_written", "Rule documents written to the rule directory", s.rules_written),
            ("rules_imported", "Community rules imported", s.rules_imported),
        ];

        let mut out = String::new();
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP pattern_warden_{name} {help}\n# TYPE pattern_warden_{name} counter\npattern_warden_{name} {value}\n\n"
            ));
        }
        out
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_failed: u64,
    pub tool_calls: u64,
    pub tool_errors: u64,
    pub scans_total: u64,
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub registry_fetches: u64,
    pub cache_hits: u64,
    pub rules_written: u64,
    pub rules_imported: u64,
}

/// Timer for measuring durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
