//! File discovery and scan result types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A candidate file produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    /// Path handed to the engine: relative to the project root when the file
    /// lives under it, absolute otherwise.
    pub path: PathBuf,
    /// Absolute location used for filesystem checks.
    pub absolute: PathBuf,
    /// Size in bytes at discovery time.
    pub size: u64,
    /// Language inferred from the extension, if recognized.
    pub language: Option<String>,
}

/// A file the size gate refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Partition of a discovered file list by the size ceiling.
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    pub valid: Vec<DiscoveredFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Result of a path scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Raw engine output, or `[]` when there was nothing to scan.
    pub output: String,
    pub scanned: usize,
    pub skipped: Vec<SkippedFile>,
}

impl ScanOutcome {
    /// Outcome for an empty batch.
    pub fn empty(skipped: Vec<SkippedFile>) -> Self {
        Self {
            output: "[]".to_string(),
            scanned: 0,
            skipped,
        }
    }
}
