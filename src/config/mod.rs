//! Configuration management for Pattern Warden.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_MAX_FILE_SIZE, DEFAULT_REGISTRY_BASE_URL,
    DEFAULT_REGISTRY_INDEX_URL,
};

/// Command-line arguments for the Pattern Warden server.
#[derive(Parser, Debug, Clone)]
#[command(name = "pattern-warden")]
#[command(author = "Pattern Warden Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server for validating code against ast-grep rules")]
pub struct Args {
    /// Directory to start the project root search from (defaults to the working directory)
    #[arg(long, env = "PATTERN_WARDEN_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Transport mode: stdio or http
    #[arg(short, long, default_value = "stdio", env = "PATTERN_WARDEN_TRANSPORT")]
    pub transport: Transport,

    /// HTTP port (only for http transport)
    #[arg(short, long, default_value = "3000", env = "PATTERN_WARDEN_PORT")]
    pub port: u16,

    /// Enable debug logging
    #[arg(short, long, env = "PATTERN_WARDEN_DEBUG")]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "PATTERN_WARDEN_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Maximum size of a scanned file (bytes); larger files are skipped
    #[arg(long, default_value = "1048576", env = "PATTERN_WARDEN_MAX_FILE_SIZE")]
    pub max_file_size: u64,

    /// Scanning engine binary (defaults to `ast-grep`, then `sg`, on PATH)
    #[arg(long, env = "PATTERN_WARDEN_ENGINE_BINARY")]
    pub engine_binary: Option<String>,

    /// Deadline for a single engine invocation (seconds)
    #[arg(long, default_value = "120", env = "PATTERN_WARDEN_SCAN_TIMEOUT")]
    pub scan_timeout_secs: u64,

    /// Community rule index URL
    #[arg(long, default_value = DEFAULT_REGISTRY_INDEX_URL, env = "PATTERN_WARDEN_REGISTRY_INDEX_URL")]
    pub registry_index_url: String,

    /// Base URL that community rule paths are resolved against
    #[arg(long, default_value = DEFAULT_REGISTRY_BASE_URL, env = "PATTERN_WARDEN_REGISTRY_BASE_URL")]
    pub registry_base_url: String,

    /// How long a fetched community index stays fresh (seconds)
    #[arg(long, default_value = "300", env = "PATTERN_WARDEN_CACHE_TTL")]
    pub cache_ttl_secs: u64,

    /// Deadline for a single registry request (seconds)
    #[arg(long, default_value = "30", env = "PATTERN_WARDEN_REGISTRY_TIMEOUT")]
    pub registry_timeout_secs: u64,
}

/// Transport mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project root override
    pub project_root: Option<PathBuf>,
    /// Transport mode
    pub transport: Transport,
    /// HTTP port
    pub port: u16,
    /// Debug mode
    pub debug: bool,
    /// Log file
    pub log_file: Option<PathBuf>,
    /// Size ceiling for scanned files
    pub max_file_size: u64,
    /// Engine binary override
    pub engine_binary: Option<String>,
    /// Engine deadline
    pub scan_timeout_secs: u64,
    /// Community index URL
    pub registry_index_url: String,
    /// Community rule base URL
    pub registry_base_url: String,
    /// Index cache TTL
    pub cache_ttl_secs: u64,
    /// Registry request deadline
    pub registry_timeout_secs: u64,
}

impl Config {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            // An empty override means "no override".
            project_root: args.project_root.filter(|p| !p.as_os_str().is_empty()),
            transport: args.transport,
            port: args.port,
            debug: args.debug,
            log_file: args.log_file,
            max_file_size: args.max_file_size,
            engine_binary: args.engine_binary.filter(|b| !b.trim().is_empty()),
            scan_timeout_secs: args.scan_timeout_secs,
            registry_index_url: args.registry_index_url,
            registry_base_url: args.registry_base_url,
            cache_ttl_secs: args.cache_ttl_secs,
            registry_timeout_secs: args.registry_timeout_secs,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: None,
            transport: Transport::Stdio,
            port: 3000,
            debug: false,
            log_file: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            engine_binary: None,
            scan_timeout_secs: 120,
            registry_index_url: DEFAULT_REGISTRY_INDEX_URL.to_string(),
            registry_base_url: DEFAULT_REGISTRY_BASE_URL.to_string(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            registry_timeout_secs: 30,
        }
    }
}
