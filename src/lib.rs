//! Pattern Warden MCP Server
//!
//! A Model Context Protocol (MCP) server that lets an agent validate source
//! code against a project's ast-grep ruleset, manage that ruleset, and import
//! rules from a shared community registry.
//!
//! # Architecture
//!
//! 1. **Engine Layer** (`engine`) - The external scanning engine behind a capability trait
//! 2. **Registry Layer** (`registry`) - Remote index transport and the TTL snapshot cache
//! 3. **Service Layer** (`service`) - Project roots, file discovery, scanning, rule storage
//! 4. **MCP Layer** (`mcp`) - Protocol implementation, transport handling
//! 5. **Tools Layer** (`tools`) - The MCP tools exposed to callers
//!
//! Every relative path (configuration, rule directory, scan target) is anchored
//! to the project root: the nearest ancestor directory holding `sgconfig.yml`.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod mcp;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod tools;
pub mod types;

pub use error::{Error, Result};

/// Server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the marker configuration document that defines a project root.
pub const MARKER_FILE: &str = "sgconfig.yml";

/// Rule directory created by project initialization.
pub const DEFAULT_RULES_DIR: &str = "rules";

/// Maximum file size for scanning (1MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Lifetime of a cached community index snapshot.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

/// Raw base address of the community rule repository.
pub const DEFAULT_REGISTRY_BASE_URL: &str =
    "https://raw.githubusercontent.com/hackafterdark/context-sherpa-community-rules/main";

/// Address of the community rule index document.
pub const DEFAULT_REGISTRY_INDEX_URL: &str =
    "https://raw.githubusercontent.com/hackafterdark/context-sherpa-community-rules/main/index.json";
