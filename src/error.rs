//! Error types for the Pattern Warden MCP server.

use thiserror::Error;

/// Result type alias for Pattern Warden operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Pattern Warden.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Project Errors =====
    #[error("sgconfig.yml not found in {start} or any parent directory")]
    ConfigurationMissing { start: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration file '{0}' not found")]
    ConfigFileNotFound(String),

    // ===== Discovery Errors =====
    #[error("File discovery failed: {0}")]
    Discovery(#[from] walkdir::Error),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // ===== Engine Errors =====
    #[error("Scanning engine unavailable ({binary}): {reason}")]
    EngineUnavailable { binary: String, reason: String },

    #[error("Could not create temporary scan file: {0}")]
    TempFile(#[source] std::io::Error),

    // ===== Rule Errors =====
    #[error("Invalid rule: {reason}")]
    RuleValidation { field: String, reason: String },

    #[error("Invalid rule id '{0}': must be a plain name without path separators")]
    InvalidRuleId(String),

    #[error("Rule '{0}' not found in community repository")]
    RuleNotFound(String),

    // ===== Registry Errors =====
    #[error("Registry unavailable: {0}")]
    Registry(String),

    #[error("Registry returned HTTP {status} for {url}")]
    RegistryStatus { status: u16, url: String },

    // ===== MCP Errors =====
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP server error: {0}")]
    HttpServer(String),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Timeout: operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Cancelled: operation was cancelled")]
    Cancelled,
}

impl Error {
    /// Create a rule validation error for a specific field.
    pub fn rule_validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RuleValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Failures that abort the operation as a protocol-level fault instead of
    /// being reported inside the tool result.
    pub fn is_hard_fault(&self) -> bool {
        matches!(
            self,
            Self::EngineUnavailable { .. } | Self::TempFile(_) | Self::Cancelled | Self::Internal(_)
        )
    }

    /// Check if the caller can fix the condition and retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConfigurationMissing { .. }
            | Self::InvalidConfiguration(_)
            | Self::ConfigFileNotFound(_)
            | Self::RuleValidation { .. }
            | Self::InvalidRuleId(_)
            | Self::RuleNotFound(_)
            | Self::Registry(_)
            | Self::RegistryStatus { .. }
            | Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_decode(),
            _ => false,
        }
    }

    /// Registry failures worth retrying: server errors, rate limiting, and
    /// connection problems.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RegistryStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Errors that mean the project has not been set up yet.
    pub fn needs_initialization(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationMissing { .. } | Self::ConfigFileNotFound(_)
        )
    }
}
