//! The external scanning engine.
//!
//! Pattern matching is delegated to ast-grep, run as a subprocess. The
//! [`ScanEngine`] trait is the seam: orchestration only needs something that
//! can execute a scan invocation and hand back its raw output.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Binaries tried, in order, when no engine binary is configured.
const DEFAULT_BINARIES: &[&str] = &["ast-grep", "sg"];

/// One engine run over a batch of targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInvocation {
    /// Configuration reference, resolved by the engine against `working_dir`.
    pub config: String,
    pub targets: Vec<PathBuf>,
    /// The project root.
    pub working_dir: PathBuf,
}

impl ScanInvocation {
    /// Engine command-line arguments.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "scan".to_string(),
            "--config".to_string(),
            self.config.clone(),
        ];
        args.extend(
            self.targets
                .iter()
                .map(|target| target.to_string_lossy().into_owned()),
        );
        args.push("--json".to_string());
        args
    }
}

/// Raw result of an engine run.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, unmodified.
    pub output: String,
}

/// Something that can execute a scan batch and return raw output.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Run one invocation.
    ///
    /// A nonzero exit status is not an error: ast-grep exits nonzero when it
    /// finds violations. Only failing to launch the engine is.
    async fn scan(
        &self,
        invocation: &ScanInvocation,
        cancel: &CancellationToken,
    ) -> Result<EngineOutput>;
}

/// ast-grep run as a subprocess.
#[derive(Debug, Clone)]
pub struct AstGrepEngine {
    binary: Option<String>,
    timeout: Duration,
}

impl AstGrepEngine {
    /// Create an engine; `binary` overrides the PATH lookup.
    pub fn new(binary: Option<String>, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    /// Locate the engine executable.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        if let Some(binary) = &self.binary {
            return which::which(binary).map_err(|e| Error::EngineUnavailable {
                binary: binary.clone(),
                reason: e.to_string(),
            });
        }

        DEFAULT_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| Error::EngineUnavailable {
                binary: DEFAULT_BINARIES.join(" or "),
                reason: "not found on PATH; install ast-grep or pass --engine-binary".to_string(),
            })
    }
}

#[async_trait]
impl ScanEngine for AstGrepEngine {
    async fn scan(
        &self,
        invocation: &ScanInvocation,
        cancel: &CancellationToken,
    ) -> Result<EngineOutput> {
        let binary = self.resolve_binary()?;
        debug!(
            "Running {:?} over {} target(s) in {:?}",
            binary,
            invocation.targets.len(),
            invocation.working_dir
        );

        let mut cmd = Command::new(&binary);
        cmd.args(invocation.args())
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| Error::EngineUnavailable {
            binary: binary.display().to_string(),
            reason: e.to_string(),
        })?;

        // Dropping the pending wait kills the child.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Scan cancelled, engine terminated");
                return Err(Error::Cancelled);
            }
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(output) => output?,
                Err(_) => {
                    return Err(Error::Timeout {
                        seconds: self.timeout.as_secs(),
                    })
                }
            },
        };

        if !output.status.success() {
            debug!("Engine exited with {} (violations found or engine error)", output.status);
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(EngineOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}
