//! Scan tools: inline snippets and files on disk.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::mcp::handler::{
    get_optional_string_arg, get_string_arg, success_result, text_content, ToolHandler,
};
use crate::mcp::protocol::{Tool, ToolResult};
use crate::service::ScanService;
use crate::tools::failure_result;
use crate::tool_schema;
use crate::types::SkippedFile;

/// Scan code tool.
pub struct ScanCodeTool {
    service: Arc<ScanService>,
}

impl ScanCodeTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for ScanCodeTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "scan_code".to_string(),
            description: "Scan a given string of source code for violations against the \
                          currently configured ast-grep rules."
                .to_string(),
            input_schema: tool_schema!(
                required: ["code", "language"],
                "code": {
                    "type": "string",
                    "description": "The raw source code to be scanned."
                },
                "language": {
                    "type": "string",
                    "description": "The programming language of the code (e.g., 'go', 'python')."
                },
                "sgconfig": {
                    "type": "string",
                    "description": "Path to a specific sgconfig.yml, relative to the project root. Defaults to the root sgconfig.yml."
                }
            ),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let code = get_string_arg(&args, "code")?;
        let language = get_string_arg(&args, "language")?;
        let sgconfig = get_optional_string_arg(&args, "sgconfig");

        match self
            .service
            .scan_code(&code, &language, sgconfig.as_deref(), cancel)
            .await
        {
            Ok(output) => Ok(success_result(output)),
            Err(e) => failure_result(e, None),
        }
    }
}

/// Scan path tool.
pub struct ScanPathTool {
    service: Arc<ScanService>,
}

impl ScanPathTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for ScanPathTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "scan_path".to_string(),
            description: "Scan code for rule violations by providing a file path, directory \
                          path, or glob pattern. Returns the engine's JSON array of violations \
                          with file locations, line numbers, and rule details."
                .to_string(),
            input_schema: tool_schema!(
                required: ["path"],
                "path": {
                    "type": "string",
                    "description": "File, directory, or glob pattern relative to the project root. Examples: 'src/main.go', 'src/', '**/*.go', 'internal/**/*.js'."
                },
                "sgconfig": {
                    "type": "string",
                    "description": "Path to a specific sgconfig.yml, relative to the project root. Defaults to 'sgconfig.yml'."
                },
                "language": {
                    "type": "string",
                    "description": "Language filter for directory and pattern scans: 'go', 'python', 'javascript', 'typescript', 'rust', 'java', 'cpp', 'c'."
                }
            ),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let path = get_string_arg(&args, "path")?;
        let sgconfig = get_optional_string_arg(&args, "sgconfig");
        let language = get_optional_string_arg(&args, "language");

        let outcome = match self
            .service
            .scan_path(&path, sgconfig.as_deref(), language.as_deref(), cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return failure_result(e, Some("Error scanning files")),
        };

        let mut result = success_result(outcome.output);
        if !outcome.skipped.is_empty() {
            result.content.push(text_content(skipped_report(&outcome.skipped)));
        }
        Ok(result)
    }
}

/// Human-readable list of files the size ceiling kept out of the scan.
fn skipped_report(skipped: &[SkippedFile]) -> String {
    let mut report = format!(
        "Skipped {} file(s) exceeding the size limit:\n",
        skipped.len()
    );
    for file in skipped {
        report.push_str(&format!("- {} ({} bytes)\n", file.path.display(), file.size));
    }
    report
}
