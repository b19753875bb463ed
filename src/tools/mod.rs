//! MCP tool implementations.
//!
//! - `scan` - Inline and path scans (2 tools)
//! - `rules` - Local rule management and project setup (3 tools)
//! - `community` - Community rule registry (3 tools)

pub mod community;
pub mod rules;
pub mod scan;

use tracing::warn;

use crate::error::{Error, Result};
use crate::mcp::handler::{error_result, McpHandler};
use crate::mcp::protocol::ToolResult;
use crate::service::Services;

/// Hint appended when the project has not been set up yet.
pub const INIT_HINT: &str =
    "Please run the 'initialize_ast_grep' tool first to set up the project.";

/// Register all tools with the handler.
pub fn register_all_tools(handler: &mut McpHandler, services: &Services) {
    // Scan tools (2)
    handler.register(scan::ScanCodeTool::new(services.scans.clone()));
    handler.register(scan::ScanPathTool::new(services.scans.clone()));

    // Rule tools (3)
    handler.register(rules::AddOrUpdateRuleTool::new(services.rules.clone()));
    handler.register(rules::RemoveRuleTool::new(services.rules.clone()));
    handler.register(rules::InitializeAstGrepTool::new(services.resolver.clone()));

    // Community tools (3)
    handler.register(community::SearchCommunityRulesTool::new(
        services.community.clone(),
    ));
    handler.register(community::GetCommunityRuleDetailsTool::new(
        services.community.clone(),
    ));
    handler.register(community::ImportCommunityRuleTool::new(
        services.community.clone(),
        services.rules.clone(),
    ));
}

/// Turn a service failure into a tool outcome.
///
/// Hard faults propagate as protocol errors. Everything else is reported in
/// the result with `isError` set, prefixed by `context` when given.
pub fn failure_result(error: Error, context: Option<&str>) -> Result<ToolResult> {
    if error.is_hard_fault() {
        return Err(error);
    }
    warn!("Tool failed: {}", error);

    let text = if error.needs_initialization() {
        format!("Error: {}. {}", error, INIT_HINT)
    } else {
        match context {
            Some(context) => format!("{}: {}", context, error),
            None => error.to_string(),
        }
    };
    Ok(error_result(text))
}
