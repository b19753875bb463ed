//! Local rule management tools.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::mcp::handler::{get_string_arg, success_result, ToolHandler};
use crate::mcp::protocol::{Tool, ToolResult};
use crate::service::{ProjectRootResolver, RuleStore};
use crate::tool_schema;
use crate::tools::failure_result;
use crate::types::{InitOutcome, RemoveOutcome};

const RULE_YAML_HELP: &str = "Complete YAML rule definition, for example:
id: no-sprintf-db
language: go
rule:
  pattern: $DB.Exec(ctx, fmt.Sprintf($$$))
message: \"Use parameterized queries\"
severity: error";

/// Add or update rule tool.
pub struct AddOrUpdateRuleTool {
    store: Arc<RuleStore>,
}

impl AddOrUpdateRuleTool {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for AddOrUpdateRuleTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "add_or_update_rule".to_string(),
            description: "Create or update an ast-grep rule in the project's rule directory. \
                          ast-grep matches syntax trees, so rules can target specific code \
                          patterns, anti-patterns, and security issues such as SQL injection."
                .to_string(),
            input_schema: tool_schema!(
                required: ["rule_id", "rule_yaml"],
                "rule_id": {
                    "type": "string",
                    "description": "Unique identifier for the rule (e.g., 'no-sql-injection'). Used as the file name."
                },
                "rule_yaml": {
                    "type": "string",
                    "description": RULE_YAML_HELP
                }
            ),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let rule_id = get_string_arg(&args, "rule_id")?;
        let rule_yaml = get_string_arg(&args, "rule_yaml")?;

        match self.store.add(&rule_id, &rule_yaml).await {
            Ok(_) => Ok(success_result(format!(
                "Rule '{}' was added or updated successfully.",
                rule_id
            ))),
            Err(e @ Error::RuleValidation { .. }) => {
                failure_result(e, Some(&format!("Invalid rule file for '{}'", rule_id)))
            }
            Err(e @ Error::Io(_)) => failure_result(e, Some("Error writing rule file")),
            Err(e) => failure_result(e, None),
        }
    }
}

/// Remove rule tool.
pub struct RemoveRuleTool {
    store: Arc<RuleStore>,
}

impl RemoveRuleTool {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for RemoveRuleTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "remove_rule".to_string(),
            description: "Remove a specific ast-grep rule file from the local project's rule \
                          directory."
                .to_string(),
            input_schema: tool_schema!(
                required: ["rule_id"],
                "rule_id": {
                    "type": "string",
                    "description": "The ID of the rule to remove (e.g., 'no-sql-injection'). Matches the file name without the .yml extension."
                }
            ),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let rule_id = get_string_arg(&args, "rule_id")?;

        match self.store.remove(&rule_id).await {
            Ok(RemoveOutcome::Removed(_)) => Ok(success_result(format!(
                "Rule '{}' was removed successfully.",
                rule_id
            ))),
            Ok(RemoveOutcome::NotFound(_)) => {
                Ok(success_result(format!("Rule '{}' not found.", rule_id)))
            }
            Err(e @ Error::Io(_)) => failure_result(e, Some("Error removing rule file")),
            Err(e) => failure_result(e, None),
        }
    }
}

/// Initialize project tool.
pub struct InitializeAstGrepTool {
    resolver: ProjectRootResolver,
}

impl InitializeAstGrepTool {
    pub fn new(resolver: ProjectRootResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ToolHandler for InitializeAstGrepTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "initialize_ast_grep".to_string(),
            description: "Set up the current project for ast-grep by creating a default \
                          `sgconfig.yml` file and a `rules/` directory. Required before adding \
                          or importing local rules."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(
        &self,
        _args: HashMap<String, Value>,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let resolver = self.resolver.clone();
        let outcome = tokio::task::spawn_blocking(move || resolver.initialize())
            .await
            .map_err(|e| Error::Internal(format!("initialization task failed: {}", e)))?;

        match outcome {
            Ok(InitOutcome::Created { .. }) => Ok(success_result(
                "ast-grep project initialized successfully. Created sgconfig.yml and rules/ directory.",
            )),
            Ok(InitOutcome::AlreadyInitialized { config }) => Ok(success_result(format!(
                "ast-grep project is already initialized ({} exists); nothing was changed.",
                config.display()
            ))),
            Err(e) => failure_result(e, Some("Error initializing project")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::MARKER_FILE;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const RULE: &str = "id: no-todo\nlanguage: go\nrule:\n  pattern: TODO\n";

    fn tools(root: &std::path::Path) -> (AddOrUpdateRuleTool, RemoveRuleTool, InitializeAstGrepTool) {
        let resolver = ProjectRootResolver::new(Some(root.to_path_buf()));
        let store = Arc::new(RuleStore::new(resolver.clone(), Metrics::new()));
        (
            AddOrUpdateRuleTool::new(store.clone()),
            RemoveRuleTool::new(store),
            InitializeAstGrepTool::new(resolver),
        )
    }

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_add_and_remove() {
        let temp = TempDir::new().unwrap();
        let (add, remove, init) = tools(temp.path());
        let cancel = CancellationToken::new();

        let result = init.execute(HashMap::new(), &cancel).await.unwrap();
        assert!(!result.is_error);
        assert!(result.text().starts_with("ast-grep project initialized successfully"));
        assert!(temp.path().join(MARKER_FILE).is_file());

        let result = add
            .execute(args(&[("rule_id", "no-todo"), ("rule_yaml", RULE)]), &cancel)
            .await
            .unwrap();
        assert_eq!(result.text(), "Rule 'no-todo' was added or updated successfully.");
        assert_eq!(
            fs::read_to_string(temp.path().join("rules/no-todo.yml")).unwrap(),
            RULE
        );

        let result = remove
            .execute(args(&[("rule_id", "no-todo")]), &cancel)
            .await
            .unwrap();
        assert_eq!(result.text(), "Rule 'no-todo' was removed successfully.");

        let result = remove
            .execute(args(&[("rule_id", "no-todo")]), &cancel)
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "Rule 'no-todo' not found.");
    }

    #[tokio::test]
    async fn test_initialize_twice_keeps_existing_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MARKER_FILE), "ruleDirs:\n  - custom\n").unwrap();
        let (_, _, init) = tools(temp.path());

        let result = init
            .execute(HashMap::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.text().contains("already initialized"));
        assert_eq!(
            fs::read_to_string(temp.path().join(MARKER_FILE)).unwrap(),
            "ruleDirs:\n  - custom\n"
        );
    }

    #[tokio::test]
    async fn test_add_invalid_rule_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let (add, _, init) = tools(temp.path());
        let cancel = CancellationToken::new();
        init.execute(HashMap::new(), &cancel).await.unwrap();

        let result = add
            .execute(
                args(&[("rule_id", "broken"), ("rule_yaml", "id: broken\nrule: {}\n")]),
                &cancel,
            )
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(result.text().starts_with("Invalid rule file for 'broken'"));
        assert!(result.text().contains("language"));
        assert!(!temp.path().join("rules/broken.yml").exists());
    }

    #[tokio::test]
    async fn test_add_without_project_suggests_init() {
        let temp = TempDir::new().unwrap();
        let (add, _, _) = tools(temp.path());

        let result = add
            .execute(
                args(&[("rule_id", "no-todo"), ("rule_yaml", RULE)]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(result
            .text()
            .ends_with("Please run the 'initialize_ast_grep' tool first to set up the project."));
    }

    #[tokio::test]
    async fn test_rule_id_cannot_escape_rule_dir() {
        let temp = TempDir::new().unwrap();
        let (add, _, init) = tools(temp.path());
        let cancel = CancellationToken::new();
        init.execute(HashMap::new(), &cancel).await.unwrap();

        let result = add
            .execute(args(&[("rule_id", "../escape"), ("rule_yaml", RULE)]), &cancel)
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(!temp.path().join("escape.yml").exists());
    }
}
