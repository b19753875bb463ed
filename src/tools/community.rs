//! Community rule registry tools.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::mcp::handler::{
    get_optional_string_arg, get_string_arg, success_result, ToolHandler,
};
use crate::mcp::protocol::{Tool, ToolResult};
use crate::service::{CommunityRuleIndex, RuleDetails, RuleStore};
use crate::tool_schema;
use crate::tools::failure_result;
use crate::types::{CommunityRule, RuleQuery};

const INDEX_FAILURE: &str = "Failed to fetch community rules";
const CONTENT_FAILURE: &str = "Failed to fetch rule content";

fn not_found(rule_id: &str) -> ToolResult {
    success_result(format!(
        "Rule '{}' not found in community repository.",
        rule_id
    ))
}

/// Numbered summary of search matches.
pub fn format_search_results(rules: &[CommunityRule]) -> String {
    if rules.is_empty() {
        return "No community rules found matching your criteria.".to_string();
    }

    let mut out = format!(
        "Found {} community rule(s) matching your criteria:\n\n",
        rules.len()
    );
    for (i, rule) in rules.iter().enumerate() {
        out.push_str(&format!("{}. **{}** ({})\n", i + 1, rule.id, rule.language));
        out.push_str(&format!("   Author: {}\n", rule.author));
        out.push_str(&format!("   Description: {}\n", rule.description));
        if !rule.tags.is_empty() {
            out.push_str(&format!("   Tags: {}\n", rule.tags.join(", ")));
        }
        out.push('\n');
    }
    out
}

/// Metadata block followed by the raw rule document.
pub fn format_rule_details(details: &RuleDetails) -> String {
    let rule = &details.rule;
    let mut out = format!("Rule Details for '{}':\n\n", rule.id);
    out.push_str(&format!("**ID:** {}\n", rule.id));
    out.push_str(&format!("**Tool:** {}\n", rule.tool));
    out.push_str(&format!("**Language:** {}\n", rule.language));
    out.push_str(&format!("**Author:** {}\n", rule.author));
    out.push_str(&format!("**Description:** {}\n", rule.description));
    if !rule.tags.is_empty() {
        out.push_str(&format!("**Tags:** {}\n", rule.tags.join(", ")));
    }
    out.push_str("\n**YAML Content:**\n```yaml\n");
    out.push_str(&details.body);
    out.push_str("\n```\n");
    out
}

/// Search community rules tool.
pub struct SearchCommunityRulesTool {
    index: Arc<CommunityRuleIndex>,
}

impl SearchCommunityRulesTool {
    pub fn new(index: Arc<CommunityRuleIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl ToolHandler for SearchCommunityRulesTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "search_community_rules".to_string(),
            description: "Search the community rule repository for ast-grep rules by free \
                          text, language, and tags."
                .to_string(),
            input_schema: tool_schema!(
                required: ["query"],
                "query": {
                    "type": "string",
                    "description": "Natural language query (e.g., 'sql injection', 'check for todos')"
                },
                "language": {
                    "type": "string",
                    "description": "Programming language (e.g., 'go', 'python')"
                },
                "tags": {
                    "type": "string",
                    "description": "Comma-separated list of tags to filter by (e.g., 'security,database')"
                }
            ),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        // An empty query is allowed and lists everything the filters keep.
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidToolArguments("Missing required argument: query".to_string()))?;
        let language = get_optional_string_arg(&args, "language");
        let tags = get_optional_string_arg(&args, "tags");
        let query = RuleQuery::parse(query, language.as_deref(), tags.as_deref());

        match self.index.search(&query, cancel).await {
            Ok(rules) => Ok(success_result(format_search_results(&rules))),
            Err(e) => failure_result(e, Some(INDEX_FAILURE)),
        }
    }
}

/// Community rule details tool.
pub struct GetCommunityRuleDetailsTool {
    index: Arc<CommunityRuleIndex>,
}

impl GetCommunityRuleDetailsTool {
    pub fn new(index: Arc<CommunityRuleIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl ToolHandler for GetCommunityRuleDetailsTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_community_rule_details".to_string(),
            description: "Get the full YAML content and metadata for a community rule."
                .to_string(),
            input_schema: tool_schema!(
                required: ["rule_id"],
                "rule_id": {
                    "type": "string",
                    "description": "Unique identifier of the rule (e.g., 'ast-grep-go-sql-injection')"
                }
            ),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let rule_id = get_string_arg(&args, "rule_id")?;

        let rule = match self.index.find(&rule_id, cancel).await {
            Ok(rule) => rule,
            Err(Error::RuleNotFound(_)) => return Ok(not_found(&rule_id)),
            Err(e) => return failure_result(e, Some(INDEX_FAILURE)),
        };

        match self.index.fetch_rule_body(&rule, cancel).await {
            Ok(body) => Ok(success_result(format_rule_details(&RuleDetails {
                rule,
                body,
            }))),
            Err(e) => failure_result(e, Some(CONTENT_FAILURE)),
        }
    }
}

/// Import community rule tool.
pub struct ImportCommunityRuleTool {
    index: Arc<CommunityRuleIndex>,
    store: Arc<RuleStore>,
}

impl ImportCommunityRuleTool {
    pub fn new(index: Arc<CommunityRuleIndex>, store: Arc<RuleStore>) -> Self {
        Self { index, store }
    }
}

#[async_trait]
impl ToolHandler for ImportCommunityRuleTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "import_community_rule".to_string(),
            description: "Download a community rule and add it to the local project's rule \
                          directory."
                .to_string(),
            input_schema: tool_schema!(
                required: ["rule_id"],
                "rule_id": {
                    "type": "string",
                    "description": "Unique identifier of the rule to import"
                }
            ),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let rule_id = get_string_arg(&args, "rule_id")?;

        // Resolve the id first so index failures and unknown ids are reported
        // apart from download and validation failures.
        match self.index.find(&rule_id, cancel).await {
            Ok(_) => {}
            Err(Error::RuleNotFound(_)) => return Ok(not_found(&rule_id)),
            Err(e) => return failure_result(e, Some(INDEX_FAILURE)),
        }

        match self.index.import(&rule_id, &self.store, cancel).await {
            Ok(path) => Ok(success_result(format!(
                "Rule '{}' was imported successfully from the community repository to {}.",
                rule_id,
                path.display()
            ))),
            Err(e @ Error::RuleValidation { .. }) => {
                failure_result(e, Some(&format!("Invalid rule file for '{}'", rule_id)))
            }
            Err(e @ (Error::Registry(_) | Error::RegistryStatus { .. } | Error::Http(_))) => {
                failure_result(e, Some(CONTENT_FAILURE))
            }
            Err(e @ Error::Io(_)) => failure_result(e, Some("Error writing rule file")),
            Err(e) => failure_result(e, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::registry::{RegistryFetcher, SystemClock};
    use crate::service::ProjectRootResolver;
    use crate::MARKER_FILE;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const INDEX_URL: &str = "https://registry.test/index.json";
    const BASE_URL: &str = "https://registry.test";

    const INDEX: &str = r#"{
        "version": 1,
        "rules": [
            {
                "id": "ast-grep-go-sql-injection",
                "tool": "ast-grep",
                "path": "ast-grep/rules/go/security/sql-injection.yml",
                "language": "go",
                "author": "hackafterdark",
                "tags": ["security", "database"],
                "description": "Detects SQL injection via fmt.Sprintf"
            },
            {
                "id": "go-broken",
                "tool": "ast-grep",
                "path": "ast-grep/rules/go/broken.yml",
                "language": "go",
                "author": "someone",
                "tags": [],
                "description": "Rule body without a language"
            }
        ]
    }"#;

    const SQL_RULE: &str = "id: ast-grep-go-sql-injection\nlanguage: go\nrule:\n  pattern: fmt.Sprintf($$$)\n";

    struct StaticFetcher {
        bodies: HashMap<String, String>,
    }

    #[async_trait]
    impl RegistryFetcher for StaticFetcher {
        async fn fetch(&self, url: &str, _cancel: &CancellationToken) -> Result<String> {
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| Error::RegistryStatus {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    fn index(bodies: &[(&str, &str)]) -> Arc<CommunityRuleIndex> {
        let fetcher = StaticFetcher {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        };
        Arc::new(CommunityRuleIndex::new(
            Arc::new(fetcher),
            Arc::new(SystemClock),
            Duration::from_secs(300),
            INDEX_URL,
            BASE_URL,
            Metrics::new(),
        ))
    }

    fn full_index() -> Arc<CommunityRuleIndex> {
        index(&[
            (INDEX_URL, INDEX),
            (
                "https://registry.test/ast-grep/rules/go/security/sql-injection.yml",
                SQL_RULE,
            ),
            (
                "https://registry.test/ast-grep/rules/go/broken.yml",
                "id: go-broken\nrule:\n  pattern: x\n",
            ),
        ])
    }

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_search_formats_matches() {
        let tool = SearchCommunityRulesTool::new(full_index());

        let result = tool
            .execute(
                args(&[("query", "sql"), ("language", "go"), ("tags", "Security")]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.text(),
            "Found 1 community rule(s) matching your criteria:\n\n\
             1. **ast-grep-go-sql-injection** (go)\n   \
             Author: hackafterdark\n   \
             Description: Detects SQL injection via fmt.Sprintf\n   \
             Tags: security, database\n\n"
        );
    }

    #[tokio::test]
    async fn test_search_no_results() {
        let tool = SearchCommunityRulesTool::new(full_index());

        let result = tool
            .execute(args(&[("query", "todo")]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.text(), "No community rules found matching your criteria.");
    }

    #[tokio::test]
    async fn test_search_registry_down() {
        let tool = SearchCommunityRulesTool::new(index(&[]));

        let result = tool
            .execute(args(&[("query", "sql")]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(result.text().starts_with("Failed to fetch community rules: "));
    }

    #[tokio::test]
    async fn test_details_include_yaml_body() {
        let tool = GetCommunityRuleDetailsTool::new(full_index());

        let result = tool
            .execute(
                args(&[("rule_id", "ast-grep-go-sql-injection")]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let text = result.text();
        assert!(text.starts_with("Rule Details for 'ast-grep-go-sql-injection':\n\n"));
        assert!(text.contains("**Tool:** ast-grep\n"));
        assert!(text.contains("**Tags:** security, database\n"));
        assert!(text.ends_with(&format!("```yaml\n{}\n```\n", SQL_RULE)));
    }

    #[tokio::test]
    async fn test_details_unknown_rule() {
        let tool = GetCommunityRuleDetailsTool::new(full_index());

        let result = tool
            .execute(args(&[("rule_id", "missing")]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(
            result.text(),
            "Rule 'missing' not found in community repository."
        );
    }

    #[tokio::test]
    async fn test_import_writes_rule_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MARKER_FILE), "ruleDirs:\n  - rules\n").unwrap();
        let store = Arc::new(RuleStore::new(
            ProjectRootResolver::new(Some(temp.path().to_path_buf())),
            Metrics::new(),
        ));
        let tool = ImportCommunityRuleTool::new(full_index(), store);
        let cancel = CancellationToken::new();

        let result = tool
            .execute(args(&[("rule_id", "ast-grep-go-sql-injection")]), &cancel)
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result
            .text()
            .starts_with("Rule 'ast-grep-go-sql-injection' was imported successfully"));
        assert_eq!(
            fs::read_to_string(temp.path().join("rules/sql-injection.yml")).unwrap(),
            SQL_RULE
        );

        let result = tool
            .execute(args(&[("rule_id", "go-broken")]), &cancel)
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text().starts_with("Invalid rule file for 'go-broken'"));
        assert!(!temp.path().join("rules/broken.yml").exists());
    }
}
