//! MCP server implementation.
//!
//! Each request runs on its own task with a [`CancellationToken`] that
//! `notifications/cancelled` can trigger, so a long scan never blocks the
//! message loop.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mcp::handler::McpHandler;
use crate::mcp::protocol::*;
use crate::mcp::transport::{Message, Transport};
use crate::metrics::{Metrics, Timer};
use crate::VERSION;

const INSTRUCTIONS: &str = "Validate code against the project's ast-grep rules. \
Run initialize_ast_grep once per project, manage rules with add_or_update_rule and \
remove_rule, and use scan_code or scan_path to check code. Community rules can be \
found with search_community_rules and added with import_community_rule.";

/// MCP server.
#[derive(Clone)]
pub struct McpServer {
    handler: Arc<McpHandler>,
    metrics: Arc<Metrics>,
    name: String,
    version: String,
    /// Cancellation tokens of requests still being processed.
    in_flight: Arc<Mutex<HashMap<RequestId, CancellationToken>>>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(handler: Arc<McpHandler>, metrics: Arc<Metrics>, name: impl Into<String>) -> Self {
        Self {
            handler,
            metrics,
            name: name.into(),
            version: VERSION.to_string(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of requests currently being processed.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Run the server with the given transport until the input closes.
    pub async fn run<T: Transport>(&self, mut transport: T) -> Result<()> {
        info!("Starting MCP server: {} v{}", self.name, self.version);

        let (mut incoming, outgoing) = transport.start().await?;
        let mut tasks = JoinSet::new();

        while let Some(msg) = incoming.recv().await {
            while tasks.try_join_next().is_some() {}

            match msg {
                Message::Request(req) => {
                    let cancel = CancellationToken::new();
                    self.in_flight
                        .lock()
                        .await
                        .insert(req.id.clone(), cancel.clone());

                    let server = self.clone();
                    let outgoing = outgoing.clone();
                    tasks.spawn(async move {
                        let id = req.id.clone();
                        let response = server.handle_request(req, &cancel).await;
                        server.in_flight.lock().await.remove(&id);

                        if let Some(response) = response {
                            if outgoing.send(Message::Response(response)).await.is_err() {
                                error!("Failed to send response");
                            }
                        }
                    });
                }
                Message::Notification(notif) => {
                    self.handle_notification(notif).await;
                }
                Message::Response(_) => {
                    warn!("Received unexpected response");
                }
            }
        }

        // Input closed: let in-flight requests finish and flush their replies.
        while tasks.join_next().await.is_some() {}
        drop(outgoing);
        transport.stop().await?;
        info!("MCP server stopped");
        Ok(())
    }

    /// Handle a JSON-RPC request. Returns `None` when the request was
    /// cancelled by the client, which expects no reply.
    pub async fn handle_request(
        &self,
        req: JsonRpcRequest,
        cancel: &CancellationToken,
    ) -> Option<JsonRpcResponse> {
        debug!("Handling request: {} (id: {:?})", req.method, req.id);
        self.metrics.inc_requests();

        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(req.params, cancel).await,
            _ => Err(Error::McpProtocol(format!("Unknown method: {}", req.method))),
        };

        match result {
            Ok(value) => Some(JsonRpcResponse::success(req.id, value)),
            Err(Error::Cancelled) if cancel.is_cancelled() => {
                info!("Request {:?} cancelled by client", req.id);
                None
            }
            Err(e) => {
                self.metrics.inc_failed();
                warn!("Request {:?} ({}) failed: {}", req.id, req.method, e);
                Some(JsonRpcResponse::failure(req.id, error_code(&e), e.to_string()))
            }
        }
    }

    /// Handle a notification.
    pub async fn handle_notification(&self, notif: JsonRpcNotification) {
        debug!("Handling notification: {}", notif.method);

        match notif.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                let Some(params) = notif.params else {
                    return;
                };
                match serde_json::from_value::<CancelledParams>(params) {
                    Ok(cancelled) => {
                        if let Some(token) = self.in_flight.lock().await.get(&cancelled.request_id)
                        {
                            info!(
                                "Cancelling request {:?} ({})",
                                cancelled.request_id,
                                cancelled.reason.as_deref().unwrap_or("no reason given")
                            );
                            token.cancel();
                        } else {
                            debug!("Cancel for unknown request {:?}", cancelled.request_id);
                        }
                    }
                    Err(e) => warn!("Malformed cancellation: {}", e),
                }
            }
            _ => {
                debug!("Unknown notification: {}", notif.method);
            }
        }
    }

    fn handle_initialize(&self) -> Result<Value> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        };

        Ok(serde_json::to_value(result)?)
    }

    fn handle_list_tools(&self) -> Result<Value> {
        let result = ListToolsResult {
            tools: self.handler.list_tools(),
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let params: CallToolParams = params
            .ok_or_else(|| Error::InvalidToolArguments("Missing params".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::InvalidToolArguments(e.to_string()))
            })?;

        let handler = self
            .handler
            .get_tool(&params.name)
            .ok_or_else(|| Error::ToolNotFound(params.name.clone()))?;

        self.metrics.inc_tool_calls();
        let timer = Timer::start();
        let result = handler.execute(params.arguments, cancel).await?;
        if result.is_error {
            self.metrics.inc_tool_errors();
        }
        debug!(
            "Tool {} finished in {} ms (error: {})",
            params.name,
            timer.elapsed_ms(),
            result.is_error
        );

        Ok(serde_json::to_value(result)?)
    }
}

/// JSON-RPC error code for a failed request.
pub fn error_code(error: &Error) -> i32 {
    match error {
        Error::McpProtocol(_) => error_codes::METHOD_NOT_FOUND,
        Error::ToolNotFound(_) | Error::InvalidToolArguments(_) => error_codes::INVALID_PARAMS,
        _ => error_codes::INTERNAL_ERROR,
    }
}
