//! HTTP transport for web-based clients.
//!
//! Exposes the same tools as the stdio server, plus health and Prometheus
//! metrics endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mcp::handler::McpHandler;
use crate::mcp::protocol::*;
use crate::metrics::Metrics;

/// HTTP server state.
#[derive(Clone)]
pub struct HttpState {
    handler: Arc<McpHandler>,
    metrics: Arc<Metrics>,
    server_info: ServerInfo,
    started_at: DateTime<Utc>,
}

impl HttpState {
    pub fn new(handler: Arc<McpHandler>, metrics: Arc<Metrics>) -> Self {
        Self {
            handler,
            metrics,
            server_info: ServerInfo {
                name: "pattern-warden".to_string(),
                version: crate::VERSION.to_string(),
            },
            started_at: Utc::now(),
        }
    }
}

/// Build the router.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/mcp/initialize", post(initialize))
        .route("/mcp/tools/list", get(list_tools))
        .route("/mcp/tools/call", post(call_tool))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn start_server(
    config: &Config,
    handler: Arc<McpHandler>,
    metrics: Arc<Metrics>,
) -> Result<()> {
    let app = router(HttpState::new(handler, metrics));

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| Error::HttpServer(e.to_string()))?;

    Ok(())
}

/// Health check endpoint.
async fn health_check(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime = Utc::now().signed_duration_since(state.started_at);
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "started_at": state.started_at,
        "uptime_secs": uptime.num_seconds(),
        "tools": state.handler.tool_count(),
    }))
}

/// Prometheus metrics endpoint.
async fn metrics(State(state): State<HttpState>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Initialize endpoint.
async fn initialize(State(state): State<HttpState>) -> impl IntoResponse {
    state.metrics.inc_requests();
    Json(InitializeResult {
        protocol_version: MCP_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        },
        server_info: state.server_info,
        instructions: None,
    })
}

/// List tools endpoint.
async fn list_tools(State(state): State<HttpState>) -> impl IntoResponse {
    state.metrics.inc_requests();
    Json(ListToolsResult {
        tools: state.handler.list_tools(),
    })
}

/// Call tool request.
#[derive(Debug, Deserialize)]
struct CallToolRequest {
    name: String,
    #[serde(default)]
    arguments: HashMap<String, serde_json::Value>,
}

/// Call tool endpoint.
async fn call_tool(
    State(state): State<HttpState>,
    Json(req): Json<CallToolRequest>,
) -> impl IntoResponse {
    state.metrics.inc_requests();

    let Some(handler) = state.handler.get_tool(&req.name) else {
        state.metrics.inc_failed();
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("Tool not found: {}", req.name)
            })),
        );
    };

    state.metrics.inc_tool_calls();
    // Dropping the response future on disconnect kills any running engine.
    let cancel = CancellationToken::new();
    let outcome = handler
        .execute(req.arguments, &cancel)
        .await
        .and_then(|result| {
            if result.is_error {
                state.metrics.inc_tool_errors();
            }
            Ok(serde_json::to_value(result)?)
        });

    match outcome {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(e) => {
            state.metrics.inc_failed();
            warn!("Tool {} failed: {}", req.name, e);
            let status = match e {
                Error::InvalidToolArguments(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(serde_json::json!({ "error": e.to_string() })))
        }
    }
}
