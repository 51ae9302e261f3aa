//! HTTP Handlers

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use assistant_core::tool::ToolProvider;
use assistant_runtime::ToolError;
use assistant_runtime::mcp::types::{McpToolDefinition, RemoteToolCallRequest, RemoteToolCallResponse};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub servers: BTreeMap<String, ServerHealth>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub available: bool,
    pub tool_count: usize,
}

type Failure = (StatusCode, Json<RemoteToolCallResponse>);

fn unknown_server(server: &str) -> Failure {
    (
        StatusCode::NOT_FOUND,
        Json(RemoteToolCallResponse::failure(
            format!("MCP server '{server}' is not configured on this proxy."),
            format!("unknown server '{server}'"),
        )),
    )
}

fn status_for(err: &ToolError) -> StatusCode {
    match err {
        ToolError::NotInstalled { .. } | ToolError::SpawnFailed { .. } | ToolError::InitFailed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ToolError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/mcp/{server}/tools", get(list_tools))
        .route("/mcp/{server}/tool/{tool_name}", post(call_tool))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let servers = state
        .servers
        .iter()
        .map(|(name, provider)| {
            let health = ServerHealth {
                available: provider.is_available(),
                tool_count: provider.tool_definitions().len(),
            };
            (name.clone(), health)
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        servers,
    })
}

/// Catalog of one server
pub async fn list_tools(
    State(state): State<AppState>,
    Path(server): Path<String>,
) -> Result<Json<Vec<McpToolDefinition>>, Failure> {
    let provider = state.server(&server).ok_or_else(|| unknown_server(&server))?;
    let tools = provider
        .tool_definitions()
        .iter()
        .map(McpToolDefinition::from)
        .collect();
    Ok(Json(tools))
}

/// Run one tool and report the outcome in-band
pub async fn call_tool(
    State(state): State<AppState>,
    Path((server, tool_name)): Path<(String, String)>,
    Json(request): Json<RemoteToolCallRequest>,
) -> Result<Json<RemoteToolCallResponse>, Failure> {
    let provider = state.server(&server).ok_or_else(|| unknown_server(&server))?;

    if provider.is_available() && !provider.has_tool(&tool_name) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(RemoteToolCallResponse::failure(
                format!("Tool '{tool_name}' is not provided by '{server}'."),
                format!("unknown tool '{tool_name}'"),
            )),
        ));
    }

    match provider.try_execute(&tool_name, &request.arguments).await {
        Ok(result) => Ok(Json(result.into())),
        Err(e) => {
            tracing::warn!(server = %server, tool = %tool_name, error = %e, "Proxied tool call failed");
            Err((
                status_for(&e),
                Json(RemoteToolCallResponse::failure(
                    format!("Tool '{tool_name}' failed: {e}"),
                    e.to_string(),
                )),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assistant_runtime::mcp::ServerConfig;
    use assistant_runtime::{ScriptServerConfig, ScriptToolProvider};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn missing_server(dir: &tempfile::TempDir, name: &str) -> Arc<ScriptToolProvider> {
        let server = ServerConfig {
            command: "python3".into(),
            script: Some(dir.path().join(name).join("server.py")),
            ..ServerConfig::default()
        };
        Arc::new(ScriptToolProvider::new(ScriptServerConfig::new(name, server)))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_each_server() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(AppState::new([missing_server(&dir, "weather"), missing_server(&dir, "docs")]));

        let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["servers"]["weather"], json!({"available": false, "toolCount": 0}));
        assert_eq!(body["servers"]["docs"]["toolCount"], 0);
    }

    #[tokio::test]
    async fn test_unknown_server_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(AppState::new([missing_server(&dir, "weather")]));

        let (status, body) = send(
            app.clone(),
            post_json("/mcp/support/tool/open_ticket", &json!({"arguments": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["text"].as_str().unwrap().contains("support"));
        assert!(body["error"].is_string());

        let (status, _) = send(app, Request::get("/mcp/support/tools").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_script_server() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(AppState::new([missing_server(&dir, "weather")]));

        let (status, body) = send(
            app.clone(),
            Request::get("/mcp/weather/tools").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = send(
            app,
            post_json("/mcp/weather/tool/weather_current", &json!({"arguments": {"city": "Oslo"}})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert!(body["text"].as_str().unwrap().starts_with("Tool 'weather_current' failed"));
    }
}
