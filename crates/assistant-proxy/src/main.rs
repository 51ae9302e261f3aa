//! MCP proxy server
//!
//! Runs script MCP servers locally and exposes them over HTTP so that
//! assistants on other machines can use them through `HttpToolProvider`.

mod handlers;
mod state;

use std::path::PathBuf;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assistant_core::tool::ToolProvider;
use assistant_runtime::ToolsConfig;

use crate::handlers::routes;
use crate::state::{AppState, server_configs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config_file = std::env::var("MCP_PROXY_CONFIG")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from);
    let configs = server_configs(config_file.as_deref(), &ToolsConfig::from_env())?;

    let state = AppState::start(configs).await;
    for (name, provider) in state.servers.iter() {
        if provider.is_available() {
            tracing::info!("✓ {name}: {} tools", provider.tool_definitions().len());
        } else {
            tracing::warn!("⚠ {name}: unavailable, calls will retry");
        }
    }

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8765".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("MCP proxy listening on http://{}", addr);
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /mcp/{{server}}/tools");
    tracing::info!("  POST /mcp/{{server}}/tool/{{toolName}}");

    axum::serve(listener, app).await?;

    Ok(())
}
