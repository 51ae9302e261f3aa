//! # assistant-runtime
//!
//! Concrete backends and tool providers for the chat assistant.
//!
//! ## Backends
//!
//! - **Cloud**: OpenAI-compatible chat completions with tool calling
//! - **Local**: Ollama `/api/chat`, single-shot or NDJSON
//!
//! ## Tool providers
//!
//! - **Script**: MCP servers launched as child processes (JSON-RPC over stdio)
//! - **HTTP**: MCP servers hosted by the proxy service

pub mod bootstrap;
pub mod cloud;
pub mod config;
mod http;
pub mod mcp;
pub mod ollama;
mod tool_calls;

pub use cloud::CloudBackend;
pub use config::{CloudConfig, OllamaConfig, ToolsConfig};
pub use mcp::{HttpToolProvider, ScriptServerConfig, ScriptToolProvider, ToolError};
pub use ollama::{LocalBackend, LocalTuning};

// Re-export core types for convenience
pub use assistant_core::{
    AgentError, AgentReplyOrchestrator, CompletionBackend, Result, ToolAggregator,
    ToolProvider, ToolProviderEntry,
};
