//! MCP tool providers
//!
//! - [`script`]: servers launched as child processes, JSON-RPC over stdio
//! - [`remote`]: servers reached through the HTTP proxy

pub mod errors;
pub mod remote;
pub mod script;
pub mod transport;
pub mod types;

pub use errors::ToolError;
pub use remote::HttpToolProvider;
pub use script::{ScriptServerConfig, ScriptToolProvider, ServerSession};
pub use types::{McpServersConfig, ServerConfig};
