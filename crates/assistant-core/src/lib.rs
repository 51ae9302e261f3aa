//! # assistant-core
//!
//! Tool orchestration and agent-reply logic for the chat assistant, with a
//! backend-agnostic completion abstraction and composable tool providers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     AgentReplyOrchestrator                        │
//! │  ┌──────────────┐  ┌───────────────────┐  ┌──────────────────┐   │
//! │  │  Structured  │  │  ToolAggregator   │  │ CompletionBackend│   │
//! │  │ Reply Parser │◄─│ (ToolProvider +   │──│    (Strategy)    │   │
//! │  │              │  │  ToolSelector)    │  │                  │   │
//! │  └──────────────┘  └───────────────────┘  └──────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `CompletionBackend` trait enables swapping between the cloud chat
//! completions API and a local model server without changing reply logic.
//! Concrete backends and tool providers live in `assistant-runtime`.

pub mod aggregator;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod reply;
pub mod session;
pub mod tool;

pub use aggregator::{
    ToolAggregator, ToolProviderEntry, ToolSelector, ToolSelectorOption, ToolSelectorState,
};
pub use error::{AgentError, Result};
pub use message::{Author, ConversationMessage, Message, MessageMetrics, Role};
pub use orchestrator::{AgentReply, AgentReplyOrchestrator, RESPONSE_FORMAT_INSTRUCTIONS};
pub use provider::{
    BackendError, Completion, CompletionBackend, CompletionRequest, ReasoningEffort, TokenUsage,
};
pub use reply::{AgentStructuredResponse, ReplyParseError, parse_structured_reply};
pub use session::{ChatSession, MemoryMessageStore, MessageStore, SessionSettings};
pub use tool::{
    DateTimeTool, JsonObject, LocalToolProvider, Tool, ToolDescriptor, ToolExecutionResult,
    ToolProvider,
};
