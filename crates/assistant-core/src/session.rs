//! Chat Sessions
//!
//! A [`ChatSession`] ties one conversation thread to an orchestrator and
//! owns the cancellation token for its in-flight replies. Tearing the
//! session down (the user navigates away) cancels the pending turn.
//! Persistence is external; [`MessageStore`] is the seam.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::ConversationMessage;
use crate::orchestrator::AgentReplyOrchestrator;
use crate::provider::ReasoningEffort;

/// Per-session generation settings
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: crate::orchestrator::DEFAULT_TEMPERATURE,
            system_prompt: String::new(),
            reasoning_effort: None,
        }
    }
}

/// Message store trait for persistence
pub trait MessageStore: Send + Sync {
    /// Append a message to its thread
    fn append(&self, message: &ConversationMessage) -> Result<()>;

    /// Replace a stored message (used to attach late metrics)
    fn update(&self, message: &ConversationMessage) -> Result<()>;

    /// Load a thread in insertion order
    fn thread(&self, thread_id: Uuid) -> Result<Vec<ConversationMessage>>;

    /// Delete a thread
    fn delete_thread(&self, thread_id: Uuid) -> Result<()>;
}

/// In-memory message store (for development/testing)
#[derive(Default)]
pub struct MemoryMessageStore {
    threads: RwLock<HashMap<Uuid, Vec<ConversationMessage>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for MemoryMessageStore {
    fn append(&self, message: &ConversationMessage) -> Result<()> {
        let mut threads = self.threads.write().unwrap_or_else(PoisonError::into_inner);
        threads
            .entry(message.thread_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    fn update(&self, message: &ConversationMessage) -> Result<()> {
        let mut threads = self.threads.write().unwrap_or_else(PoisonError::into_inner);
        let stored = threads
            .get_mut(&message.thread_id)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == message.id))
            .ok_or_else(|| AgentError::Other(format!("message {} not found", message.id)))?;
        *stored = message.clone();
        Ok(())
    }

    fn thread(&self, thread_id: Uuid) -> Result<Vec<ConversationMessage>> {
        let threads = self.threads.read().unwrap_or_else(PoisonError::into_inner);
        Ok(threads.get(&thread_id).cloned().unwrap_or_default())
    }

    fn delete_thread(&self, thread_id: Uuid) -> Result<()> {
        let mut threads = self.threads.write().unwrap_or_else(PoisonError::into_inner);
        threads.remove(&thread_id);
        Ok(())
    }
}

/// One open conversation
pub struct ChatSession {
    thread_id: Uuid,
    orchestrator: Arc<AgentReplyOrchestrator>,
    store: Arc<dyn MessageStore>,
    settings: SessionSettings,
    cancel: CancellationToken,
}

impl ChatSession {
    /// Open a new thread
    pub fn new(
        orchestrator: Arc<AgentReplyOrchestrator>,
        store: Arc<dyn MessageStore>,
        settings: SessionSettings,
    ) -> Self {
        Self::resume(Uuid::new_v4(), orchestrator, store, settings)
    }

    /// Re-open an existing thread
    pub fn resume(
        thread_id: Uuid,
        orchestrator: Arc<AgentReplyOrchestrator>,
        store: Arc<dyn MessageStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            thread_id,
            orchestrator,
            store,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub const fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Token that fires when the session is closed
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send a user message and wait for the agent's reply.
    ///
    /// Failed turns are stored as agent error messages so the thread stays
    /// usable; the typed error is still returned to the caller.
    pub async fn send(&self, text: &str) -> Result<ConversationMessage> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        self.store
            .append(&ConversationMessage::user(self.thread_id, text))?;
        let history = self.store.thread(self.thread_id)?;

        let turn = self.orchestrator.generate_reply(
            &history,
            &self.settings.model,
            self.settings.temperature,
            &self.settings.system_prompt,
            self.settings.reasoning_effort,
        );

        let outcome = tokio::select! {
            () = self.cancel.cancelled() => {
                tracing::info!(thread = %self.thread_id, "agent reply cancelled");
                return Err(AgentError::Cancelled);
            }
            outcome = turn => outcome,
        };

        match outcome {
            Ok(reply) => {
                let message = reply.into_message(self.thread_id);
                self.store.append(&message)?;
                Ok(message)
            }
            Err(err) => {
                self.store.append(&ConversationMessage::agent_error(
                    self.thread_id,
                    err.user_message(),
                ))?;
                Err(err)
            }
        }
    }

    /// Tear down the session, cancelling any in-flight reply
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
