//! Tool Aggregation
//!
//! Composes several [`ToolProvider`]s into one catalog with per-provider
//! enable/disable state. Disabled providers are invisible to the model, and
//! a call to one of their tools comes back as a "not enabled" result rather
//! than an error. Enabled providers whose server is missing answer with
//! their own unavailable message.
//!
//! ```text
//!   set_tool_enabled ──► enabled set ──► ToolSelectorState ──► watch subscribers
//!                           │
//!   tool_definitions ◄──────┤  (union over enabled entries, entry order)
//!   execute ────────────────┘  (first enabled entry owning the name)
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{AgentError, Result};
use crate::tool::{JsonObject, ToolDescriptor, ToolExecutionResult, ToolProvider};

/// One provider registered with the aggregator
#[derive(Clone)]
pub struct ToolProviderEntry {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub provider: Arc<dyn ToolProvider>,

    /// Always enabled; cannot be toggled off
    pub always_available: bool,

    /// Initial enabled state for togglable entries
    pub default_enabled: bool,
}

impl ToolProviderEntry {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        provider: Arc<dyn ToolProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            provider,
            always_available: false,
            default_enabled: true,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn always_available(mut self) -> Self {
        self.always_available = true;
        self
    }

    #[must_use]
    pub const fn default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }
}

impl std::fmt::Debug for ToolProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolProviderEntry")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("always_available", &self.always_available)
            .field("default_enabled", &self.default_enabled)
            .finish_non_exhaustive()
    }
}

/// Projection of one entry for settings UIs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSelectorOption {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub always_available: bool,
    pub tool_count: usize,
}

/// Published selector state; recomputed on every mutation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSelectorState {
    pub options: Vec<ToolSelectorOption>,
}

impl ToolSelectorState {
    pub fn option(&self, id: &str) -> Option<&ToolSelectorOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn enabled_ids(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|o| o.enabled)
            .map(|o| o.id.as_str())
            .collect()
    }
}

/// Read/mutate handle for tool availability
pub trait ToolSelector: Send + Sync {
    /// Current state snapshot
    fn state(&self) -> ToolSelectorState;

    /// Receive every published state
    fn subscribe(&self) -> watch::Receiver<ToolSelectorState>;

    /// Enable or disable an entry. Unknown ids are ignored.
    fn set_tool_enabled(&self, id: &str, enabled: bool);
}

/// Composite provider with enable/disable filtering
pub struct ToolAggregator {
    entries: Vec<ToolProviderEntry>,
    enabled: Mutex<HashSet<String>>,
    state_tx: watch::Sender<ToolSelectorState>,
    ready: AtomicBool,
}

impl ToolAggregator {
    /// Create an aggregator. At least one entry is required.
    pub fn new(entries: Vec<ToolProviderEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(AgentError::Config(
                "tool aggregator requires at least one provider entry".into(),
            ));
        }

        let enabled: HashSet<String> = entries
            .iter()
            .filter(|e| e.always_available || e.default_enabled)
            .map(|e| e.id.clone())
            .collect();

        let initial = compute_state(&entries, &enabled);
        let (state_tx, _) = watch::channel(initial);

        let aggregator = Self {
            entries,
            enabled: Mutex::new(enabled),
            state_tx,
            ready: AtomicBool::new(false),
        };
        aggregator.warn_on_duplicate_names();

        Ok(aggregator)
    }

    /// Run every provider's `initialize()` concurrently, then republish state.
    ///
    /// Provider failures only leave that provider with an empty catalog.
    pub async fn initialize_all(&self) {
        let inits = self.entries.iter().map(|e| async move {
            e.provider.initialize().await;
            tracing::info!(
                provider = %e.id,
                tools = e.provider.tool_definitions().len(),
                "tool provider initialized"
            );
        });
        futures::future::join_all(inits).await;

        {
            let enabled = self.lock_enabled();
            self.state_tx.send_replace(compute_state(&self.entries, &enabled));
        }
        self.warn_on_duplicate_names();
        self.ready.store(true, Ordering::Release);
    }

    /// True once every provider has attempted initialization
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn entries(&self) -> &[ToolProviderEntry] {
        &self.entries
    }

    fn lock_enabled(&self) -> MutexGuard<'_, HashSet<String>> {
        self.enabled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enabled_entries(&self) -> Vec<&ToolProviderEntry> {
        let enabled = self.lock_enabled();
        self.entries
            .iter()
            .filter(|e| is_enabled(e, &enabled))
            .collect()
    }

    /// Missing servers have empty catalogs, so the owner of `tool_name` is
    /// taken from the id prefix (`weather_current` → `weather`), or from the
    /// only enabled entry that reports itself unavailable.
    fn route_without_catalog(&self, tool_name: &str) -> Option<ToolExecutionResult> {
        let enabled = self.enabled_entries();

        let prefixed = self
            .entries
            .iter()
            .find(|e| tool_name.starts_with(&format!("{}_", e.id)));
        if let Some(entry) = prefixed {
            if !enabled.iter().any(|e| e.id == entry.id) {
                return Some(not_enabled(tool_name, Some(&entry.title)));
            }
            return entry.provider.unavailable_message().map(ToolExecutionResult::text);
        }

        let mut unavailable = enabled.iter().filter_map(|e| e.provider.unavailable_message());
        match (unavailable.next(), unavailable.next()) {
            (Some(message), None) => Some(ToolExecutionResult::text(message)),
            _ => None,
        }
    }

    fn warn_on_duplicate_names(&self) {
        let mut seen: HashSet<String> = HashSet::new();
        for entry in &self.entries {
            for tool in entry.provider.tool_definitions() {
                if !seen.insert(tool.name.clone()) {
                    tracing::warn!(
                        tool = %tool.name,
                        provider = %entry.id,
                        "duplicate tool name; the first provider declaring it wins"
                    );
                }
            }
        }
    }
}

fn not_enabled(tool_name: &str, title: Option<&str>) -> ToolExecutionResult {
    tracing::info!(tool = %tool_name, "tool call rejected: not enabled");
    ToolExecutionResult::text(match title {
        Some(title) => format!(
            "Tool '{tool_name}' is not enabled. Ask the user to enable '{title}' in the tool settings."
        ),
        None => format!("Tool '{tool_name}' is not enabled. Ask the user to enable it in the tool settings."),
    })
}

fn is_enabled(entry: &ToolProviderEntry, enabled: &HashSet<String>) -> bool {
    entry.always_available || enabled.contains(&entry.id)
}

fn compute_state(entries: &[ToolProviderEntry], enabled: &HashSet<String>) -> ToolSelectorState {
    ToolSelectorState {
        options: entries
            .iter()
            .map(|e| ToolSelectorOption {
                id: e.id.clone(),
                title: e.title.clone(),
                description: e.description.clone(),
                enabled: is_enabled(e, enabled),
                always_available: e.always_available,
                tool_count: e.provider.tool_definitions().len(),
            })
            .collect(),
    }
}

impl ToolSelector for ToolAggregator {
    fn state(&self) -> ToolSelectorState {
        self.state_tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<ToolSelectorState> {
        self.state_tx.subscribe()
    }

    fn set_tool_enabled(&self, id: &str, enabled: bool) {
        let Some(entry) = self.entries.iter().find(|e| e.id == id) else {
            tracing::debug!(provider = %id, "ignoring toggle for unknown tool provider");
            return;
        };
        if entry.always_available && !enabled {
            tracing::debug!(provider = %id, "always-available provider cannot be disabled");
            return;
        }

        // The lock is held while publishing so observers never see a state
        // that disagrees with the enabled set.
        let mut set = self.lock_enabled();
        if enabled {
            set.insert(entry.id.clone());
        } else {
            set.remove(&entry.id);
        }
        self.state_tx.send_replace(compute_state(&self.entries, &set));
    }
}

#[async_trait]
impl ToolProvider for ToolAggregator {
    fn tool_definitions(&self) -> Vec<ToolDescriptor> {
        self.enabled_entries()
            .into_iter()
            .flat_map(|e| e.provider.tool_definitions())
            .collect()
    }

    async fn execute(&self, tool_name: &str, arguments: &JsonObject) -> Option<ToolExecutionResult> {
        let owner = self
            .enabled_entries()
            .into_iter()
            .find(|e| e.provider.has_tool(tool_name))
            .map(|e| (e.id.clone(), Arc::clone(&e.provider)));

        if let Some((id, provider)) = owner {
            tracing::debug!(tool = %tool_name, provider = %id, "dispatching tool call");
            let result = provider.execute(tool_name, arguments).await;
            return Some(result.unwrap_or_else(|| {
                ToolExecutionResult::text(format!(
                    "Tool '{tool_name}' is no longer available from '{id}'."
                ))
            }));
        }

        if let Some(entry) = self.entries.iter().find(|e| e.provider.has_tool(tool_name)) {
            return Some(not_enabled(tool_name, Some(&entry.title)));
        }

        Some(
            self.route_without_catalog(tool_name)
                .unwrap_or_else(|| not_enabled(tool_name, None)),
        )
    }

    async fn initialize(&self) {
        self.initialize_all().await;
    }
}
