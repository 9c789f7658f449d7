//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use zmai_chat::{ChatOrchestrator, CompletionProvider, SearchProvider, SystemPrompt};
use zmai_core::config::ZmaiConfig;
use zmai_storage::ConversationStore;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration. Read-only once the server is up.
    pub config: Arc<ZmaiConfig>,
    /// Conversation store, shared with the orchestrator.
    pub store: Arc<dyn ConversationStore>,
    /// Runs chat turns.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Provider behind the direct search endpoint.
    pub search: Arc<dyn SearchProvider>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: ZmaiConfig,
        store: Arc<dyn ConversationStore>,
        completion: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
        system_prompt: SystemPrompt,
    ) -> Self {
        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&store),
            completion,
            Arc::clone(&search),
            system_prompt,
            config.chat.clone(),
        );
        Self {
            config: Arc::new(config),
            store,
            orchestrator: Arc::new(orchestrator),
            search,
            start_time: Instant::now(),
        }
    }
}
