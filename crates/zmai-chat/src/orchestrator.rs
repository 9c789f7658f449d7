//! Chat orchestrator: runs one chat turn end to end.
//!
//! Loads history, optionally enriches it with web search results, asks the
//! completion provider for a reply and persists the user message together
//! with the reply. Turns on the same conversation are serialised.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use zmai_core::config::ChatConfig;
use zmai_core::types::{validate_conversation_id, Message, SearchHit, DEFAULT_CONVERSATION_ID};
use zmai_storage::ConversationStore;

use crate::completion::CompletionProvider;
use crate::error::{ChatError, CompletionError, SearchError};
use crate::locks::ConversationLocks;
use crate::prompt::SystemPrompt;
use crate::search::SearchProvider;

/// First line of the search context block handed to the model.
pub const SEARCH_RESULTS_HEADER: &str = "Web search results (top):";

/// Search context used when the search failed or found nothing.
pub const NO_SEARCH_RESULTS: &str = "Web search returned no useful results.";

const MIN_SEARCH_RESULTS: usize = 4;
const MAX_SEARCH_RESULTS: usize = 6;

/// Per-turn options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// Replaces the default system prompt for this turn. Empty means unset.
    pub system_prompt: Option<String>,
    /// Forces a web search for this turn.
    pub web_search: Option<bool>,
}

/// Outcome of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub conversation_id: String,
    pub reply: String,
    /// Whether a web search ran for this turn.
    pub searched: bool,
}

/// Central coordinator for chat turns.
pub struct ChatOrchestrator {
    store: Arc<dyn ConversationStore>,
    completion: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
    system_prompt: SystemPrompt,
    locks: ConversationLocks,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        completion: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
        system_prompt: SystemPrompt,
        config: ChatConfig,
    ) -> Self {
        Self {
            store,
            completion,
            search,
            system_prompt,
            locks: ConversationLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn completion_name(&self) -> &'static str {
        self.completion.name()
    }

    /// Run one chat turn.
    ///
    /// `conversation_id` of `None` targets the shared default conversation.
    /// Unknown ids start a fresh conversation. On any error nothing is
    /// persisted, so the caller may resubmit the same text.
    pub async fn handle_turn(
        &self,
        conversation_id: Option<&str>,
        user_text: &str,
        options: TurnOptions,
    ) -> Result<TurnReply, ChatError> {
        self.validate_message(user_text)?;
        let conversation_id = conversation_id.unwrap_or(DEFAULT_CONVERSATION_ID);
        validate_conversation_id(conversation_id)?;

        let system_prompt = self.system_prompt.resolve(options.system_prompt.as_deref());

        let _turn = self.locks.acquire(conversation_id).await;

        let conversation = self.store.get_conversation(conversation_id)?;
        let user_message = Message::user(user_text);

        let searched = options.web_search.unwrap_or(false) || conversation.meta.search_enabled;
        let search_context = if searched {
            Some(self.search_context(conversation_id, user_text).await)
        } else {
            None
        };

        let messages = build_model_messages(
            system_prompt,
            search_context,
            &conversation.messages,
            &user_message,
        );

        let reply = match self.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    conversation_id = %conversation_id,
                    provider = self.completion.name(),
                    error = %e,
                    "Completion failed, turn not persisted"
                );
                return Err(e.into());
            }
        };

        self.store
            .append_turn(conversation_id, &user_message, &Message::assistant(reply.as_str()))?;

        info!(
            conversation_id = %conversation_id,
            provider = self.completion.name(),
            searched,
            reply_len = reply.len(),
            "Chat turn completed"
        );

        Ok(TurnReply {
            conversation_id: conversation_id.to_string(),
            reply,
            searched,
        })
    }

    fn validate_message(&self, user_text: &str) -> Result<(), ChatError> {
        if user_text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if user_text.chars().count() > self.config.max_message_chars {
            return Err(ChatError::MessageTooLong(self.config.max_message_chars));
        }
        Ok(())
    }

    fn search_results_per_turn(&self) -> usize {
        self.config
            .search_results_per_turn
            .clamp(MIN_SEARCH_RESULTS, MAX_SEARCH_RESULTS)
    }

    /// Run the search for one turn. Failures degrade to the no-results marker.
    async fn search_context(&self, conversation_id: &str, query: &str) -> String {
        let bound = self.config.search_timeout_secs;
        let limit = self.search_results_per_turn();
        let result = tokio::time::timeout(Duration::from_secs(bound), self.search.search(query, limit))
            .await
            .unwrap_or(Err(SearchError::Timeout(bound)));

        match result {
            Ok(mut hits) if !hits.is_empty() => {
                hits.truncate(limit);
                render_search_results(&hits)
            }
            Ok(_) => {
                warn!(conversation_id = %conversation_id, "Web search found nothing");
                NO_SEARCH_RESULTS.to_string()
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    provider = self.search.name(),
                    error = %e,
                    "Web search failed, continuing without results"
                );
                NO_SEARCH_RESULTS.to_string()
            }
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let bound = self.config.completion_timeout_secs;
        tokio::time::timeout(Duration::from_secs(bound), self.completion.complete(messages))
            .await
            .unwrap_or(Err(CompletionError::Timeout(bound)))
    }
}

/// Render search hits as the block the model sees.
pub fn render_search_results(hits: &[SearchHit]) -> String {
    let mut lines = Vec::with_capacity(hits.len() + 1);
    lines.push(SEARCH_RESULTS_HEADER.to_string());
    for hit in hits {
        lines.push(format!("- {}: {} ({})", hit.title, hit.snippet, hit.url));
    }
    lines.join("\n")
}

/// Assemble the provider-facing message list.
///
/// Order: system prompt, optional search context, prior history, new user
/// message.
pub fn build_model_messages(
    system_prompt: &str,
    search_context: Option<String>,
    history: &[Message],
    user_message: &Message,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(Message::system(system_prompt));
    if let Some(context) = search_context {
        messages.push(Message::system(context));
    }
    messages.extend_from_slice(history);
    messages.push(user_message.clone());
    messages
}
