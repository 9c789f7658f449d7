use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ZmaiError};

// =============================================================================
// Constants
// =============================================================================

/// Title given to conversations created without one.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Display color given to conversations created without one.
pub const DEFAULT_COLOR: &str = "#4A90E2";

/// Conversation used by chat requests that do not name one.
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Longest conversation id accepted from callers.
pub const MAX_CONVERSATION_ID_LEN: usize = 128;

// =============================================================================
// Enums
// =============================================================================

/// Speaker of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model (system prompt, search context).
    System,
    /// Text typed by the user.
    User,
    /// Reply produced by the completion provider.
    Assistant,
}

impl Role {
    /// Lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A single role-tagged message.
///
/// Serializes as `{"role": ..., "content": ...}`, which is both the persisted
/// log format and the shape hosted completion APIs expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// Mutable metadata record of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub title: String,
    pub color: String,
    /// Owning user, fixed at creation.
    pub owner_id: Option<String>,
    /// When set, every chat turn on the conversation runs a web search.
    pub search_enabled: bool,
}

impl Default for ConversationMeta {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            color: DEFAULT_COLOR.to_string(),
            owner_id: None,
            search_enabled: false,
        }
    }
}

/// A conversation: ordered message log plus metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub meta: ConversationMeta,
}

impl Conversation {
    /// An empty conversation with default metadata.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            meta: ConversationMeta::default(),
        }
    }
}

/// Row returned when listing conversations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub color: String,
    pub owner_id: Option<String>,
}

/// Fields supplied when creating a conversation. Unset fields take defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConversation {
    pub title: Option<String>,
    pub color: Option<String>,
    pub owner_id: Option<String>,
}

impl NewConversation {
    /// Resolve the metadata record this request creates.
    pub fn into_meta(self) -> ConversationMeta {
        let defaults = ConversationMeta::default();
        ConversationMeta {
            title: self.title.unwrap_or(defaults.title),
            color: self.color.unwrap_or(defaults.color),
            owner_id: self.owner_id.filter(|o| !o.is_empty()),
            search_enabled: false,
        }
    }
}

/// One web search result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

// =============================================================================
// Conversation ids
// =============================================================================

/// Allocate a fresh conversation id (`conv_` + 32 hex digits of a v4 UUID).
pub fn generate_conversation_id() -> String {
    format!("conv_{}", Uuid::new_v4().simple())
}

/// Check that a caller-supplied conversation id is usable as a storage key.
///
/// Accepts 1..=128 characters from `[A-Za-z0-9_.-]` not starting with `.`,
/// which keeps ids safe to use as file names.
pub fn validate_conversation_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ZmaiError::Validation(
            "conversation id cannot be empty".to_string(),
        ));
    }
    if id.len() > MAX_CONVERSATION_ID_LEN {
        return Err(ZmaiError::Validation(format!(
            "conversation id exceeds {} characters",
            MAX_CONVERSATION_ID_LEN
        )));
    }
    if id.starts_with('.') {
        return Err(ZmaiError::Validation(
            "conversation id cannot start with '.'".to_string(),
        ));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(ZmaiError::Validation(format!(
            "conversation id contains invalid character {:?}",
            bad
        )));
    }
    Ok(())
}
