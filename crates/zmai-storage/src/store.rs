//! The storage-agnostic conversation store contract.

use zmai_core::error::ZmaiError;
use zmai_core::types::{
    Conversation, ConversationMeta, ConversationSummary, Message, NewConversation,
};

/// Durable mapping from conversation id to message log and metadata.
///
/// Read operations on an unknown id return the empty/default value instead
/// of failing. Mutations on an unknown id create the metadata record on
/// demand. Write failures are always reported as `ZmaiError::Storage` (or
/// `Io`/`Serialization` for the file backend); they are never swallowed.
pub trait ConversationStore: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Allocate a fresh id and persist an empty log with the given metadata.
    fn create_conversation(&self, new: NewConversation) -> Result<Conversation, ZmaiError>;

    /// List every conversation, or only those owned by `owner_id`.
    ///
    /// Order is store-defined but stable for a given backend.
    fn list_conversations(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, ZmaiError>;

    /// Load a conversation. Unknown ids yield an empty conversation with
    /// default metadata.
    fn get_conversation(&self, id: &str) -> Result<Conversation, ZmaiError>;

    /// Whether a metadata record exists for `id`.
    fn exists(&self, id: &str) -> Result<bool, ZmaiError>;

    /// Append a user message and its assistant reply as one unit.
    ///
    /// Either both messages are persisted or neither is. Creates the default
    /// metadata record if the conversation has none.
    fn append_turn(
        &self,
        id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<(), ZmaiError>;

    /// Set the title, creating a default record first if needed.
    fn rename_conversation(&self, id: &str, title: &str) -> Result<ConversationMeta, ZmaiError>;

    /// Set the display color, creating a default record first if needed.
    fn set_color(&self, id: &str, color: &str) -> Result<ConversationMeta, ZmaiError>;

    /// Set the per-conversation search flag, creating a default record first
    /// if needed.
    fn set_search_enabled(&self, id: &str, enabled: bool)
        -> Result<ConversationMeta, ZmaiError>;

    /// Remove both the log and the metadata record. Deleting an unknown id
    /// is not an error.
    fn delete_conversation(&self, id: &str) -> Result<(), ZmaiError>;
}
