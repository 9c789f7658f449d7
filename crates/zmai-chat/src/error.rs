//! Error types for chat turns and their collaborators.

use zmai_core::error::ZmaiError;

/// Failure of a completion provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("completion provider not configured: {0}")]
    NotConfigured(String),
    #[error("completion timed out after {0}s")]
    Timeout(u64),
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("model process failed: {0}")]
    Process(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

/// Failure of a web search call. Never surfaced from a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),
    #[error("search returned status {0}")]
    Status(u16),
    #[error("malformed search response: {0}")]
    Malformed(String),
    #[error("search timed out after {0}s")]
    Timeout(u64),
}

/// Errors from a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("invalid conversation id: {0}")]
    InvalidConversationId(String),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl ChatError {
    /// Whether the caller is at fault (bad input rather than a failed call).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage
                | ChatError::MessageTooLong(_)
                | ChatError::InvalidConversationId(_)
        )
    }
}

impl From<ZmaiError> for ChatError {
    fn from(err: ZmaiError) -> Self {
        match err {
            ZmaiError::Validation(msg) => ChatError::InvalidConversationId(msg),
            other => ChatError::StorageError(other.to_string()),
        }
    }
}
