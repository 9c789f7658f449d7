//! Chat turn orchestration for zmai.
//!
//! Wires the conversation store to the completion and web search
//! collaborators: loads history, optionally enriches it with search results,
//! asks the model for a reply and persists the finished turn.

pub mod completion;
pub mod error;
pub mod locks;
pub mod mock;
pub mod orchestrator;
pub mod prompt;
pub mod search;

pub use completion::{
    build_completion_provider, CompletionProvider, OllamaCompletion, OpenAiCompletion,
};
pub use error::{ChatError, CompletionError, SearchError};
pub use locks::ConversationLocks;
pub use orchestrator::{ChatOrchestrator, TurnOptions, TurnReply};
pub use prompt::SystemPrompt;
pub use search::{DuckDuckGoSearch, SearchProvider};
