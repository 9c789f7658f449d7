//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/query/body values via axum extractors,
//! calls the store, search provider or orchestrator, and returns JSON.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use zmai_chat::TurnOptions;
use zmai_core::types::{
    validate_conversation_id, ConversationMeta, ConversationSummary, Message, NewConversation,
    SearchHit,
};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Body of POST /conversations. Empty strings count as unset.
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
    pub color: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ColorRequest {
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleSearchRequest {
    #[serde(default)]
    pub enable: bool,
}

#[derive(Debug, Deserialize)]
pub struct WebSearchParams {
    pub q: Option<String>,
}

/// Body of POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Target conversation. Absent or empty means the shared default.
    pub conv_id: Option<String>,
    #[serde(default)]
    pub message: String,
    pub system_prompt: Option<String>,
    pub web_search: Option<bool>,
}

// =============================================================================
// Response types
// =============================================================================

/// A conversation row. `user_id` is empty when the conversation has no owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummaryResponse {
    pub id: String,
    pub title: String,
    pub color: String,
    pub user_id: String,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            color: summary.color,
            user_id: summary.owner_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummaryResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaResponse {
    pub title: String,
    pub color: String,
    pub user_id: String,
    pub web_search: bool,
}

impl From<ConversationMeta> for MetaResponse {
    fn from(meta: ConversationMeta) -> Self {
        Self {
            title: meta.title,
            color: meta.color,
            user_id: meta.owner_id.unwrap_or_default(),
            web_search: meta.search_enabled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: String,
    pub messages: Vec<Message>,
    pub meta: MetaResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenameResponse {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ColorResponse {
    pub id: String,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleSearchResponse {
    pub id: String,
    pub web_search: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebSearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub conv_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage_backend: String,
    pub completion_provider: String,
}

// =============================================================================
// Conversation management
// =============================================================================

/// POST /conversations - create a conversation with a fresh id.
pub async fn create_conversation(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateConversationRequest>,
) -> Result<Json<ConversationSummaryResponse>, ApiError> {
    let new = NewConversation {
        title: non_empty(body.title),
        color: non_empty(body.color),
        owner_id: non_empty(body.user_id),
    };
    let conversation = state.store.create_conversation(new)?;

    tracing::info!(conversation_id = %conversation.id, "Conversation created");

    Ok(Json(ConversationSummaryResponse {
        id: conversation.id,
        title: conversation.meta.title,
        color: conversation.meta.color,
        user_id: conversation.meta.owner_id.unwrap_or_default(),
    }))
}

/// GET /conversations - list conversations, optionally for one user.
pub async fn list_conversations(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let owner = non_empty(params.user_id);
    let conversations = state
        .store
        .list_conversations(owner.as_deref())?
        .into_iter()
        .map(ConversationSummaryResponse::from)
        .collect();
    Ok(Json(ConversationListResponse { conversations }))
}

/// GET /conversation/{id} - messages and metadata; unknown ids read as empty.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    validate_conversation_id(&id)?;
    let conversation = state.store.get_conversation(&id)?;
    Ok(Json(ConversationResponse {
        id: conversation.id,
        messages: conversation.messages,
        meta: conversation.meta.into(),
    }))
}

/// POST /conversation/{id}/rename
pub async fn rename_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RenameRequest>,
) -> Result<Json<RenameResponse>, ApiError> {
    validate_conversation_id(&id)?;
    let title = non_empty(body.title)
        .ok_or_else(|| ApiError::BadRequest("Missing title".to_string()))?;
    let meta = state.store.rename_conversation(&id, &title)?;
    Ok(Json(RenameResponse {
        id,
        title: meta.title,
    }))
}

/// POST /conversation/{id}/color
pub async fn set_color(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ColorRequest>,
) -> Result<Json<ColorResponse>, ApiError> {
    validate_conversation_id(&id)?;
    let color = non_empty(body.color)
        .ok_or_else(|| ApiError::BadRequest("Missing color".to_string()))?;
    let meta = state.store.set_color(&id, &color)?;
    Ok(Json(ColorResponse {
        id,
        color: meta.color,
    }))
}

/// POST /conversation/{id}/toggle_search
pub async fn toggle_search(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ToggleSearchRequest>,
) -> Result<Json<ToggleSearchResponse>, ApiError> {
    validate_conversation_id(&id)?;
    let meta = state.store.set_search_enabled(&id, body.enable)?;
    Ok(Json(ToggleSearchResponse {
        id,
        web_search: meta.search_enabled,
    }))
}

/// DELETE /conversation/{id} - idempotent.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    validate_conversation_id(&id)?;
    state.store.delete_conversation(&id)?;
    tracing::info!(conversation_id = %id, "Conversation deleted");
    Ok(Json(DeleteResponse { deleted: true, id }))
}

// =============================================================================
// Search and chat
// =============================================================================

/// GET /websearch?q= - raw search results. Provider failures yield `[]`.
pub async fn websearch(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<WebSearchParams>,
) -> Result<Json<WebSearchResponse>, ApiError> {
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'q' is required".to_string()))?;

    let results = match state
        .search
        .search(&query, state.config.search.endpoint_max_results)
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(error = %e, provider = state.search.name(), "Web search failed");
            Vec::new()
        }
    };

    Ok(Json(WebSearchResponse { query, results }))
}

/// POST /chat - run one chat turn.
pub async fn chat(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let conv_id = non_empty(body.conv_id);
    let options = TurnOptions {
        system_prompt: body.system_prompt,
        web_search: body.web_search,
    };

    let turn = state
        .orchestrator
        .handle_turn(conv_id.as_deref(), &body.message, options)
        .await?;

    Ok(Json(ChatResponse {
        reply: turn.reply,
        conv_id: turn.conversation_id,
    }))
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        storage_backend: state.store.backend_name().to_string(),
        completion_provider: state.orchestrator.completion_name().to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
