//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping chat and storage errors to HTTP status codes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use zmai_chat::{ChatError, CompletionError};
use zmai_core::error::ZmaiError;

/// Message returned for every 500 response. The real cause is only logged.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "bad_gateway").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 502 Bad Gateway - the completion provider failed.
    BadGateway {
        message: String,
        details: Option<serde_json::Value>,
    },
    /// 503 Service Unavailable - the completion provider is not configured.
    ServiceUnavailable(String),
    /// 504 Gateway Timeout - the completion provider did not answer in time.
    GatewayTimeout(String),
    /// 500 Internal Server Error. Carries the cause for the server log.
    Internal(String),
    /// The request could not be extracted (malformed JSON, wrong content
    /// type, body too large, bad query string). Keeps the extractor's status.
    Rejected { status: StatusCode, message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::BadGateway { message, details } => {
                (StatusCode::BAD_GATEWAY, "bad_gateway", message, details)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", msg, None)
            }
            ApiError::Rejected { status, message } => {
                (status, rejection_code(status), message, None)
            }
            ApiError::Internal(cause) => {
                tracing::error!(cause = %cause, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_ERROR_MESSAGE.to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

fn rejection_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
        StatusCode::UNPROCESSABLE_ENTITY => "unprocessable_entity",
        _ => "bad_request",
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<ZmaiError> for ApiError {
    fn from(err: ZmaiError) -> Self {
        match err {
            ZmaiError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        match &err {
            CompletionError::NotConfigured(_) => ApiError::ServiceUnavailable(err.to_string()),
            CompletionError::Timeout(_) => ApiError::GatewayTimeout(err.to_string()),
            CompletionError::Upstream { status, .. } => ApiError::BadGateway {
                message: err.to_string(),
                details: Some(serde_json::json!({ "upstream_status": *status })),
            },
            CompletionError::Process(_)
            | CompletionError::Transport(_)
            | CompletionError::Malformed(_) => ApiError::BadGateway {
                message: err.to_string(),
                details: None,
            },
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Completion(e) => e.into(),
            ChatError::StorageError(cause) => ApiError::Internal(cause),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorBody) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_maps_to_400() {
        let (status, body) = body_of(ChatError::EmptyMessage.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "bad_request");
        assert_eq!(body.message, "message cannot be empty");
    }

    #[tokio::test]
    async fn test_upstream_maps_to_502_with_detail() {
        let err: ApiError = ChatError::Completion(CompletionError::Upstream {
            status: 401,
            body: "invalid key".to_string(),
        })
        .into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.message.contains("invalid key"));
        assert_eq!(body.details.unwrap()["upstream_status"], 401);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_504() {
        let (status, body) = body_of(CompletionError::Timeout(120).into()).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.error, "gateway_timeout");
    }

    #[tokio::test]
    async fn test_not_configured_maps_to_503() {
        let err = CompletionError::NotConfigured("no key".to_string());
        let (status, _) = body_of(err.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_storage_error_is_generic_500() {
        let err: ApiError = ZmaiError::Storage("open /var/lib/zmai/secret.db failed".to_string()).into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "internal_error");
        assert_eq!(body.message, INTERNAL_ERROR_MESSAGE);
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_rejection_keeps_status_in_envelope() {
        let err = ApiError::Rejected {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: "Expected request with `Content-Type: application/json`".to_string(),
        };
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body.error, "unsupported_media_type");
        assert!(body.message.contains("Content-Type"));
    }

    #[tokio::test]
    async fn test_invalid_id_maps_to_400() {
        let err: ApiError = ZmaiError::Validation("bad id".to_string()).into();
        let (status, _) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
