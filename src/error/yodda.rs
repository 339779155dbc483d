use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error as ThisError;

/// Upstream bodies are truncated to this many characters before they are
/// logged or echoed back to callers.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, ThisError)]
pub enum YoddaError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The user's tier is missing from the tier table (configuration defect).
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Build limit reached for {tier} tier ({used}/{limit})")]
    QuotaExceeded { tier: String, used: u32, limit: u32 },

    /// No usable upstream credential (or a malformed one).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport failure or non-success status from the LLM provider.
    #[error("Upstream call failed: status={status:?}, body={body:.200}")]
    UpstreamCall { status: Option<u16>, body: String },

    /// Success response without the expected generated text.
    #[error("Failed to extract generated content: {0}")]
    Extraction(String),

    #[error("Failed to store build artifact: {0}")]
    ArtifactWrite(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl YoddaError {
    /// Stable machine-readable code used in error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            YoddaError::Authentication(_) => "UNAUTHORIZED",
            YoddaError::Forbidden(_) => "FORBIDDEN",
            YoddaError::UserNotFound(_) => "USER_NOT_FOUND",
            YoddaError::UnknownTier(_) => "UNKNOWN_TIER",
            YoddaError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            YoddaError::Configuration(_) => "CONFIGURATION_ERROR",
            YoddaError::UpstreamCall { .. } => "UPSTREAM_ERROR",
            YoddaError::Extraction(_) => "EXTRACTION_ERROR",
            YoddaError::ArtifactWrite(_) => "ARTIFACT_WRITE_ERROR",
            YoddaError::InvalidRequest(_) => "INVALID_REQUEST",
            YoddaError::Conflict(_) => "CONFLICT",
            YoddaError::DatabaseError(_)
            | YoddaError::RactorError(_)
            | YoddaError::UnexpectedError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            YoddaError::Authentication(_) => StatusCode::UNAUTHORIZED,
            YoddaError::Forbidden(_) | YoddaError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            YoddaError::UserNotFound(_) => StatusCode::NOT_FOUND,
            YoddaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            YoddaError::Conflict(_) => StatusCode::CONFLICT,
            YoddaError::UpstreamCall { .. } | YoddaError::Extraction(_) => StatusCode::BAD_GATEWAY,
            YoddaError::UnknownTier(_)
            | YoddaError::Configuration(_)
            | YoddaError::ArtifactWrite(_)
            | YoddaError::DatabaseError(_)
            | YoddaError::RactorError(_)
            | YoddaError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for YoddaError {
    fn from(rejection: JsonRejection) -> Self {
        YoddaError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for YoddaError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let code = self.code().to_string();

        let (message, details): (String, Option<Value>) = match self {
            YoddaError::DatabaseError(_)
            | YoddaError::RactorError(_)
            | YoddaError::UnexpectedError(_) => {
                tracing::error!(error = %self, "Internal error");
                ("An internal server error occurred.".to_string(), None)
            }

            YoddaError::QuotaExceeded { tier, used, limit } => (
                format!("Build limit reached for {tier} tier"),
                Some(json!({ "tier": tier, "used": used, "limit": limit })),
            ),

            YoddaError::UpstreamCall { status, body } => {
                let preview = format!("{:.len$}", body, len = UPSTREAM_BODY_PREVIEW_CHARS);
                tracing::warn!(
                    upstream_status = ?status,
                    body = %preview,
                    "Upstream call failed"
                );
                (
                    "Upstream LLM provider call failed.".to_string(),
                    Some(json!({ "upstream_status": status, "upstream_body": preview })),
                )
            }

            YoddaError::Extraction(reason) => {
                tracing::warn!(%reason, "Upstream response extraction failed");
                (
                    "Failed to parse generated code from the upstream response.".to_string(),
                    None,
                )
            }

            YoddaError::ArtifactWrite(reason) => {
                tracing::error!(%reason, "Artifact write failed");
                ("Failed to store the generated build.".to_string(), None)
            }

            YoddaError::UnknownTier(tier) => {
                tracing::error!(%tier, "User tier missing from tier table");
                (format!("Tier '{tier}' is not configured."), None)
            }

            YoddaError::Configuration(reason) => {
                tracing::error!(%reason, "Configuration error");
                (reason, None)
            }

            YoddaError::Authentication(reason)
            | YoddaError::Forbidden(reason)
            | YoddaError::UserNotFound(reason)
            | YoddaError::InvalidRequest(reason)
            | YoddaError::Conflict(reason) => (reason, None),
        };

        let body = ApiErrorObject {
            code,
            message,
            details,
        };
        (status, Json(ApiErrorBody { inner: body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: YoddaError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn quota_exceeded_reports_tier_and_usage() {
        let (status, body) = body_json(YoddaError::QuotaExceeded {
            tier: "FREE".to_string(),
            used: 3,
            limit: 3,
        })
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
        assert_eq!(body["error"]["details"]["tier"], "FREE");
        assert_eq!(body["error"]["details"]["used"], 3);
    }

    #[tokio::test]
    async fn upstream_and_extraction_errors_are_distinct() {
        let (upstream_status, upstream) = body_json(YoddaError::UpstreamCall {
            status: Some(500),
            body: "boom".to_string(),
        })
        .await;
        let (extract_status, extract) =
            body_json(YoddaError::Extraction("missing choices".to_string())).await;

        assert_eq!(upstream_status, StatusCode::BAD_GATEWAY);
        assert_eq!(extract_status, StatusCode::BAD_GATEWAY);
        assert_eq!(upstream["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(upstream["error"]["details"]["upstream_status"], 500);
        assert_eq!(extract["error"]["code"], "EXTRACTION_ERROR");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) =
            body_json(YoddaError::RactorError("mailbox closed".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(body["error"].get("details").is_none());
    }
}
