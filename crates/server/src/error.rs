//! API error types.

use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error payload returned by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Internal error text attached to 5xx responses. Only rendered into the
/// body when `server.expose_errors` is set.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] scratcher_metadata::MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Unavailable(_) => "unavailable",
            Self::Metadata(_) => "metadata_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Metadata(e) => match e {
                scratcher_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        crate::metrics::API_ERRORS
            .with_label_values(&[self.code()])
            .inc();

        let body = match status {
            StatusCode::UNAUTHORIZED => ErrorResponse::new("Unauthorized"),
            StatusCode::NOT_FOUND => ErrorResponse::new("Not found"),
            _ if status.is_server_error() => {
                tracing::error!(error = %self, code = self.code(), "Request failed");
                ErrorResponse::new(if status == StatusCode::SERVICE_UNAVAILABLE {
                    "Service unavailable"
                } else {
                    "Internal server error"
                })
            }
            _ => ErrorResponse::new("Bad request").with_message(self.to_string()),
        };

        let mut response = (status, Json(body)).into_response();
        if status.is_server_error() {
            response
                .extensions_mut()
                .insert(ErrorDetail(self.to_string()));
        }
        response
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Rewrite 5xx bodies to include the internal error text when
/// `server.expose_errors` is enabled.
pub async fn expose_errors_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if !state.config.server.expose_errors {
        return response;
    }

    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    let status = response.status();
    let error = status
        .canonical_reason()
        .unwrap_or("Internal server error")
        .to_string();
    (status, Json(ErrorResponse::new(error).with_message(detail))).into_response()
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
