use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures the kiosk cannot turn into an operator message.
#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    /// A second action arrived while the tab's previous one was still pending.
    #[error("Another request is already in progress")]
    Busy,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for KioskError {
    fn into_response(self) -> Response {
        match self {
            Self::Busy => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": self.to_string() })),
            )
                .into_response(),
            Self::Internal(_) => {
                tracing::error!(error = %self, "Kiosk internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
