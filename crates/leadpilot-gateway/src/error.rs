//! Error responses rendered as `{"detail": "..."}`

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leadpilot_core::OutreachError;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Outreach(OutreachError),
    BadRequest(String),
    Unauthorized,
}

impl From<OutreachError> for ApiError {
    fn from(err: OutreachError) -> Self {
        Self::Outreach(err)
    }
}

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            Self::Outreach(err) => {
                let status = match err {
                    OutreachError::NotFound(_) => StatusCode::NOT_FOUND,
                    OutreachError::DuplicateEmail(_) | OutreachError::Validation(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    OutreachError::Delivery(_) => StatusCode::BAD_GATEWAY,
                    OutreachError::Store(_) | OutreachError::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, detail);
        }
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
