//! JSON body extractor whose rejections use the `{"detail": ...}` shape

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, OptionalFromRequest, Request};
use tracing::debug;

use crate::error::ApiError;

/// `Json<T>` that rejects with `ApiError::BadRequest`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

fn rejected(rejection: JsonRejection) -> ApiError {
    debug!("Rejected JSON body ({}): {}", rejection.status(), rejection.body_text());
    ApiError::BadRequest(rejection.body_text())
}

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(rejected)?;
        Ok(Self(value))
    }
}

/// Absent `Content-Type` means no body; a malformed body is still rejected
impl<T, S> OptionalFromRequest<S> for ApiJson<T>
where
    Json<T>: OptionalFromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let body = <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map_err(rejected)?;
        Ok(body.map(|Json(value)| Self(value)))
    }
}
