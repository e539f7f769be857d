use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppError;

/// `Json<T>` whose rejections use the 400 error envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let message = rejection.body_text();
                warn!(error = %message, "malformed request body");
                Err(AppError::BadRequest(message))
            }
        }
    }
}

/// The `:id` path segment. Anything but a positive integer is a 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParam(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for IdParam
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;
        parse_id(&raw).map(Self).ok_or(AppError::NotFound)
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}
