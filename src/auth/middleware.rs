use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::extractors::CurrentUser;
use crate::{
    db::DataError,
    error::AppError,
    state::AppState,
    tokens::model::{validate_token_plaintext, Scope},
    validator::Validator,
};

/// Resolves the bearer token, if any, into the request's `CurrentUser`.
/// No `Authorization` header means anonymous; a header that does not carry
/// a live authentication token is rejected outright. Both outcomes vary on
/// `Authorization`.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let resolved = resolve(&state, req.headers()).await;
    let mut response = match resolved {
        Ok(current) => {
            if current.is_anonymous() {
                debug!("anonymous request");
            }
            req.extensions_mut().insert(current);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let plaintext = match headers.get(header::AUTHORIZATION) {
        None => return Ok(CurrentUser(None)),
        Some(value) => bearer_token(value)?,
    };

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &plaintext);
    if !v.valid() {
        warn!("malformed bearer token");
        return Err(AppError::InvalidAuthenticationToken);
    }

    match state
        .tokens
        .user_for_token(Scope::Authentication, &plaintext)
        .await
    {
        Ok(user) => {
            debug!(user_id = user.id, "request authenticated");
            Ok(CurrentUser(Some(user)))
        }
        Err(DataError::RecordNotFound) => {
            warn!("unknown or expired bearer token");
            Err(AppError::InvalidAuthenticationToken)
        }
        Err(e) => Err(e.into()),
    }
}

fn bearer_token(value: &HeaderValue) -> Result<String, AppError> {
    value
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .ok_or(AppError::InvalidAuthenticationToken)
}
