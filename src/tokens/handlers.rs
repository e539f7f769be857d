use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use super::model::Scope;
use crate::{
    db::DataError,
    envelope::Envelope,
    error::AppError,
    extract::JsonBody,
    state::AppState,
    users::model::{validate_email, validate_password_plaintext},
    validator::Validator,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /v1/tokens/authentication
#[instrument(skip(state, input))]
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> Result<Envelope, AppError> {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, "password", &input.password);
    if !v.valid() {
        return Err(v.into());
    }

    let user = match state.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(DataError::RecordNotFound) => {
            warn!("login with unknown email");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    let matches = user.password.matches(&input.password).map_err(|e| {
        error!(error = %e, user_id = user.id, "stored password hash unusable");
        AppError::Internal(e.into())
    })?;
    if !matches {
        warn!(user_id = user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state
        .tokens
        .new_token(user.id, state.config.auth_token_ttl, Scope::Authentication)
        .await?;

    info!(user_id = user.id, "authentication token issued");
    Envelope::new(StatusCode::CREATED).with("authentication_token", &token)
}
