use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{
    db::DataError,
    validator::{FieldErrors, Validator},
};

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("failed validation")]
    FailedValidation(FieldErrors),
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("the requested method is not supported for this resource")]
    MethodNotAllowed,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,
    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::AuthenticationRequired
            | AppError::InvalidCredentials
            | AppError::InvalidAuthenticationToken => StatusCode::UNAUTHORIZED,
            AppError::InactiveAccount | AppError::NotPermitted => StatusCode::FORBIDDEN,
            AppError::EditConflict => StatusCode::CONFLICT,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation failure.
    pub fn field(key: &str, message: &str) -> Self {
        let mut v = Validator::new();
        v.add_error(key, message);
        v.into()
    }
}

impl From<Validator> for AppError {
    fn from(v: Validator) -> Self {
        AppError::FailedValidation(v.into_errors())
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::RecordNotFound => AppError::NotFound,
            DataError::EditConflict => AppError::EditConflict,
            other => AppError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::FailedValidation(errors) => {
                warn!(?errors, "failed validation");
                json!({ "error": errors })
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal server error");
                json!({ "error": "the server encountered a problem and could not process your request" })
            }
            other => json!({ "error": other.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, AppError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
