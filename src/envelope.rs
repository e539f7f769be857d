use anyhow::Context;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;

/// Top-level JSON object of every successful response, keyed by resource
/// name (`{"goal": {...}}`) or `message`.
#[derive(Debug, Clone)]
pub struct Envelope {
    status: StatusCode,
    location: Option<String>,
    body: Map<String, Value>,
}

impl Envelope {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            location: None,
            body: Map::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// 201 with a `Location` header.
    pub fn created(location: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED).location(location)
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self, AppError> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("serialize `{key}` response field"))?;
        self.body.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn message(message: &str) -> Self {
        let mut envelope = Self::ok();
        envelope
            .body
            .insert("message".into(), Value::String(message.to_string()));
        envelope
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(Value::Object(self.body))).into_response();
        if let Some(location) = self.location {
            if let Ok(value) = HeaderValue::try_from(location) {
                response.headers_mut().insert(header::LOCATION, value);
            }
        }
        response
    }
}
