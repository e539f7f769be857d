use axum::{routing::post, Router};

use crate::state::AppState;

pub mod handlers;
pub mod model;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/tokens/authentication",
        post(handlers::create_authentication_token),
    )
}
