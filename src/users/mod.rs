use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod model;
pub mod password;
pub mod repo;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::register))
        .route("/users/activated", put(handlers::activate))
        .route("/users/accounts", get(handlers::list))
        .route("/users/update/:id", patch(handlers::update))
        .route("/users/update-password/:id", patch(handlers::update_password))
        .route("/users/delete/:id", delete(handlers::delete_user))
}
