use axum::{routing::get, Router};

use crate::state::AppState;

pub mod handlers;
pub mod model;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/study-sessions",
            get(handlers::list).post(handlers::create),
        )
        .route(
            "/study-sessions/:id",
            get(handlers::show)
                .patch(handlers::update)
                .delete(handlers::delete),
        )
}
