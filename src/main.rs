mod app;
mod auth;
mod background;
mod config;
mod db;
mod envelope;
mod error;
mod extract;
mod filters;
mod goals;
mod limiter;
mod mailer;
mod permissions;
mod quotes;
mod state;
mod study_sessions;
mod tokens;
mod users;
mod validator;

#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "studymate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(env = %config.env, "starting study mate api");

    let state = AppState::init(config).await?;
    app::serve(state).await
}
