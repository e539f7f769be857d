use std::{any::Any, net::SocketAddr};

use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn_with_state, map_response},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::authenticate, envelope::Envelope, error::AppError, goals, limiter::rate_limit, quotes,
    state::AppState, study_sessions, tokens, users,
};

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/healthcheck", get(healthcheck))
        .merge(users::router())
        .merge(tokens::router())
        .merge(quotes::router())
        .merge(goals::router())
        .merge(study_sessions::router());

    // Outermost first: rate limit, then authenticate, then the handler's
    // own extractors (activation, permission).
    Router::new()
        .nest("/v1", api)
        .fallback(not_found)
        .layer(map_response(method_not_allowed))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| request_span(req))
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// `status` is filled in once the response is known.
fn request_span<B>(req: &axum::http::Request<B>) -> tracing::Span {
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        uri = %req.uri(),
        status = tracing::field::Empty
    )
}

async fn healthcheck(State(state): State<AppState>) -> Result<Envelope, AppError> {
    Envelope::ok().with("status", "available")?.with(
        "system_info",
        &json!({
            "environment": state.config.env,
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn method_not_allowed(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return AppError::MethodNotAllowed.into_response();
    }
    response
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    AppError::Internal(anyhow::anyhow!("request handler panicked")).into_response()
}

/// Serves until Ctrl-C or SIGTERM, then drains outstanding background work.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = state.config.addr().parse()?;
    let background = state.background.clone();

    let cancel = CancellationToken::new();
    if state.limiter.enabled() {
        state.limiter.clone().spawn_sweeper(cancel.clone());
    }

    let app = build_app(state);
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel.cancel();
    tracing::info!(pending = background.pending(), "waiting for background tasks");
    background.shutdown().await;
    tracing::info!("stopped server");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down gracefully");
}
