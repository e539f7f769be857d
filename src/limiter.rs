use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{config::LimiterConfig, error::AppError, state::AppState};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const IDLE_AFTER: Duration = Duration::from_secs(3 * 60);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_seen: Instant,
}

/// Per-client token buckets.
pub struct RateLimiter {
    config: LimiterConfig,
    clients: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn trust_proxy(&self) -> bool {
        self.config.trust_proxy
    }

    /// Takes one token from `client`'s bucket, refilling it first.
    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    fn allow_at(&self, client: &str, now: Instant) -> bool {
        let burst = f64::from(self.config.burst);
        let mut bucket = self.clients.entry(client.to_string()).or_insert(Bucket {
            tokens: burst,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_seen).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.rps).min(burst);
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Forgets clients not seen for `idle`.
    pub fn sweep(&self, idle: Duration) {
        self.sweep_at(idle, Instant::now());
    }

    fn sweep_at(&self, idle: Duration, now: Instant) {
        self.clients
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < idle);
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Periodic eviction of idle clients until `cancel` fires.
    pub fn spawn_sweeper(self: std::sync::Arc<Self>, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep(IDLE_AFTER);
                        debug!(clients = self.tracked_clients(), "rate limiter sweep");
                    }
                }
            }
        });
    }
}

/// The peer address. With `trust_proxy`, the first `X-Forwarded-For` entry
/// and then `X-Real-IP` take precedence over it.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let peer = || {
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".into())
    };
    if !trust_proxy {
        return peer();
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer()
}

pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.limiter.enabled() {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = client_key(req.headers(), peer, state.limiter.trust_proxy());
        if !state.limiter.allow(&client) {
            warn!(%client, "rate limit exceeded");
            return Err(AppError::RateLimitExceeded);
        }
    }
    Ok(next.run(req).await)
}
