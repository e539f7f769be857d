use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub enabled: bool,
    pub rps: f64,
    pub burst: u32,
    /// Key clients on `X-Forwarded-For`/`X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout: Duration,
    pub limiter: LimiterConfig,
    pub activation_token_ttl: Duration,
    pub auth_token_ttl: Duration,
    pub mail_sender: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        Ok(Self::from_lookup(database_url, |key| std::env::var(key).ok()))
    }

    fn from_lookup(database_url: String, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());
        let hours = |key: &str, default: u64| {
            Duration::from_secs(parsed(key).unwrap_or(default) * 60 * 60)
        };

        Self {
            env: lookup("APP_ENV").unwrap_or_else(|| "development".into()),
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: lookup("APP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            db_timeout: Duration::from_secs(parsed("DB_QUERY_TIMEOUT_SECS").unwrap_or(3)),
            limiter: LimiterConfig {
                enabled: lookup("LIMITER_ENABLED")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(true),
                rps: lookup("LIMITER_RPS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2.0),
                burst: lookup("LIMITER_BURST")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(4),
                trust_proxy: lookup("LIMITER_TRUST_PROXY")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
            },
            activation_token_ttl: hours("ACTIVATION_TOKEN_TTL_HOURS", 72),
            auth_token_ttl: hours("AUTH_TOKEN_TTL_HOURS", 24),
            mail_sender: lookup("MAIL_SENDER")
                .unwrap_or_else(|| "Study Mate <no-reply@studymate.local>".into()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        let mut config = Self::from_lookup("postgres://localhost/studymate_test".into(), |_| None);
        config.env = "testing".into();
        config.limiter.enabled = false;
        config
    }
}
