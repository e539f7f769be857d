use std::sync::Arc;

use crate::{
    background::Background,
    config::AppConfig,
    db,
    goals::repo::{GoalRepository, PgGoalRepository},
    limiter::RateLimiter,
    mailer::{LogMailer, Mailer},
    permissions::repo::{PermissionRepository, PgPermissionRepository},
    quotes::repo::{PgQuoteRepository, QuoteRepository},
    study_sessions::repo::{PgStudySessionRepository, StudySessionRepository},
    tokens::repo::{PgTokenRepository, TokenRepository},
    users::repo::{PgUserRepository, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub goals: Arc<dyn GoalRepository>,
    pub study_sessions: Arc<dyn StudySessionRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<RateLimiter>,
    pub background: Background,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the repositories.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        let timeout = config.db_timeout;
        Ok(Self {
            users: Arc::new(PgUserRepository::new(pool.clone(), timeout)),
            tokens: Arc::new(PgTokenRepository::new(pool.clone(), timeout)),
            permissions: Arc::new(PgPermissionRepository::new(pool.clone(), timeout)),
            quotes: Arc::new(PgQuoteRepository::new(pool.clone(), timeout)),
            goals: Arc::new(PgGoalRepository::new(pool.clone(), timeout)),
            study_sessions: Arc::new(PgStudySessionRepository::new(pool, timeout)),
            mailer: Arc::new(LogMailer),
            limiter: Arc::new(RateLimiter::new(config.limiter.clone())),
            background: Background::new(),
            config: Arc::new(config),
        })
    }
}
