//! In-process harness: the real router over [`MemoryStore`] and a mailer
//! that keeps what it was asked to send.

use std::{sync::Arc, sync::Mutex, time::Duration};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, Method, Request, StatusCode,
    },
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    app::build_app,
    background::Background,
    config::{AppConfig, LimiterConfig},
    limiter::RateLimiter,
    mailer::{Email, Mailer},
    state::AppState,
    tokens::model::Scope,
    users::{model::User, password::Password},
};

pub mod memory;

pub use memory::MemoryStore;

const PASSWORD: &str = "pa55word1";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Pulls the plaintext out of a welcome email body.
pub fn activation_token_from(body: &str) -> String {
    body.split("{\"token\": \"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .expect("no activation token in email body")
        .to_string()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::for_tests())
    }

    pub fn with_limiter(rps: f64, burst: u32) -> Self {
        let mut config = AppConfig::for_tests();
        config.limiter = LimiterConfig {
            enabled: true,
            rps,
            burst,
            trust_proxy: false,
        };
        Self::with_config(config)
    }

    /// Deliveries go to `outbox` instead of the recording mailer.
    pub fn with_mailer(outbox: Arc<dyn Mailer>) -> Self {
        let mut app = Self::with_config(AppConfig::for_tests());
        app.state.mailer = outbox;
        app.router = build_app(app.state.clone());
        app
    }

    fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState {
            users: store.clone(),
            tokens: store.clone(),
            permissions: store.clone(),
            quotes: store.clone(),
            goals: store.clone(),
            study_sessions: store.clone(),
            mailer: mailer.clone(),
            limiter: Arc::new(RateLimiter::new(config.limiter.clone())),
            background: Background::new(),
            config: Arc::new(config),
        };
        let router = build_app(state.clone());
        Self {
            state,
            store,
            mailer,
            router,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.dispatch(method, uri, token, body.map(|b| b.to_string()))
            .await
    }

    /// Like [`TestApp::send`] but with a body that need not be valid JSON.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &str,
    ) -> TestResponse {
        self.dispatch(method, uri, token, Some(body.to_string()))
            .await
    }

    async fn dispatch(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Inserts `{name}@example.com` with the shared test password.
    pub async fn seed_user(&self, name: &str, activated: bool, perms: &[&str]) -> User {
        let password = Password::from_plaintext(PASSWORD).unwrap();
        let mut user = User::new(name.to_string(), format!("{name}@example.com"), password);
        self.state.users.insert(&mut user).await.unwrap();
        if activated {
            self.state.users.activate(&mut user).await.unwrap();
        }
        self.state
            .permissions
            .add_for_user(user.id, perms)
            .await
            .unwrap();
        self.state.users.get(user.id).await.unwrap()
    }

    pub async fn issue_token(&self, user_id: i64, scope: Scope) -> String {
        self.state
            .tokens
            .new_token(user_id, Duration::from_secs(3600), scope)
            .await
            .unwrap()
            .plaintext
    }

    /// An activated user holding `perms` and a live authentication token.
    pub async fn member(&self, name: &str, perms: &[&str]) -> (User, String) {
        let user = self.seed_user(name, true, perms).await;
        let token = self.issue_token(user.id, Scope::Authentication).await;
        (user, token)
    }
}
