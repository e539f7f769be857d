use async_trait::async_trait;
use tracing::info;

use crate::{tokens::model::Token, users::model::User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound notification sink.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Records deliveries in the log instead of talking to an SMTP relay.
/// The body is not logged since it carries the activation token.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            body_bytes = email.body.len(),
            "email dispatched"
        );
        Ok(())
    }
}

pub fn welcome_email(sender: &str, user: &User, activation: &Token) -> Email {
    let body = format!(
        "Hi {username},\n\n\
         Thanks for signing up for a Study Mate account. Your user ID is {id}.\n\n\
         To activate your account, send a `PUT /v1/users/activated` request with \
         the following JSON body:\n\n\
         {{\"token\": \"{token}\"}}\n\n\
         This token is single use and expires at {expiry}.\n\n\
         The Study Mate Team\n",
        username = user.username,
        id = user.id,
        token = activation.plaintext,
        expiry = activation.expiry,
    );

    Email {
        from: sender.to_string(),
        to: user.email.clone(),
        subject: "Welcome to Study Mate!".into(),
        body,
    }
}
