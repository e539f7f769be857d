use std::{fmt, time::Duration};

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::validator::Validator;

pub const TOKEN_LENGTH: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

/// A freshly issued bearer credential. Only the SHA-256 digest is stored;
/// the plaintext leaves the process once, in the response or email.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
    #[serde(skip)]
    pub scope: Scope,
}

impl Token {
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Self {
        let plaintext: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        let hash = hash_plaintext(&plaintext);

        Self {
            plaintext,
            hash,
            user_id,
            expiry: OffsetDateTime::now_utc() + ttl,
            scope,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_LENGTH,
        "token",
        "must be 26 bytes long",
    );
}
