use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref EMAIL_RX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .unwrap();
}

/// Field name -> first error message recorded for it.
pub type FieldErrors = BTreeMap<String, String>;

/// Accumulates user-facing validation errors keyed by field.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.valid()
    }

    /// Records `message` under `key` unless the key already carries one.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}
