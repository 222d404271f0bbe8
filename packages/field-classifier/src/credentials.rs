//! Provider API keys held in secure memory.
//!
//! Keys live inside `secrecy::SecretBox` and format as `[REDACTED]`, so a
//! `{:?}` of any config that carries one never prints the key.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// An API key that won't be logged or displayed.
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the key. Only call this when building a request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the key is blank.
    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
