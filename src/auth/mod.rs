//! Authentication module for API key verification.

mod extractor;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

pub use extractor::{ApiKeyAuth, AuthError};

/// The configured API key guarding report endpoints.
///
/// Held as a `SecretString`: `Debug` is redacted and the value is zeroized on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(key: SecretString) -> Self {
        Self(key)
    }

    /// Compare the provided key in constant time.
    ///
    /// Unequal lengths compare false without an early exit.
    pub fn verify(&self, provided: &str) -> bool {
        self.0
            .expose_secret()
            .as_bytes()
            .ct_eq(provided.as_bytes())
            .into()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}
