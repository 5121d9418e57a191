//! Shared secret verification.

use std::sync::Arc;

use crate::config::validation::ValidationError;

/// Required length of the shared secret, in characters.
pub const SECRET_LEN: usize = 128;

/// Header carrying the caller's secret.
pub const SECRET_HEADER: &str = "x-proxy-secret";

/// Verifies presented tokens against the configured secret.
///
/// Cheap to clone; the secret is immutable after construction.
#[derive(Clone)]
pub struct SecretVerifier {
    secret: Arc<str>,
}

impl SecretVerifier {
    /// Build a verifier. Fails unless `secret` is exactly [`SECRET_LEN`] characters.
    pub fn new(secret: impl Into<String>) -> Result<Self, ValidationError> {
        let secret = secret.into();
        let actual = secret.chars().count();
        if actual != SECRET_LEN {
            return Err(ValidationError::SecretLength { actual });
        }
        Ok(Self {
            secret: Arc::from(secret),
        })
    }

    /// Check a presented token.
    ///
    /// Absent tokens and tokens of the wrong length are rejected without
    /// looking at their content. Otherwise every byte is compared.
    pub fn verify(&self, presented: Option<&str>) -> bool {
        let Some(presented) = presented else {
            return false;
        };
        if presented.chars().count() != SECRET_LEN {
            return false;
        }
        constant_time_eq(presented.as_bytes(), self.secret.as_bytes())
    }
}

impl std::fmt::Debug for SecretVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretVerifier").finish_non_exhaustive()
    }
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    std::hint::black_box(diff) == 0
}
