//! Common types used throughout AetherVault.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// User-supplied password that zeroizes on drop.
///
/// The password is only ever handed to key derivation; it is never stored
/// alongside the envelope or logged.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Password(String);

impl Password {
    /// Wrap a password string.
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Get the password bytes (UTF-8).
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password([REDACTED])")
    }
}
