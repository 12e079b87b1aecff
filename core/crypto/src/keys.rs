//! Password-derived keys and the salts they are derived with.

use chacha20poly1305::aead::{rand_core::RngCore, OsRng};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of key derivation salts in bytes.
pub const SALT_LENGTH: usize = 16;

/// Symmetric key derived from a password.
///
/// Never stored; lives only for the duration of one cipher operation.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_LENGTH],
}

impl SymmetricKey {
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Raw key material. Hand it straight to the cipher.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// Salt for key derivation, stored in clear next to the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salts_are_unique() {
        let salts: Vec<Salt> = (0..8).map(|_| Salt::generate()).collect();
        for (i, a) in salts.iter().enumerate() {
            assert!(salts[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = SymmetricKey::from_bytes([7u8; KEY_LENGTH]);
        assert_eq!(format!("{:?}", key), "SymmetricKey([REDACTED])");
    }
}
