//! Immutable cipher suite configuration.

use serde::{Deserialize, Serialize};

use crate::aead::{NONCE_SIZE, TAG_SIZE};
use crate::kdf::{KdfParams, KeyDerivation};
use crate::keys::{KEY_LENGTH, SALT_LENGTH};
use aethervault_common::Result;

/// Parameter set shared by key derivation and the AEAD cipher.
///
/// Salt, nonce, key and tag sizes are fixed by the algorithms; only the KDF
/// cost is configurable. Envelopes sealed with a non-default cost record it,
/// so any reader can open them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CipherSuite {
    /// Argon2id cost parameters.
    #[serde(default)]
    pub kdf: KdfParams,
}

impl CipherSuite {
    pub const SALT_LEN: usize = SALT_LENGTH;
    pub const NONCE_LEN: usize = NONCE_SIZE;
    pub const KEY_LEN: usize = KEY_LENGTH;
    pub const TAG_LEN: usize = TAG_SIZE;

    /// Suite matching envelope format 2.x.
    pub const V2: Self = Self { kdf: KdfParams::V2 };

    /// Create a suite with custom KDF parameters.
    pub fn with_kdf(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    /// Build the key derivation for this suite.
    ///
    /// # Errors
    /// - `Derivation` if the KDF parameters are invalid
    pub fn key_derivation(&self) -> Result<KeyDerivation> {
        KeyDerivation::new(self.kdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_is_default() {
        assert_eq!(CipherSuite::default(), CipherSuite::V2);
        assert_eq!(CipherSuite::SALT_LEN, 16);
        assert_eq!(CipherSuite::NONCE_LEN, 12);
        assert_eq!(CipherSuite::KEY_LEN, 32);
        assert_eq!(CipherSuite::TAG_LEN, 16);
    }

    #[test]
    fn test_missing_kdf_uses_defaults() {
        let suite: CipherSuite = serde_json::from_str("{}").unwrap();
        assert_eq!(suite.kdf, KdfParams::V2);
        assert!(suite.key_derivation().is_ok());
    }
}
