//! Authenticated encryption using ChaCha20-Poly1305.
//!
//! ChaCha20-Poly1305 (RFC 8439) provides both confidentiality and
//! authenticity with a 256-bit key, 96-bit nonce and 128-bit tag. The tag is
//! appended to the ciphertext.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305,
};

use crate::keys::SymmetricKey;
use aethervault_common::{Error, Result};

/// Nonce size for ChaCha20-Poly1305 (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Per-message nonce, stored in clear next to the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a random nonce from the OS CSPRNG.
    ///
    /// A (key, nonce) pair must never repeat; a fresh nonce is drawn for
    /// every encryption.
    pub fn generate() -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        Self(nonce)
    }

    /// Create from bytes read back from an envelope.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// AEAD cipher bound to a derived key for the duration of one operation.
pub struct AuthenticatedCipher<'a> {
    key: &'a SymmetricKey,
}

impl<'a> AuthenticatedCipher<'a> {
    /// Bind the cipher to a key.
    pub fn new(key: &'a SymmetricKey) -> Self {
        Self { key }
    }

    /// Encrypt plaintext, returning ciphertext || tag.
    ///
    /// # Postconditions
    /// - The ciphertext length is plaintext length + TAG_SIZE
    ///
    /// # Errors
    /// - `InvalidInput` if the plaintext exceeds the cipher's message limit
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(GenericArray::from_slice(self.key.as_bytes()));

        cipher
            .encrypt(
                GenericArray::from_slice(nonce.as_bytes()),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| Error::InvalidInput("Plaintext too large to encrypt".to_string()))
    }

    /// Decrypt ciphertext || tag.
    ///
    /// # Errors
    /// - `Integrity` if the input is shorter than a tag or the tag does not
    ///   verify. Wrong keys and tampered data are not distinguished.
    ///
    /// # Security
    /// - Authenticates before releasing any plaintext
    pub fn decrypt(&self, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::Integrity);
        }

        let cipher = ChaCha20Poly1305::new(GenericArray::from_slice(self.key.as_bytes()));

        cipher
            .decrypt(
                GenericArray::from_slice(nonce.as_bytes()),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| Error::Integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LENGTH;
    use proptest::prelude::*;

    fn key(byte: u8) -> SymmetricKey {
        SymmetricKey::from_bytes([byte; KEY_LENGTH])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = key(42);
        let cipher = AuthenticatedCipher::new(&key);
        let nonce = Nonce::generate();
        let plaintext = b"Hello, World!";

        let ciphertext = cipher.encrypt(&nonce, plaintext, b"").unwrap();
        let decrypted = cipher.decrypt(&nonce, &ciphertext, b"").unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = key(42);
        let plaintext = b"Test message";

        let ciphertext = AuthenticatedCipher::new(&key)
            .encrypt(&Nonce::generate(), plaintext, b"")
            .unwrap();

        assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let nonce1 = Nonce::generate();
        let nonce2 = Nonce::generate();
        assert_ne!(nonce1, nonce2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = key(1);
        let key2 = key(2);
        let nonce = Nonce::generate();

        let ciphertext = AuthenticatedCipher::new(&key1)
            .encrypt(&nonce, b"Secret data", b"")
            .unwrap();
        let result = AuthenticatedCipher::new(&key2).decrypt(&nonce, &ciphertext, b"");

        assert!(matches!(result, Err(Error::Integrity)));
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let key = key(3);
        let cipher = AuthenticatedCipher::new(&key);
        let nonce = Nonce::generate();

        let ciphertext = cipher.encrypt(&nonce, b"data", b"ext=.txt").unwrap();
        assert!(cipher.decrypt(&nonce, &ciphertext, b"ext=.txt").is_ok());
        assert!(matches!(
            cipher.decrypt(&nonce, &ciphertext, b"ext=.exe"),
            Err(Error::Integrity)
        ));
    }

    #[test]
    fn test_short_ciphertext_is_integrity_error() {
        let key = key(4);
        let result = AuthenticatedCipher::new(&key).decrypt(&Nonce::generate(), &[0u8; 5], b"");
        assert!(matches!(result, Err(Error::Integrity)));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = key(42);
        let cipher = AuthenticatedCipher::new(&key);
        let nonce = Nonce::generate();

        let ciphertext = cipher.encrypt(&nonce, b"", b"").unwrap();
        assert_eq!(ciphertext.len(), TAG_SIZE);
        assert!(cipher.decrypt(&nonce, &ciphertext, b"").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_any_bit_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            flip in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = key(9);
            let cipher = AuthenticatedCipher::new(&key);
            let nonce = Nonce::generate();

            let mut ciphertext = cipher.encrypt(&nonce, &plaintext, b"").unwrap();
            let idx = flip.index(ciphertext.len());
            ciphertext[idx] ^= 1 << bit;

            prop_assert!(matches!(
                cipher.decrypt(&nonce, &ciphertext, b""),
                Err(Error::Integrity)
            ));
        }
    }
}
