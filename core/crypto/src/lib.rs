//! Password-based encryption for AetherVault.
//!
//! A [`CipherSuite`] names the Argon2id parameters; [`KeyDerivation`] turns
//! a password and [`Salt`] into a [`SymmetricKey`], and
//! [`AuthenticatedCipher`] seals data under a fresh [`Nonce`] with
//! ChaCha20-Poly1305. Keys are wiped on drop and never logged.

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod suite;

pub use aead::{AuthenticatedCipher, Nonce, NONCE_SIZE, TAG_SIZE};
pub use kdf::{
    derive_key, KdfParams, KeyDerivation, MAX_MEMORY_COST, MAX_PARALLELISM, MAX_TIME_COST,
};
pub use keys::{Salt, SymmetricKey, KEY_LENGTH, SALT_LENGTH};
pub use suite::CipherSuite;
