//! Argon2id password-to-key derivation.
//!
//! Envelope formats 2.0 and 2.1 fix the parameters to [`KdfParams::V2`];
//! later formats record them next to the salt, bounded by the `MAX_*`
//! limits so that untrusted input cannot demand unbounded work.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::keys::{Salt, SymmetricKey, KEY_LENGTH};
use aethervault_common::{Error, Password, Result};

/// Largest accepted memory cost in KiB (1 GiB).
pub const MAX_MEMORY_COST: u32 = 1024 * 1024;

/// Largest accepted number of passes.
pub const MAX_TIME_COST: u32 = 16;

/// Largest accepted number of lanes.
pub const MAX_PARALLELISM: u32 = 16;

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Parameters used by envelope format 2.x: 64 MiB, 2 passes, 4 lanes.
    pub const V2: Self = Self {
        memory_cost: 64 * 1024,
        time_cost: 2,
        parallelism: 4,
    };

    /// Create custom parameters.
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Check that Argon2 accepts the parameters and that they stay within
    /// the `MAX_*` limits.
    ///
    /// # Errors
    /// - `Derivation` otherwise
    pub fn check(&self) -> Result<()> {
        self.to_argon2()?;
        if self.memory_cost > MAX_MEMORY_COST
            || self.time_cost > MAX_TIME_COST
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(Error::Derivation(format!(
                "KDF parameters exceed limits: m={} t={} p={}",
                self.memory_cost, self.time_cost, self.parallelism
            )));
        }
        Ok(())
    }

    fn to_argon2(self) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| Error::Derivation(format!("Invalid KDF parameters: {}", e)))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::V2
    }
}

/// Password-to-key derivation bound to one parameter set.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    params: Params,
}

impl KeyDerivation {
    /// Create a derivation with validated parameters.
    ///
    /// # Errors
    /// - `Derivation` if Argon2 rejects the parameters or they exceed the
    ///   limits
    pub fn new(params: KdfParams) -> Result<Self> {
        params.check()?;
        Ok(Self {
            params: params.to_argon2()?,
        })
    }

    /// Derive a 256-bit key. Same password and salt always give the same key.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty password
    /// - `Derivation` if Argon2 fails
    pub fn derive(&self, password: &Password, salt: &Salt) -> Result<SymmetricKey> {
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let mut key_bytes = Zeroizing::new([0u8; KEY_LENGTH]);
        argon2
            .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut *key_bytes)
            .map_err(|e| Error::Derivation(format!("Key derivation failed: {}", e)))?;

        Ok(SymmetricKey::from_bytes(*key_bytes))
    }
}

/// Derive a key from a password and salt with the given parameters.
pub fn derive_key(password: &Password, salt: &Salt, params: KdfParams) -> Result<SymmetricKey> {
    KeyDerivation::new(params)?.derive(password, salt)
}
