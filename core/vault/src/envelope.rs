//! Envelope format: the bundle of salt, nonce, ciphertext and metadata that
//! gets embedded into the carrier.
//!
//! # Wire Format
//! A JSON object with lowercase hex binary fields:
//!
//! ```json
//! {"salt":"..","nonce":"..","ciphertext":"..","ext":".txt","comp":true,"version":"2.1"}
//! ```
//!
//! The format is a stable contract. Version 2.0 is the baseline; version 2.1
//! additionally binds `version`, `ext` and `comp` to the ciphertext as AEAD
//! associated data. Both derive keys with [`KdfParams::V2`].
//!
//! Version 2.2 is written only for non-default KDF costs. It adds an
//! `argon2` object (`{"m":..,"t":..,"p":..}`) that is bound as associated
//! data too, so the envelope states exactly how its key was derived.

use serde::{Deserialize, Serialize};
use std::fmt;

use aethervault_common::{Error, Result};
use aethervault_crypto::{KdfParams, Nonce, Salt, NONCE_SIZE, SALT_LENGTH, TAG_SIZE};

/// Extension recorded when an envelope does not carry one.
pub const DEFAULT_EXTENSION: &str = ".dat";

/// Longest accepted original extension, in bytes.
pub const MAX_EXTENSION_LEN: usize = 255;

/// Domain separator for version 2.1 associated data.
const AAD_CONTEXT: &[u8] = b"aethervault-envelope";

/// Envelope format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    /// Baseline format: no associated data.
    pub const V2_0: Self = Self { major: 2, minor: 0 };

    /// Metadata bound as associated data.
    pub const V2_1: Self = Self { major: 2, minor: 1 };

    /// KDF parameters recorded and bound as associated data.
    pub const V2_2: Self = Self { major: 2, minor: 2 };

    /// Version written for the default KDF parameters.
    pub const CURRENT: Self = Self::V2_1;

    /// Version to write for envelopes sealed with `kdf`.
    pub fn for_kdf(kdf: KdfParams) -> Self {
        if kdf == KdfParams::V2 {
            Self::CURRENT
        } else {
            Self::V2_2
        }
    }

    /// Check if this version can be decrypted.
    pub fn is_supported(&self) -> bool {
        *self == Self::V2_0 || *self == Self::V2_1 || *self == Self::V2_2
    }

    /// Whether envelope metadata is authenticated with the ciphertext.
    pub fn binds_metadata(&self) -> bool {
        *self >= Self::V2_1
    }

    /// Whether the envelope carries its own KDF parameters.
    pub fn records_kdf(&self) -> bool {
        *self >= Self::V2_2
    }

    /// Parse `"major"` or `"major.minor"`.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::Format(format!("Invalid version: {:?}", value));
        let (major, minor) = match value.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (value, "0"),
        };
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Check that an extension is empty or a dot-prefixed name without path
/// separators.
pub fn validate_extension(ext: &str) -> Result<()> {
    if ext.is_empty() {
        return Ok(());
    }
    if !ext.starts_with('.') {
        return Err(Error::Format(format!(
            "Extension must start with '.': {:?}",
            ext
        )));
    }
    if ext.len() > MAX_EXTENSION_LEN {
        return Err(Error::Format("Extension too long".to_string()));
    }
    if ext.contains(['/', '\\', '\0']) {
        return Err(Error::Format(format!(
            "Extension contains a path separator: {:?}",
            ext
        )));
    }
    Ok(())
}

/// Encrypted file plus everything needed to decrypt it, except the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    version: FormatVersion,
    salt: Salt,
    nonce: Nonce,
    ciphertext: Vec<u8>,
    extension: String,
    compressed: bool,
    kdf: KdfParams,
}

impl Envelope {
    /// Build an envelope whose key was derived with [`KdfParams::V2`].
    ///
    /// Use [`with_kdf`](Self::with_kdf) for other parameters.
    ///
    /// # Errors
    /// - `Format` if the version is unsupported, the extension is invalid,
    ///   or the ciphertext is shorter than an authentication tag
    pub fn new(
        version: FormatVersion,
        salt: Salt,
        nonce: Nonce,
        ciphertext: Vec<u8>,
        extension: impl Into<String>,
        compressed: bool,
    ) -> Result<Self> {
        let extension = extension.into();
        if !version.is_supported() {
            return Err(Error::Format(format!("Unsupported version: {}", version)));
        }
        validate_extension(&extension)?;
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::Format(
                "Ciphertext shorter than authentication tag".to_string(),
            ));
        }
        Ok(Self {
            version,
            salt,
            nonce,
            ciphertext,
            extension,
            compressed,
            kdf: KdfParams::V2,
        })
    }

    /// Record the KDF parameters the key was derived with.
    ///
    /// # Errors
    /// - `Format` if the parameters are out of bounds, or differ from
    ///   [`KdfParams::V2`] on a version that cannot record them
    pub fn with_kdf(mut self, kdf: KdfParams) -> Result<Self> {
        if !self.version.records_kdf() && kdf != KdfParams::V2 {
            return Err(Error::Format(format!(
                "Version {} cannot record KDF parameters",
                self.version
            )));
        }
        kdf.check().map_err(|e| Error::Format(e.to_string()))?;
        self.kdf = kdf;
        Ok(self)
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Ciphertext with the authentication tag appended.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Original file extension including the leading dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Parameters to derive the key with.
    pub fn kdf_params(&self) -> KdfParams {
        self.kdf
    }

    /// Associated data the ciphertext was sealed with.
    pub fn associated_data(&self) -> Vec<u8> {
        Self::aad_for(self.version, self.kdf, &self.extension, self.compressed)
    }

    /// Associated data for a version and metadata, computed before the
    /// envelope exists. `kdf` only contributes from version 2.2 on.
    pub fn aad_for(
        version: FormatVersion,
        kdf: KdfParams,
        extension: &str,
        compressed: bool,
    ) -> Vec<u8> {
        if !version.binds_metadata() {
            return Vec::new();
        }
        let version_text = version.to_string();
        let mut aad =
            Vec::with_capacity(AAD_CONTEXT.len() + version_text.len() + extension.len() + 17);
        aad.extend_from_slice(AAD_CONTEXT);
        aad.push(0);
        aad.extend_from_slice(version_text.as_bytes());
        aad.push(0);
        aad.extend_from_slice(extension.as_bytes());
        aad.push(0);
        aad.push(u8::from(compressed));
        if version.records_kdf() {
            aad.push(0);
            for value in [kdf.memory_cost, kdf.time_cost, kdf.parallelism] {
                aad.extend_from_slice(&value.to_be_bytes());
            }
        }
        aad
    }

    /// Serialize to the JSON wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let wire = WireEnvelopeOut {
            salt: hex::encode(self.salt.as_bytes()),
            nonce: hex::encode(self.nonce.as_bytes()),
            ciphertext: hex::encode(&self.ciphertext),
            ext: &self.extension,
            comp: self.compressed,
            version: self.version.to_string(),
            argon2: self.version.records_kdf().then(|| WireKdf::from(self.kdf)),
        };
        serde_json::to_vec(&wire).map_err(|e| Error::Format(e.to_string()))
    }

    /// Deserialize from the JSON wire format.
    ///
    /// Unknown fields are ignored and a missing `version` means 2.0. In a
    /// 2.0 document a missing `comp` means uncompressed and a missing `ext`
    /// becomes [`DEFAULT_EXTENSION`]; 2.1 documents must carry both, and 2.2
    /// documents also `argon2`. Before 2.2 an `argon2` field is ignored.
    ///
    /// # Errors
    /// - `Format` for anything malformed or an unsupported version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let wire: WireEnvelopeIn =
            serde_json::from_slice(bytes).map_err(|e| Error::Format(e.to_string()))?;

        let version = match wire.version {
            None => FormatVersion::V2_0,
            Some(WireVersion::Text(text)) => FormatVersion::parse(&text)?,
            Some(WireVersion::Number(number)) => FormatVersion::parse(&number.to_string())?,
        };
        if !version.is_supported() {
            return Err(Error::Format(format!("Unsupported version: {}", version)));
        }
        // Bound metadata must be explicit, never defaulted.
        if version.binds_metadata() && (wire.ext.is_none() || wire.comp.is_none()) {
            return Err(Error::Format(format!(
                "Version {} requires ext and comp fields",
                version
            )));
        }

        let salt: [u8; SALT_LENGTH] = decode_fixed("salt", &wire.salt)?;
        let nonce: [u8; NONCE_SIZE] = decode_fixed("nonce", &wire.nonce)?;
        let ciphertext = decode_hex("ciphertext", &wire.ciphertext)?;

        let envelope = Self::new(
            version,
            Salt::from_bytes(salt),
            Nonce::from_bytes(nonce),
            ciphertext,
            wire.ext.unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            wire.comp.unwrap_or(false),
        )?;
        if !version.records_kdf() {
            return Ok(envelope);
        }
        let argon2 = wire.argon2.ok_or_else(|| {
            Error::Format(format!("Version {} requires the argon2 field", version))
        })?;
        let argon2: WireKdf = serde_json::from_value(argon2)
            .map_err(|e| Error::Format(format!("Field argon2: {}", e)))?;
        envelope.with_kdf(argon2.into())
    }

    /// Exact serialized length of an envelope holding an uncompressed
    /// plaintext of `plaintext_len` bytes, sealed with `kdf`.
    pub fn serialized_len(plaintext_len: usize, extension: &str, kdf: KdfParams) -> Result<usize> {
        let skeleton = Self::new(
            FormatVersion::for_kdf(kdf),
            Salt::from_bytes([0u8; SALT_LENGTH]),
            Nonce::from_bytes([0u8; NONCE_SIZE]),
            vec![0u8; TAG_SIZE],
            extension,
            false,
        )?
        .with_kdf(kdf)?;
        Ok(skeleton.to_bytes()?.len() + 2 * plaintext_len)
    }
}

/// Serialize an envelope (see [`Envelope::to_bytes`]).
pub fn serialize(envelope: &Envelope) -> Result<Vec<u8>> {
    envelope.to_bytes()
}

/// Deserialize an envelope (see [`Envelope::from_bytes`]).
pub fn deserialize(bytes: &[u8]) -> Result<Envelope> {
    Envelope::from_bytes(bytes)
}

#[derive(Serialize)]
struct WireEnvelopeOut<'a> {
    salt: String,
    nonce: String,
    ciphertext: String,
    ext: &'a str,
    comp: bool,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    argon2: Option<WireKdf>,
}

#[derive(Deserialize)]
struct WireEnvelopeIn {
    salt: String,
    nonce: String,
    ciphertext: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    comp: Option<bool>,
    #[serde(default)]
    version: Option<WireVersion>,
    // Kept raw: only 2.2 documents give it a meaning.
    #[serde(default)]
    argon2: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct WireKdf {
    m: u32,
    t: u32,
    p: u32,
}

impl From<KdfParams> for WireKdf {
    fn from(kdf: KdfParams) -> Self {
        Self {
            m: kdf.memory_cost,
            t: kdf.time_cost,
            p: kdf.parallelism,
        }
    }
}

impl From<WireKdf> for KdfParams {
    fn from(wire: WireKdf) -> Self {
        KdfParams::new(wire.m, wire.t, wire.p)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireVersion {
    Text(String),
    Number(f64),
}

/// Decode strictly lowercase hex so every encoding is canonical.
fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(Error::Format(format!("Field {} is not lowercase hex", field)));
    }
    hex::decode(value).map_err(|e| Error::Format(format!("Field {}: {}", field, e)))
}

fn decode_fixed<const N: usize>(field: &str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(field, value)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::Format(format!(
            "Field {} has {} bytes, expected {}",
            field,
            bytes.len(),
            N
        ))
    })
}
