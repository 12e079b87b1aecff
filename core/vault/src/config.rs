//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use aethervault_common::{Error, Result};
use aethervault_crypto::CipherSuite;
use aethervault_stego::cover::{DEFAULT_HEIGHT, DEFAULT_REMOTE_URL, DEFAULT_WIDTH};
use aethervault_stego::{CoverProvider, FallbackCover, FileCover, GradientCover, RemoteCover};

use crate::compression::{CompressionConfig, MAX_LEVEL};
use crate::output::CollisionPolicy;

/// Default number of concurrent batch items.
///
/// Each in-flight item holds one Argon2 memory block.
pub const DEFAULT_WORKERS: usize = 2;

/// Where cover images come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverSource {
    /// Offline gradient generator.
    Generated,
    /// HTTP download.
    Remote,
    /// A fixed image on disk.
    File { path: PathBuf },
}

/// Cover image settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverSettings {
    pub source: CoverSource,
    /// Resolution of generated and downloaded covers.
    pub width: u32,
    pub height: u32,
    /// URL template for remote covers.
    pub remote_url: String,
    /// Remote download timeout in seconds.
    pub timeout_secs: u64,
    /// Fall back to a generated cover if the primary source fails.
    pub fallback: bool,
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            source: CoverSource::Generated,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            timeout_secs: 30,
            fallback: true,
        }
    }
}

impl CoverSettings {
    /// Build the provider these settings describe.
    pub fn build_provider(&self) -> Box<dyn CoverProvider> {
        let primary: Box<dyn CoverProvider> = match &self.source {
            CoverSource::Generated => return Box::new(self.generator()),
            CoverSource::Remote => Box::new(RemoteCover::new(
                self.remote_url.clone(),
                self.width,
                self.height,
                Duration::from_secs(self.timeout_secs),
            )),
            CoverSource::File { path } => Box::new(FileCover::new(path.clone())),
        };

        if self.fallback {
            Box::new(FallbackCover::new(primary, Box::new(self.generator())))
        } else {
            primary
        }
    }

    fn generator(&self) -> GradientCover {
        GradientCover::new(self.width, self.height)
    }
}

/// Immutable settings of a [`VaultPipeline`](crate::VaultPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cipher suite, including KDF parameters.
    pub suite: CipherSuite,
    pub compression: CompressionConfig,
    pub collision: CollisionPolicy,
    /// Concurrent batch items.
    pub workers: usize,
    pub cover: CoverSettings,
    /// Write outputs here instead of next to the inputs.
    pub output_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            suite: CipherSuite::default(),
            compression: CompressionConfig::default(),
            collision: CollisionPolicy::default(),
            workers: DEFAULT_WORKERS,
            cover: CoverSettings::default(),
            output_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Check the configuration for values the pipeline cannot run with.
    ///
    /// # Errors
    /// - `InvalidInput` for zero workers, a zero cover resolution or an
    ///   out-of-range compression level
    /// - `Derivation` for rejected KDF parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidInput("workers must be at least 1".to_string()));
        }
        if self.cover.width == 0 || self.cover.height == 0 {
            return Err(Error::InvalidInput(
                "cover resolution must be non-zero".to_string(),
            ));
        }
        if self.compression.level > MAX_LEVEL {
            return Err(Error::InvalidInput(format!(
                "compression level must be at most {}",
                MAX_LEVEL
            )));
        }
        self.suite.key_derivation()?;
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Deserialize configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| Error::from_source_io(e, path))?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aethervault_crypto::KdfParams;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.suite, CipherSuite::V2);
        assert_eq!(config.collision, CollisionPolicy::AutoRename);
        assert!(config.compression.enabled);
        assert_eq!(config.compression.level, 9);
        assert_eq!(config.cover.source, CoverSource::Generated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = PipelineConfig::default();
        config.workers = 8;
        config.collision = CollisionPolicy::Fail;
        config.cover.source = CoverSource::File {
            path: PathBuf::from("/tmp/cover.png"),
        };

        let restored = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json(
            r#"{"workers": 3, "compression": {"enabled": false}, "cover": {"source": {"kind": "remote"}}}"#,
        )
        .unwrap();

        assert_eq!(config.workers, 3);
        assert!(!config.compression.enabled);
        assert_eq!(config.compression.level, 9);
        assert_eq!(config.cover.source, CoverSource::Remote);
        assert_eq!(config.cover.width, DEFAULT_WIDTH);
        assert_eq!(config.suite, CipherSuite::V2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.workers = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));

        let mut config = PipelineConfig::default();
        config.cover.height = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.suite = CipherSuite::with_kdf(KdfParams::new(1, 0, 0));
        assert!(matches!(config.validate(), Err(Error::Derivation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aethervault.json");
        std::fs::write(&path, r#"{"collision": "overwrite"}"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.collision, CollisionPolicy::Overwrite);

        let missing = PipelineConfig::load(&dir.path().join("none.json"));
        assert!(matches!(missing, Err(Error::SourceNotFound(_))));
    }

    #[test]
    fn test_generated_provider() {
        let mut settings = CoverSettings::default();
        settings.width = 8;
        settings.height = 4;

        let provider = settings.build_provider();
        assert_eq!(provider.name(), "gradient");
        assert_eq!(provider.provide_cover_image().unwrap().width(), 8);
    }

    #[test]
    fn test_file_provider_falls_back() {
        let settings = CoverSettings {
            source: CoverSource::File {
                path: PathBuf::from("/nonexistent/cover.png"),
            },
            width: 10,
            height: 10,
            ..CoverSettings::default()
        };

        let provider = settings.build_provider();
        assert_eq!(provider.name(), "fallback");
        assert_eq!(provider.provide_cover_image().unwrap().height(), 10);

        let strict = CoverSettings {
            fallback: false,
            ..settings
        };
        assert!(strict.build_provider().provide_cover_image().is_err());
    }
}
