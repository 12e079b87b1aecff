//! Encrypt and decrypt orchestration.
//!
//! # Encrypt
//! read source, compress, derive key, encrypt, build envelope, serialize,
//! obtain carrier, embed, write PNG.
//!
//! # Decrypt
//! load carrier, extract, deserialize, derive key, decrypt, decompress,
//! write file.
//!
//! Every step reports to the configured [`ProgressSink`]. A run that fails
//! leaves no output file.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use aethervault_common::{Error, Password, Result};
use aethervault_crypto::{AuthenticatedCipher, KdfParams, KeyDerivation, Nonce, Salt};
use aethervault_stego::{capacity, embed, extract, CarrierImage, CoverProvider};

use crate::compression::Compressor;
use crate::config::PipelineConfig;
use crate::envelope::{validate_extension, Envelope, FormatVersion};
use crate::naming::{self, Mode};
use crate::output;
use crate::progress::{NoProgress, ProgressSink, Stage};

/// Plaintext and original extension recovered from a vault image.
pub struct Recovered {
    pub data: Zeroizing<Vec<u8>>,
    pub extension: String,
}

impl std::fmt::Debug for Recovered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recovered")
            .field("data", &format_args!("[{} bytes]", self.data.len()))
            .field("extension", &self.extension)
            .finish()
    }
}

/// Stage reporting for a single item.
struct Run<'a> {
    sink: &'a dyn ProgressSink,
    item: &'a Path,
}

impl Run<'_> {
    fn step(&self, stage: Stage) {
        debug!(item = %self.item.display(), stage = %stage, "Pipeline stage");
        self.sink.stage(self.item, stage);
    }

    fn finish<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.step(Stage::Done),
            Err(e) => {
                warn!(item = %self.item.display(), error = %e, "Pipeline run failed");
                self.step(Stage::Failed);
            }
        }
        result
    }
}

/// Immutable encrypt/decrypt pipeline, shareable across threads.
pub struct VaultPipeline {
    config: PipelineConfig,
    kdf: KeyDerivation,
    compressor: Compressor,
    cover: Box<dyn CoverProvider>,
    progress: Arc<dyn ProgressSink>,
}

impl VaultPipeline {
    /// Build a pipeline using the cover source named in `config`.
    ///
    /// # Errors
    /// - `InvalidInput` / `Derivation` if the configuration does not validate
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let cover = config.cover.build_provider();
        Self::with_cover(config, cover)
    }

    /// Build a pipeline with an explicit cover provider.
    pub fn with_cover(config: PipelineConfig, cover: Box<dyn CoverProvider>) -> Result<Self> {
        config.validate()?;
        let kdf = config.suite.key_derivation()?;
        let compressor = Compressor::new(config.compression)?;
        Ok(Self {
            config,
            kdf,
            compressor,
            cover,
            progress: Arc::new(NoProgress),
        })
    }

    /// Report stages to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name of the cover provider in use.
    pub fn cover_name(&self) -> &str {
        self.cover.name()
    }

    fn run<'a>(&'a self, item: &'a Path) -> Run<'a> {
        Run {
            sink: self.progress.as_ref(),
            item,
        }
    }

    /// Largest uncompressed plaintext guaranteed to fit a `width` x `height`
    /// carrier when stored with extension `ext` and sealed with `kdf`.
    ///
    /// # Errors
    /// - `Format` if `ext` is not a valid extension or `kdf` is out of bounds
    pub fn max_plaintext_len(width: u32, height: u32, ext: &str, kdf: KdfParams) -> Result<usize> {
        let max_payload = capacity::max_payload_len(width, height);
        let empty_envelope = Envelope::serialized_len(0, ext, kdf)?;
        Ok(max_payload.saturating_sub(empty_envelope) / 2)
    }

    /// Compress and encrypt `plaintext` into an envelope.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty password
    /// - `Format` for an invalid extension
    pub fn seal(&self, plaintext: &[u8], ext: &str, password: &Password) -> Result<Envelope> {
        let run = self.run(Path::new(""));
        run.finish(self.seal_steps(&run, plaintext, ext, password))
    }

    /// Decrypt an envelope back to the original plaintext.
    ///
    /// # Errors
    /// - `Integrity` for a wrong password or tampered envelope
    /// - `Format` if the decrypted payload does not decompress
    pub fn open(&self, envelope: &Envelope, password: &Password) -> Result<Zeroizing<Vec<u8>>> {
        let run = self.run(Path::new(""));
        run.finish(self.open_steps(&run, envelope, password))
    }

    /// Encrypt `plaintext` into a fresh cover image, in memory.
    pub fn encrypt_to_carrier(
        &self,
        plaintext: &[u8],
        ext: &str,
        password: &Password,
    ) -> Result<CarrierImage> {
        let run = self.run(Path::new(""));
        let result = self
            .seal_steps(&run, plaintext, ext, password)
            .and_then(|envelope| self.embed_steps(&run, &envelope));
        run.finish(result)
    }

    /// Recover plaintext and extension from a vault image, in memory.
    pub fn decrypt_carrier(&self, carrier: &CarrierImage, password: &Password) -> Result<Recovered> {
        let run = self.run(Path::new(""));
        let result = self.extract_steps(&run, carrier).and_then(|envelope| {
            let data = self.open_steps(&run, &envelope, password)?;
            Ok(Recovered {
                data,
                extension: envelope.extension().to_string(),
            })
        });
        run.finish(result)
    }

    /// Encrypt a file into `<stem>_VAULT.png` next to it (or into the
    /// configured output directory).
    ///
    /// Returns the path actually written.
    pub fn encrypt_file(&self, source: &Path, password: &Password) -> Result<PathBuf> {
        self.encrypt_file_to(source, None, password)
    }

    /// Like [`encrypt_file`](Self::encrypt_file), writing into `output_dir`
    /// when given.
    pub fn encrypt_file_to(
        &self,
        source: &Path,
        output_dir: Option<&Path>,
        password: &Password,
    ) -> Result<PathBuf> {
        let run = self.run(source);
        let result = self.encrypt_file_steps(&run, source, output_dir, password);
        if let Ok(path) = &result {
            info!(source = %source.display(), output = %path.display(), "File encrypted");
        }
        run.finish(result)
    }

    /// Decrypt a vault image into `<stem>_RECOVERED<ext>` next to it (or
    /// into the configured output directory).
    ///
    /// # Errors
    /// - `NotFound` if the image carries nothing
    /// - `Integrity` for a wrong password or a damaged image
    pub fn decrypt_file(&self, carrier: &Path, password: &Password) -> Result<PathBuf> {
        self.decrypt_file_to(carrier, None, password)
    }

    /// Like [`decrypt_file`](Self::decrypt_file), writing into `output_dir`
    /// when given.
    pub fn decrypt_file_to(
        &self,
        carrier: &Path,
        output_dir: Option<&Path>,
        password: &Password,
    ) -> Result<PathBuf> {
        let run = self.run(carrier);
        let result = self.decrypt_file_steps(&run, carrier, output_dir, password);
        if let Ok(path) = &result {
            info!(carrier = %carrier.display(), output = %path.display(), "File decrypted");
        }
        run.finish(result)
    }

    /// Run `mode` on `path`.
    pub fn process_file(
        &self,
        path: &Path,
        mode: Mode,
        output_dir: Option<&Path>,
        password: &Password,
    ) -> Result<PathBuf> {
        match mode {
            Mode::Encrypt => self.encrypt_file_to(path, output_dir, password),
            Mode::Decrypt => self.decrypt_file_to(path, output_dir, password),
        }
    }

    fn output_dir<'a>(&'a self, explicit: Option<&'a Path>) -> Option<&'a Path> {
        explicit.or(self.config.output_dir.as_deref())
    }

    fn seal_steps(
        &self,
        run: &Run<'_>,
        plaintext: &[u8],
        ext: &str,
        password: &Password,
    ) -> Result<Envelope> {
        validate_extension(ext)?;

        run.step(Stage::Compress);
        let (payload, compressed) = self.compressor.maybe_compress(plaintext);
        let payload = Zeroizing::new(payload);

        run.step(Stage::DeriveKey);
        let salt = Salt::generate();
        let key = self.kdf.derive(password, &salt)?;

        run.step(Stage::Encrypt);
        let kdf = self.config.suite.kdf;
        let version = FormatVersion::for_kdf(kdf);
        let nonce = Nonce::generate();
        let aad = Envelope::aad_for(version, kdf, ext, compressed);
        let ciphertext = AuthenticatedCipher::new(&key).encrypt(&nonce, &payload, &aad)?;
        drop(key);

        run.step(Stage::BuildEnvelope);
        Envelope::new(version, salt, nonce, ciphertext, ext, compressed)?.with_kdf(kdf)
    }

    fn open_steps(
        &self,
        run: &Run<'_>,
        envelope: &Envelope,
        password: &Password,
    ) -> Result<Zeroizing<Vec<u8>>> {
        run.step(Stage::DeriveKey);
        // The envelope, not the local configuration, decides the parameters.
        let key = if envelope.kdf_params() == self.config.suite.kdf {
            self.kdf.derive(password, envelope.salt())?
        } else {
            KeyDerivation::new(envelope.kdf_params())?.derive(password, envelope.salt())?
        };

        run.step(Stage::Decrypt);
        let payload = Zeroizing::new(AuthenticatedCipher::new(&key).decrypt(
            envelope.nonce(),
            envelope.ciphertext(),
            &envelope.associated_data(),
        )?);
        drop(key);

        if !envelope.is_compressed() {
            return Ok(payload);
        }
        run.step(Stage::Decompress);
        let plaintext = self.compressor.decompress_if_needed(&payload, true)?;
        Ok(Zeroizing::new(plaintext))
    }

    fn embed_steps(&self, run: &Run<'_>, envelope: &Envelope) -> Result<CarrierImage> {
        run.step(Stage::SerializeEnvelope);
        let payload = envelope.to_bytes()?;

        run.step(Stage::ObtainCarrier);
        let cover = self.cover.provide_cover_image()?;
        let max = cover.max_payload_len();
        if payload.len() > max {
            return Err(Error::CapacityExceeded {
                required: payload.len(),
                max,
            });
        }
        debug!(
            provider = self.cover.name(),
            width = cover.width(),
            height = cover.height(),
            payload_len = payload.len(),
            "Cover obtained"
        );

        run.step(Stage::Embed);
        embed(&cover, &payload)
    }

    fn extract_steps(&self, run: &Run<'_>, carrier: &CarrierImage) -> Result<Envelope> {
        run.step(Stage::Extract);
        let payload = extract(carrier)?;

        run.step(Stage::DeserializeEnvelope);
        Envelope::from_bytes(&payload)
    }

    fn encrypt_file_steps(
        &self,
        run: &Run<'_>,
        source: &Path,
        output_dir: Option<&Path>,
        password: &Password,
    ) -> Result<PathBuf> {
        run.step(Stage::ReadSource);
        let plaintext =
            Zeroizing::new(fs::read(source).map_err(|e| Error::from_source_io(e, source))?);
        let ext = naming::source_extension(source);

        let envelope = self.seal_steps(run, &plaintext, &ext, password)?;
        let stego = self.embed_steps(run, &envelope)?;

        run.step(Stage::WriteOutput);
        let target = naming::encrypted_output_path(source, self.output_dir(output_dir));
        output::write_atomic(&target, self.config.collision, |file| {
            let mut writer = BufWriter::new(file);
            stego.write_png(&mut writer)?;
            writer.flush()?;
            Ok(())
        })
    }

    fn decrypt_file_steps(
        &self,
        run: &Run<'_>,
        carrier: &Path,
        output_dir: Option<&Path>,
        password: &Password,
    ) -> Result<PathBuf> {
        run.step(Stage::LoadCarrier);
        let image = CarrierImage::load(carrier)?;

        let envelope = self.extract_steps(run, &image)?;
        let plaintext = self.open_steps(run, &envelope, password)?;

        run.step(Stage::WriteOutput);
        let target =
            naming::recovered_output_path(carrier, envelope.extension(), self.output_dir(output_dir));
        output::write_atomic(&target, self.config.collision, |file| {
            file.write_all(&plaintext)?;
            Ok(())
        })
    }
}
