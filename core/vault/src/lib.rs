//! Encrypt-then-hide pipeline for AetherVault.
//!
//! This module provides:
//! - The versioned envelope format carried inside vault images
//! - Optional compression of plaintext before encryption
//! - The encrypt/decrypt pipeline over files and in-memory carriers
//! - Output naming, collision handling and atomic writes
//! - A cancellable batch runner with per-item reports
//!
//! # Architecture
//! The pipeline sits on top of `aethervault-crypto` (key derivation and
//! AEAD) and `aethervault-stego` (carrier images and LSB embedding). It owns
//! no mutable state and can be shared across worker threads.

pub mod batch;
pub mod compression;
pub mod config;
pub mod envelope;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;

pub use batch::{jobs_for, BatchRunner, BatchSummary, Job, JobReport};
pub use compression::{CompressionConfig, Compressor};
pub use config::{CoverSettings, CoverSource, PipelineConfig};
pub use envelope::{Envelope, FormatVersion};
pub use naming::Mode;
pub use output::CollisionPolicy;
pub use pipeline::{Recovered, VaultPipeline};
pub use progress::{NoProgress, ProgressSink, Stage};
