//! LSB steganography for AetherVault.
//!
//! This crate provides:
//! - A normalized carrier image type with lossless encoding
//! - Capacity arithmetic for the embedding scheme
//! - Deterministic embedding and extraction of length-prefixed payloads
//! - Cover image providers (offline gradient, file, remote, fallback chain)
//!
//! # Embedding Layout
//! One bit per color channel (R, G, B), least-significant bit only, pixels
//! visited in row-major order. Alpha channels are never modified.

pub mod capacity;
pub mod carrier;
pub mod cover;
pub mod embed;

pub use capacity::{capacity_bits, max_payload_len, FRAME_HEADER_LEN};
pub use carrier::CarrierImage;
pub use cover::{CoverProvider, FallbackCover, FileCover, GradientCover, RemoteCover};
pub use embed::{embed, extract};
