//! Common utilities and types shared across AetherVault crates.
//!
//! This crate provides the error taxonomy used by every pipeline stage and
//! the sensitive value wrappers that keep secrets out of logs.

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::Password;
