//! Deterministic LSB embedding and extraction.
//!
//! # Frame Format
//! - magic `AVx1` (4 bytes)
//! - payload length, u32 big-endian (4 bytes)
//! - CRC-32 of the payload, u32 big-endian (4 bytes)
//! - payload
//!
//! Bits are written MSB-first. Slot `i` of the bit stream lives in pixel
//! `i / 3` (row-major) and channel `i % 3` (R, G, B). Embed and extract
//! share [`slot_offset`], so both directions always walk the same order.

use tracing::debug;

use crate::capacity::{self, FRAME_HEADER_LEN};
use crate::carrier::CarrierImage;
use aethervault_common::{Error, Result};

/// Frame marker identifying an AetherVault payload.
pub const MAGIC: [u8; 4] = *b"AVx1";

/// Sample offset of bit slot `slot` in an interleaved buffer.
fn slot_offset(slot: usize, stride: usize) -> usize {
    (slot / capacity::CHANNELS_USED as usize) * stride + slot % capacity::CHANNELS_USED as usize
}

fn build_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&crc32fast::hash(payload).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Embed `payload` into a copy of `carrier`.
///
/// # Postconditions
/// - The returned carrier differs from the input only in the LSBs of the
///   R, G, B samples of the first `(12 + payload.len()) * 8 / 3` pixels
/// - `extract` on the result returns `payload`
///
/// # Errors
/// - `CapacityExceeded` if the payload does not fit; nothing is truncated
pub fn embed(carrier: &CarrierImage, payload: &[u8]) -> Result<CarrierImage> {
    let max = carrier.max_payload_len();
    if !capacity::fits(carrier.width(), carrier.height(), payload.len()) {
        return Err(Error::CapacityExceeded {
            required: payload.len(),
            max,
        });
    }

    let frame = build_frame(payload);
    let mut stego = carrier.clone();
    let (samples, stride) = stego.samples_mut();

    let bits = frame
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1));
    for (slot, bit) in bits.enumerate() {
        let offset = slot_offset(slot, stride);
        samples[offset] = (samples[offset] & !1) | bit;
    }

    debug!(
        payload_len = payload.len(),
        max_payload_len = max,
        "Payload embedded"
    );
    Ok(stego)
}

/// Sequential reader over the LSB slots of a carrier.
struct LsbReader<'a> {
    samples: &'a [u8],
    stride: usize,
    slot: usize,
    slots: usize,
}

impl<'a> LsbReader<'a> {
    fn new(carrier: &'a CarrierImage) -> Self {
        let (samples, stride) = carrier.samples();
        let slots = (samples.len() / stride) * capacity::CHANNELS_USED as usize;
        Self {
            samples,
            stride,
            slot: 0,
            slots,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.slot + 8 > self.slots {
            return None;
        }
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | (self.samples[slot_offset(self.slot, self.stride)] & 1);
            self.slot += 1;
        }
        Some(byte)
    }

    fn read_bytes(&mut self, len: usize) -> Option<Vec<u8>> {
        (0..len).map(|_| self.read_byte()).collect()
    }
}

/// Extract a payload previously written by [`embed`].
///
/// # Errors
/// - `NotFound` if the carrier has no frame marker or a length that cannot
///   fit, i.e. nothing was embedded
/// - `Integrity` if a frame is present but its checksum does not match
pub fn extract(carrier: &CarrierImage) -> Result<Vec<u8>> {
    let mut reader = LsbReader::new(carrier);

    let header = reader.read_bytes(FRAME_HEADER_LEN).ok_or(Error::NotFound)?;
    if header[..4] != MAGIC {
        return Err(Error::NotFound);
    }

    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let expected_crc = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    if len > carrier.max_payload_len() {
        debug!(len, "Frame length exceeds carrier capacity");
        return Err(Error::NotFound);
    }

    let payload = reader.read_bytes(len).ok_or(Error::NotFound)?;
    if crc32fast::hash(&payload) != expected_crc {
        debug!(len, "Frame checksum mismatch");
        return Err(Error::Integrity);
    }

    debug!(payload_len = len, "Payload extracted");
    Ok(payload)
}
