//! Capacity arithmetic for LSB embedding.
//!
//! Every pixel contributes one bit per color channel. A frame header
//! precedes the payload, so the usable payload is the raw capacity minus
//! the header.

/// Color channels carrying data per pixel (R, G, B).
pub const CHANNELS_USED: u64 = 3;

/// Bits written into each used channel.
pub const BITS_PER_CHANNEL: u64 = 1;

/// Frame header: magic (4) + payload length (4) + CRC-32 (4).
pub const FRAME_HEADER_LEN: usize = 12;

/// Raw embedding capacity of a `width` x `height` carrier, in bits.
pub fn capacity_bits(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * CHANNELS_USED * BITS_PER_CHANNEL
}

/// Bits needed to embed a payload of `payload_len` bytes, header included.
pub fn required_bits(payload_len: usize) -> u64 {
    (FRAME_HEADER_LEN as u64 + payload_len as u64) * 8
}

/// Largest payload, in bytes, that fits into a `width` x `height` carrier.
///
/// Also bounded by the 32-bit length field of the frame header.
pub fn max_payload_len(width: u32, height: u32) -> usize {
    let capacity_bytes = capacity_bits(width, height) / 8;
    let payload = capacity_bytes
        .saturating_sub(FRAME_HEADER_LEN as u64)
        .min(u64::from(u32::MAX));
    usize::try_from(payload).unwrap_or(usize::MAX)
}

/// Check whether a payload of `payload_len` bytes fits.
pub fn fits(width: u32, height: u32, payload_len: usize) -> bool {
    payload_len <= max_payload_len(width, height)
        && required_bits(payload_len) <= capacity_bits(width, height)
}
