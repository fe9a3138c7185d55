use bytes::{BufMut, BytesMut};

use crate::layout::Framing;

/// Size of the binary-framing length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode one frame's bytes into `dst`, truncating `payload` to `capacity`.
///
/// Wire format:
/// ```text
/// Text:    ┌──────────────────────┬──────┐
///          │ payload              │ 0x00 │
///          └──────────────────────┴──────┘
/// Binary:  ┌──────────────┬───────────────────────┐
///          │ length (4B LE)│ payload (length bytes)│
///          └──────────────┴───────────────────────┘
/// ```
///
/// Returns the number of payload bytes encoded. `dst` is cleared first.
pub fn encode_payload(payload: &[u8], framing: Framing, capacity: usize, dst: &mut BytesMut) -> usize {
    let len = payload.len().min(capacity);
    dst.clear();
    match framing {
        Framing::Text => {
            dst.reserve(len + 1);
            dst.put_slice(&payload[..len]);
            dst.put_u8(0);
        }
        Framing::Binary => {
            dst.reserve(LENGTH_PREFIX_SIZE + len);
            dst.put_u32_le(len as u32);
            dst.put_slice(&payload[..len]);
        }
    }
    len
}

/// Decode a binary length prefix, clamped to `max` so a corrupt prefix can
/// never cause a read past the region.
pub fn decode_length(prefix: [u8; LENGTH_PREFIX_SIZE], max: usize) -> usize {
    (u32::from_le_bytes(prefix) as usize).min(max)
}

/// Length of a text payload: bytes up to the first zero, or the whole region.
pub fn text_len(region: &[u8]) -> usize {
    region.iter().position(|b| *b == 0).unwrap_or(region.len())
}
