// Rust guideline compliant 2026-10-19

//! Confluent wire format: `0x00` magic byte, 4-byte big-endian schema id, payload.

/// Magic byte opening every framed payload.
pub const MAGIC: u8 = 0x00;

/// Size of the header (1 magic + 4 schema id).
pub const HEADER_SIZE: usize = 5;

/// Why a payload could not be unframed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// Fewer than [`HEADER_SIZE`] bytes.
    #[error("payload too short for wire header ({len} byte(s))")]
    TooShort {
        /// Actual payload length.
        len: usize,
    },
    /// First byte is not [`MAGIC`].
    #[error("unknown magic byte 0x{found:02x}")]
    BadMagic {
        /// Byte found instead.
        found: u8,
    },
}

/// Split a framed payload into its schema id and body.
///
/// # Errors
///
/// Returns [`HeaderError`] if the payload is too short or the magic byte is wrong.
pub fn split(data: &[u8]) -> Result<(u32, &[u8]), HeaderError> {
    if data.len() < HEADER_SIZE {
        return Err(HeaderError::TooShort { len: data.len() });
    }
    if data[0] != MAGIC {
        return Err(HeaderError::BadMagic { found: data[0] });
    }
    let id = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
    Ok((id, &data[HEADER_SIZE..]))
}

/// Prefix `body` with the header for `schema_id`.
#[must_use]
pub fn frame(schema_id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.push(MAGIC);
    out.extend_from_slice(&schema_id.to_be_bytes());
    out.extend_from_slice(body);
    out
}
