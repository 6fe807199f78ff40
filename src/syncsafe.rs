//! Sync-safe integers
//!
//! ID3v2 size fields pack a 28-bit value into four bytes, seven bits per
//! byte, most significant group first. The top bit of every byte is zero so
//! the field can never be mistaken for an MPEG sync word.

/// Largest value representable in a sync-safe field
pub const MAX: u32 = (1 << 28) - 1;

/// Decode a 4-byte sync-safe field. Only the low 7 bits of each byte count.
pub fn decode(bytes: [u8; 4]) -> u32 {
    ((bytes[0] as u32 & 0x7F) << 21)
        | ((bytes[1] as u32 & 0x7F) << 14)
        | ((bytes[2] as u32 & 0x7F) << 7)
        | (bytes[3] as u32 & 0x7F)
}

/// Encode a value as a 4-byte sync-safe field.
///
/// Bits above 28 are discarded; values past [`MAX`] do not round-trip.
pub fn encode(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}
