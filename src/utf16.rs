//! UTF-16 to code point conversion for ID3 text frames
//!
//! Input is raw bytes as stored in the frame; a trailing odd byte is ignored.
//! Output holds one `u32` per code point, so it is never longer than the
//! number of input code units.

/// Byte-order mark, as read big-endian from the first code unit
const BOM: u16 = 0xFEFF;

fn is_surrogate(unit: u16) -> bool {
    (0xD800..=0xDFFF).contains(&unit)
}

fn decode_units<I>(mut units: I, out: &mut Vec<u32>) -> usize
where
    I: Iterator<Item = u16>,
{
    let start = out.len();
    while let Some(unit) = units.next() {
        if !is_surrogate(unit) {
            out.push(unit as u32);
            continue;
        }
        match units.next() {
            Some(low) => {
                out.push((((unit as u32 & 0x3FF) << 10) | (low as u32 & 0x3FF)) + 0x10000);
            }
            // unpaired surrogate at the end, kept as-is
            None => out.push(unit as u32),
        }
    }
    out.len() - start
}

/// Decode little-endian UTF-16, appending code points to `out`.
///
/// Returns the number of code points produced.
pub fn decode_le(bytes: &[u8], out: &mut Vec<u32>) -> usize {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    decode_units(units, out)
}

/// Decode big-endian UTF-16, appending code points to `out`.
///
/// Returns the number of code points produced.
pub fn decode_be(bytes: &[u8], out: &mut Vec<u32>) -> usize {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    decode_units(units, out)
}

/// Decode UTF-16 led by a byte-order mark.
///
/// A leading `FE FF` selects big-endian for the rest, anything else selects
/// little-endian. The first unit is consumed either way and never appears in
/// the output.
pub fn decode_bom(bytes: &[u8], out: &mut Vec<u32>) -> usize {
    if bytes.len() < 2 {
        return 0;
    }
    let rest = &bytes[2..];
    if u16::from_be_bytes([bytes[0], bytes[1]]) == BOM {
        decode_be(rest, out)
    } else {
        decode_le(rest, out)
    }
}

/// Convert decoded code points to a `String`, replacing invalid ones
pub fn to_string(code_points: &[u32]) -> String {
    code_points
        .iter()
        .map(|&cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
