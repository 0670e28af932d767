//! Self-Delimiting Numeric Values: big-endian varints with seven data
//! bits per byte and the high bit as continuation flag.

use crate::error::CodecError;

/// Encoded length in bytes of `value` (1 to 10).
pub fn len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    usize::max(1, (bits + 6) / 7)
}

/// Writes `value` at `offset`, returning the offset past the last byte.
///
/// Minimal-length encoding: no redundant leading zero groups, and zero
/// itself is the single byte `0x00`.
pub fn write(buf: &mut [u8], offset: usize, value: u64) -> Result<usize, CodecError> {
    let needed = len(value);
    let end = match offset.checked_add(needed) {
        Some(end) if end <= buf.len() => end,
        _ => return Err(CodecError::BufferTooSmall("sdnv does not fit")),
    };

    for i in 0..needed {
        let shift = 7 * (needed - 1 - i);
        let mut byte = ((value >> shift) & 0x7f) as u8;
        if i + 1 < needed {
            byte |= 0x80;
        }
        buf[offset + i] = byte;
    }
    Ok(end)
}

/// Reads one value at `offset`, returning it with the offset past it.
pub fn read(buf: &[u8], offset: usize) -> Result<(u64, usize), CodecError> {
    let mut value: u64 = 0;
    let mut index = offset;
    loop {
        let byte = *buf
            .get(index)
            .ok_or(CodecError::Truncated("sdnv ends mid-integer"))?;
        if value >> 57 != 0 {
            return Err(CodecError::Overflow);
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        index += 1;
        if byte & 0x80 == 0 {
            return Ok((value, index));
        }
    }
}
