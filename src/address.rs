//! Variable-width address codec.
//!
//! Unsigned addresses take 0 to 3 big-endian bytes depending on their
//! magnitude; the width class travels separately in a flags byte. The
//! signed form is always three bytes with the sign in the top bit:
//!
//! ```text
//! [s mmmmmmm][mmmmmmmm][mmmmmmmm]   s = 1 for negative, m = |value|
//! ```

use crate::error::InvariantViolation;

pub const UINT8_MAX: u32 = 0xFF;
pub const UINT16_MAX: u32 = 0xFFFF;
pub const UINT24_MAX: u32 = 0xFF_FFFF;
pub const SINT24_MAX: u32 = 0x7F_FFFF;
pub const MSB8: u8 = 0x80;
pub const MSB24: u32 = 0x80_0000;

/// Bytes needed to store `address`, sign excluded. Zero stands for "no
/// address" and needs no bytes.
pub fn byte_size(address: i32) -> usize {
    let magnitude = address.unsigned_abs();
    if magnitude == 0 {
        0
    } else if magnitude <= UINT8_MAX {
        1
    } else if magnitude <= UINT16_MAX {
        2
    } else {
        3
    }
}

/// Like [`byte_size`] but rejects magnitudes that cannot be written at all.
pub fn checked_byte_size(address: i32) -> Result<usize, InvariantViolation> {
    if address.unsigned_abs() > UINT24_MAX {
        return Err(InvariantViolation::AddressSize(i64::from(address)));
    }
    Ok(byte_size(address))
}

/// Append the low `size` bytes of `value`, most significant first.
pub fn write_uint(out: &mut Vec<u8>, value: u32, size: usize) {
    for shift in (0..size).rev() {
        out.push((value >> (8 * shift)) as u8);
    }
}

/// Append `|address|` in exactly the width [`byte_size`] reports.
pub fn write_variable(out: &mut Vec<u8>, address: i32) -> Result<usize, InvariantViolation> {
    let size = checked_byte_size(address)?;
    write_uint(out, address.unsigned_abs(), size);
    Ok(size)
}

pub fn encode_signed24(value: i32) -> Result<[u8; 3], InvariantViolation> {
    let magnitude = value.unsigned_abs();
    if magnitude > SINT24_MAX {
        return Err(InvariantViolation::AddressSize(i64::from(value)));
    }
    let sign = if value < 0 { MSB8 } else { 0 };
    Ok([
        sign | (magnitude >> 16) as u8,
        (magnitude >> 8) as u8,
        magnitude as u8,
    ])
}

pub fn decode_signed24(raw: u32) -> i32 {
    let magnitude = (raw & SINT24_MAX) as i32;
    if raw & MSB24 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

pub fn write_signed24(out: &mut Vec<u8>, value: i32) -> Result<usize, InvariantViolation> {
    out.extend_from_slice(&encode_signed24(value)?);
    Ok(3)
}
