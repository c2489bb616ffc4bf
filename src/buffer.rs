//! Bounds-checked big-endian cursor over a byte slice.
//!
//! Every read past the end of the data is reported as
//! [`DictError::Malformed`] instead of panicking, so decoding arbitrary bytes
//! is always safe.

use crate::address;
use crate::error::{DictError, InvariantViolation, Result};

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                DictError::Malformed(format!(
                    "read of {n} bytes at {} runs past end of data ({} bytes)",
                    self.pos,
                    self.data.len()
                ))
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok((u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read an unsigned big-endian integer of `size` bytes (0..=4).
    pub fn read_uint(&mut self, size: usize) -> Result<u32> {
        let b = self.take(size)?;
        Ok(b.iter().fold(0u32, |acc, &x| (acc << 8) | u32::from(x)))
    }

    pub fn read_signed24(&mut self) -> Result<i32> {
        Ok(address::decode_signed24(self.read_u24()?))
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }
}

/// Resolve `base + offset` to a position inside a buffer of `len` bytes.
pub fn offset_position(base: usize, offset: i32, len: usize) -> Result<usize> {
    let target = base as i64 + i64::from(offset);
    if target < 0 || target as u64 >= len as u64 {
        return Err(DictError::Malformed(format!(
            "offset {offset} from {base} leaves the buffer ({len} bytes)"
        )));
    }
    Ok(target as usize)
}

/// In-place rewrites of an existing buffer. Every field is encoded and
/// bounds-checked when it is recorded; nothing touches the buffer until
/// [`Patches::apply`], which writes the three-byte fields first and the
/// single flag bytes last.
#[derive(Debug, Default)]
pub struct Patches {
    len: usize,
    fields: Vec<(usize, [u8; 3])>,
    flags: Vec<(usize, u8)>,
}

impl Patches {
    /// Patches for a buffer of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            ..Self::default()
        }
    }

    fn check(&self, pos: usize, width: usize) -> Result<()> {
        if pos.checked_add(width).map_or(true, |end| end > self.len) {
            return Err(DictError::Malformed(format!(
                "field at {pos} lies outside the buffer ({} bytes)",
                self.len
            )));
        }
        Ok(())
    }

    /// Signed 24 bit relative address at `pos`.
    pub fn signed24(&mut self, pos: usize, value: i32) -> Result<()> {
        self.check(pos, 3)?;
        self.fields.push((pos, address::encode_signed24(value)?));
        Ok(())
    }

    /// Unsigned 24 bit absolute address at `pos`.
    pub fn uint24(&mut self, pos: usize, value: usize) -> Result<()> {
        self.check(pos, 3)?;
        let value = u32::try_from(value)
            .ok()
            .filter(|v| *v <= address::UINT24_MAX)
            .ok_or(InvariantViolation::AddressSize(value as i64))?;
        self.fields.push((pos, [(value >> 16) as u8, (value >> 8) as u8, value as u8]));
        Ok(())
    }

    pub fn flag(&mut self, pos: usize, value: u8) -> Result<()> {
        self.check(pos, 1)?;
        self.flags.push((pos, value));
        Ok(())
    }

    /// Write every recorded field. `buf` must be at least as long as the
    /// buffer the patches were recorded against.
    pub fn apply(self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= self.len);
        for (pos, bytes) in self.fields {
            if let Some(slot) = buf.get_mut(pos..pos + 3) {
                slot.copy_from_slice(&bytes);
            }
        }
        for (pos, value) in self.flags {
            if let Some(slot) = buf.get_mut(pos) {
                *slot = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u24().unwrap(), 0x56789A);
        assert_eq!(r.position(), 5);
    }

    #[test]
    fn truncated_read_is_malformed() {
        let data = [0x01, 0x02];
        let mut r = ByteReader::new(&data);
        assert!(matches!(r.read_u24(), Err(DictError::Malformed(_))));
        // A failed read leaves the cursor untouched.
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn offset_position_bounds() {
        assert_eq!(offset_position(10, -4, 20).unwrap(), 6);
        assert!(offset_position(2, -4, 20).is_err());
        assert!(offset_position(10, 10, 20).is_err());
    }

    #[test]
    fn patches_apply_fields_then_flags() {
        let mut buf = vec![0u8; 8];
        let mut patches = Patches::new(buf.len());
        patches.flag(0, 0x40).unwrap();
        patches.signed24(1, -2).unwrap();
        patches.uint24(4, 0x80_0001).unwrap();
        patches.apply(&mut buf);
        assert_eq!(buf, vec![0x40, 0x80, 0, 2, 0x80, 0, 1, 0]);
    }

    #[test]
    fn patches_reject_before_touching_the_buffer() {
        let mut patches = Patches::new(5);
        assert!(patches.signed24(3, 1).is_err());
        assert!(patches.signed24(0, 0x80_0000).is_err());
        assert!(patches.uint24(0, 0x100_0000).is_err());
        assert!(patches.flag(5, 1).is_err());
        let mut buf = vec![7u8; 5];
        patches.apply(&mut buf);
        assert_eq!(buf, vec![7u8; 5]);
    }
}
