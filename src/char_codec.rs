//! Character codec.
//!
//! Code points in `0x20..=0xFF` take one byte. Everything else takes three
//! bytes, big-endian, whose first byte is below `0x20`. The byte `0x1F` on
//! its own closes a character run.

use crate::buffer::ByteReader;
use crate::error::{DictError, Result};

pub const MINIMAL_ONE_BYTE_CHARACTER_VALUE: u32 = 0x20;
pub const MAXIMAL_ONE_BYTE_CHARACTER_VALUE: u32 = 0xFF;
pub const CHARACTERS_TERMINATOR: u8 = 0x1F;
pub const CHARACTERS_TERMINATOR_SIZE: usize = 1;

fn fits_on_one_byte(code_point: u32) -> bool {
    (MINIMAL_ONE_BYTE_CHARACTER_VALUE..=MAXIMAL_ONE_BYTE_CHARACTER_VALUE).contains(&code_point)
}

pub fn char_size(code_point: u32) -> usize {
    if fits_on_one_byte(code_point) {
        1
    } else {
        3
    }
}

/// Encoded size of a run of code points, terminator excluded.
pub fn chars_size(code_points: &[u32]) -> usize {
    code_points.iter().map(|&c| char_size(c)).sum()
}

/// Encoded size of a node's character run: the terminator is only present
/// when the run holds more than one character.
pub fn run_size(code_points: &[u32]) -> usize {
    let size = chars_size(code_points);
    if code_points.len() > 1 {
        size + CHARACTERS_TERMINATOR_SIZE
    } else {
        size
    }
}

/// Encoded size of a terminated string.
pub fn string_size(s: &str) -> usize {
    s.chars().map(|c| char_size(c as u32)).sum::<usize>() + CHARACTERS_TERMINATOR_SIZE
}

pub fn write_char(out: &mut Vec<u8>, code_point: u32) {
    if fits_on_one_byte(code_point) {
        out.push(code_point as u8);
    } else {
        out.push((code_point >> 16) as u8);
        out.push((code_point >> 8) as u8);
        out.push(code_point as u8);
    }
}

pub fn write_chars(out: &mut Vec<u8>, code_points: &[u32]) {
    for &c in code_points {
        write_char(out, c);
    }
}

/// Write a node's character run, terminated only when it is longer than one.
pub fn write_run(out: &mut Vec<u8>, code_points: &[u32]) {
    write_chars(out, code_points);
    if code_points.len() > 1 {
        out.push(CHARACTERS_TERMINATOR);
    }
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    for c in s.chars() {
        write_char(out, c as u32);
    }
    out.push(CHARACTERS_TERMINATOR);
}

/// Read one character, or `None` when the terminator is next.
pub fn read_char(reader: &mut ByteReader<'_>) -> Result<Option<u32>> {
    let first = reader.read_u8()?;
    if fits_on_one_byte(u32::from(first)) {
        return Ok(Some(u32::from(first)));
    }
    if first == CHARACTERS_TERMINATOR {
        return Ok(None);
    }
    let rest = u32::from(reader.read_u16()?);
    Ok(Some((u32::from(first) << 16) | rest))
}

/// Read a node's character run. Multi-character runs stop at the terminator
/// and are capped at `max_len` code points. Runs are never empty.
pub fn read_run(reader: &mut ByteReader<'_>, multiple: bool, max_len: usize) -> Result<Vec<u32>> {
    if !multiple {
        return match read_char(reader)? {
            Some(c) => Ok(vec![c]),
            None => Err(DictError::Malformed(format!(
                "empty character run at {}",
                reader.position() - 1
            ))),
        };
    }
    let mut chars = Vec::new();
    while let Some(c) = read_char(reader)? {
        if chars.len() >= max_len {
            return Err(DictError::Malformed(format!(
                "character run longer than {max_len} at {}",
                reader.position()
            )));
        }
        chars.push(c);
    }
    if chars.is_empty() {
        return Err(DictError::Malformed(format!(
            "empty character run ending at {}",
            reader.position()
        )));
    }
    Ok(chars)
}

pub fn read_string(reader: &mut ByteReader<'_>) -> Result<String> {
    let mut out = String::new();
    while let Some(c) = read_char(reader)? {
        out.push(to_char(c)?);
    }
    Ok(out)
}

pub fn to_char(code_point: u32) -> Result<char> {
    char::from_u32(code_point)
        .ok_or_else(|| DictError::Malformed(format!("invalid code point {code_point:#x}")))
}

pub fn code_points_to_string(code_points: &[u32]) -> Result<String> {
    code_points.iter().map(|&c| to_char(c)).collect()
}

pub fn code_points(s: &str) -> Vec<u32> {
    s.chars().map(|c| c as u32).collect()
}
