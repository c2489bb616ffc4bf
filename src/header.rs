//! File header codec.
//!
//! The header uses the following big-endian layout:
//!
//! ```text
//! [magic u32][version u16][options u16][header_size u32][key\x1F value\x1F]*
//! ```
//!
//! * **magic** – always [`MAGIC_NUMBER`].
//! * **options** – normalisation bits, the dynamic-update bit and the
//!   contains-bigrams bit.
//! * **header_size** – total header length including the magic number. The
//!   trie body starts right after it.
//! * **attributes** – codec-encoded key/value string pairs. The dictionary
//!   id and the locale are mandatory.

use crate::buffer::ByteReader;
use crate::char_codec;
use crate::config::{DictionaryOptions, FormatOptions};
use crate::error::{DictError, Result};
use crate::format::{
    self, CONTAINS_BIGRAMS_FLAG, DICTIONARY_ID_KEY, FRENCH_LIGATURE_PROCESSING_FLAG,
    GERMAN_UMLAUT_PROCESSING_FLAG, HEADER_FIXED_SIZE, LOCALE_KEY, MAGIC_NUMBER,
    SUPPORTS_DYNAMIC_UPDATE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Offset of the first body byte.
    pub header_size: usize,
    pub option_flags: u16,
    pub dictionary_options: DictionaryOptions,
    pub format_options: FormatOptions,
}

impl FileHeader {
    pub fn contains_bigrams(&self) -> bool {
        self.option_flags & CONTAINS_BIGRAMS_FLAG != 0
    }
}

/// Serialize a header. `has_bigrams` sets the contains-bigrams bit.
pub fn write_header(
    dictionary_options: &DictionaryOptions,
    format_options: &FormatOptions,
    has_bigrams: bool,
) -> Result<Vec<u8>> {
    let version = format_options.version;
    if !(format::MINIMUM_SUPPORTED_VERSION..=format::MAXIMUM_SUPPORTED_VERSION).contains(&version)
    {
        return Err(DictError::UnsupportedFormat(format!(
            "requested version {version}, supported versions are {} through {}",
            format::MINIMUM_SUPPORTED_VERSION,
            format::MAXIMUM_SUPPORTED_VERSION
        )));
    }
    let mut options = dictionary_options.option_flags();
    if has_bigrams {
        options |= CONTAINS_BIGRAMS_FLAG;
    }
    if format_options.supports_dynamic_update {
        options |= SUPPORTS_DYNAMIC_UPDATE;
    }

    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(&MAGIC_NUMBER.to_be_bytes());
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(&options.to_be_bytes());
    let size_offset = out.len();
    out.extend_from_slice(&[0; 4]);
    for (key, value) in &dictionary_options.attributes {
        char_codec::write_string(&mut out, key);
        char_codec::write_string(&mut out, value);
    }
    let size = u32::try_from(out.len())
        .map_err(|_| DictError::InvalidInput("header attributes too large".into()))?;
    out[size_offset..size_offset + 4].copy_from_slice(&size.to_be_bytes());
    Ok(out)
}

/// Magic and version only. `None` when the magic does not match.
fn read_version(reader: &mut ByteReader<'_>) -> Result<Option<u16>> {
    if reader.read_u32()? != MAGIC_NUMBER {
        return Ok(None);
    }
    Ok(Some(reader.read_u16()?))
}

fn check_version(version: Option<u16>) -> Result<u16> {
    match version {
        Some(v)
            if (format::MINIMUM_SUPPORTED_VERSION..=format::MAXIMUM_SUPPORTED_VERSION)
                .contains(&v) =>
        {
            Ok(v)
        }
        Some(v) => Err(DictError::UnsupportedFormat(format!(
            "file has version {v}, supported versions are {} through {}",
            format::MINIMUM_SUPPORTED_VERSION,
            format::MAXIMUM_SUPPORTED_VERSION
        ))),
        None => Err(DictError::UnsupportedFormat("bad magic number".into())),
    }
}

pub fn read_header(data: &[u8]) -> Result<FileHeader> {
    let mut reader = ByteReader::new(data);
    let version = check_version(read_version(&mut reader)?)?;
    let option_flags = reader.read_u16()?;
    let raw_size = reader.read_u32()? as i32;
    if raw_size < 0 {
        return Err(DictError::UnsupportedFormat(
            "header size can't be negative".into(),
        ));
    }
    let header_size = raw_size as usize;
    if header_size < HEADER_FIXED_SIZE || header_size > data.len() {
        return Err(DictError::Malformed(format!(
            "header size {header_size} outside 12..={}",
            data.len()
        )));
    }

    let mut attributes = std::collections::BTreeMap::new();
    // Bounded by the header so a runaway string cannot read the body.
    let mut attr_reader = ByteReader::at(&data[..header_size], HEADER_FIXED_SIZE);
    while attr_reader.position() < header_size {
        let key = char_codec::read_string(&mut attr_reader)?;
        let value = char_codec::read_string(&mut attr_reader)?;
        attributes.insert(key, value);
    }
    for key in [DICTIONARY_ID_KEY, LOCALE_KEY] {
        if !attributes.contains_key(key) {
            return Err(DictError::Malformed(format!(
                "missing mandatory header attribute \"{key}\""
            )));
        }
    }

    Ok(FileHeader {
        header_size,
        option_flags,
        dictionary_options: DictionaryOptions {
            attributes,
            german_umlaut_processing: option_flags & GERMAN_UMLAUT_PROCESSING_FLAG != 0,
            french_ligature_processing: option_flags & FRENCH_LIGATURE_PROCESSING_FLAG != 0,
        },
        format_options: FormatOptions::from_header(version, option_flags),
    })
}

/// Cheap check of magic number and version. Reads six bytes at most.
pub fn is_valid_format(data: &[u8]) -> bool {
    let mut reader = ByteReader::new(data);
    matches!(read_version(&mut reader), Ok(version) if check_version(version).is_ok())
}
