use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DictError, Result};
use crate::format;

/// Physical layout of an encoded dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// Header and trie body in one buffer, attributes inline.
    Blob,
    /// Trie file plus side tables for frequencies, bigrams and shortcuts.
    Split,
}

/// Encoding parameters shared by the encoder, decoder and updater.
///
/// Every width decision in the codec is driven by these three values rather
/// than by a per-version code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOptions {
    pub version: u16,
    pub supports_dynamic_update: bool,
    pub has_terminal_id: bool,
}

impl FormatOptions {
    pub fn new(version: u16, supports_dynamic_update: bool) -> Result<Self> {
        if !(format::MINIMUM_SUPPORTED_VERSION..=format::MAXIMUM_SUPPORTED_VERSION)
            .contains(&version)
        {
            return Err(DictError::UnsupportedFormat(format!(
                "requested version {version}, supported versions are {} through {}",
                format::MINIMUM_SUPPORTED_VERSION,
                format::MAXIMUM_SUPPORTED_VERSION
            )));
        }
        if supports_dynamic_update && version < format::FIRST_VERSION_WITH_DYNAMIC_UPDATE {
            return Err(DictError::InvalidInput(format!(
                "version {version} cannot carry dynamic update data"
            )));
        }
        Ok(Self {
            version,
            supports_dynamic_update,
            has_terminal_id: version >= format::FIRST_VERSION_WITH_TERMINAL_ID,
        })
    }

    /// Options as recorded in a file header. The dynamic bit is honoured only
    /// for versions that define it.
    pub(crate) fn from_header(version: u16, option_flags: u16) -> Self {
        Self {
            version,
            supports_dynamic_update: version >= format::FIRST_VERSION_WITH_DYNAMIC_UPDATE
                && option_flags & format::SUPPORTS_DYNAMIC_UPDATE != 0,
            has_terminal_id: version >= format::FIRST_VERSION_WITH_TERMINAL_ID,
        }
    }

    pub fn container(&self) -> ContainerKind {
        if self.has_terminal_id {
            ContainerKind::Split
        } else {
            ContainerKind::Blob
        }
    }

    /// Attribute lists are written inside the trie body.
    pub(crate) fn inline_attributes(&self) -> bool {
        self.version < format::FIRST_VERSION_WITH_TERMINAL_ID
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            version: format::FIRST_VERSION_WITH_DYNAMIC_UPDATE,
            supports_dynamic_update: false,
            has_terminal_id: false,
        }
    }
}

/// Dictionary-wide settings that travel in the file header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryOptions {
    pub attributes: BTreeMap<String, String>,
    pub german_umlaut_processing: bool,
    pub french_ligature_processing: bool,
}

impl DictionaryOptions {
    /// Options carrying the two mandatory header attributes.
    pub fn new(dictionary_id: &str, locale: &str) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(format::DICTIONARY_ID_KEY.to_string(), dictionary_id.to_string());
        attributes.insert(format::LOCALE_KEY.to_string(), locale.to_string());
        Self {
            attributes,
            ..Self::default()
        }
    }

    pub fn dictionary_id(&self) -> Option<&str> {
        self.attributes
            .get(format::DICTIONARY_ID_KEY)
            .map(String::as_str)
    }

    pub fn locale(&self) -> Option<&str> {
        self.attributes.get(format::LOCALE_KEY).map(String::as_str)
    }

    pub(crate) fn option_flags(&self) -> u16 {
        let mut flags = 0;
        if self.german_umlaut_processing {
            flags |= format::GERMAN_UMLAUT_PROCESSING_FLAG;
        }
        if self.french_ligature_processing {
            flags |= format::FRENCH_LIGATURE_PROCESSING_FLAG;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_versions_out_of_range() {
        assert!(matches!(
            FormatOptions::new(1, false),
            Err(DictError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            FormatOptions::new(5, false),
            Err(DictError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn dynamic_update_needs_version_three() {
        assert!(FormatOptions::new(2, true).is_err());
        let opts = FormatOptions::new(3, true).unwrap();
        assert!(opts.supports_dynamic_update);
        assert!(!opts.has_terminal_id);
        assert_eq!(opts.container(), ContainerKind::Blob);
    }

    #[test]
    fn version_four_uses_split_container() {
        let opts = FormatOptions::new(4, false).unwrap();
        assert!(opts.has_terminal_id);
        assert!(!opts.inline_attributes());
        assert_eq!(opts.container(), ContainerKind::Split);
    }

    #[test]
    fn header_flags_ignore_dynamic_bit_on_version_two() {
        let opts = FormatOptions::from_header(2, format::SUPPORTS_DYNAMIC_UPDATE);
        assert!(!opts.supports_dynamic_update);
    }
}
