//! Wire constants for the binary dictionary format.
//!
//! A file is a header followed by a body of node arrays:
//!
//! ```text
//! header: [magic u32][version u16][options u16][header_size u32][attributes...]
//! array:  [count 1|2][node]*[forward link u24, dynamic only]
//! node:   [flags][parent s24, dynamic only][chars][freq u8 | terminal id u32]
//!         [children 0..3][shortcut list][bigram list]
//! ```
//!
//! Children, parent and bigram fields hold offsets relative to the field or
//! node that carries them. Forward links hold absolute file positions, with
//! zero meaning "end of chain".

pub const MAGIC_NUMBER: u32 = 0x9BC1_3AFE;

pub const MINIMUM_SUPPORTED_VERSION: u16 = 2;
pub const MAXIMUM_SUPPORTED_VERSION: u16 = 4;
pub const FIRST_VERSION_WITH_DYNAMIC_UPDATE: u16 = 3;
pub const FIRST_VERSION_WITH_TERMINAL_ID: u16 = 4;

// ---------------------------------------------------------------------------
// Header option flags

pub const GERMAN_UMLAUT_PROCESSING_FLAG: u16 = 0x1;
pub const SUPPORTS_DYNAMIC_UPDATE: u16 = 0x2;
pub const FRENCH_LIGATURE_PROCESSING_FLAG: u16 = 0x4;
pub const CONTAINS_BIGRAMS_FLAG: u16 = 0x8;

/// Magic (4) + version (2) + options (2) + header size (4).
pub const HEADER_FIXED_SIZE: usize = 12;

pub const DICTIONARY_ID_KEY: &str = "dictionary";
pub const LOCALE_KEY: &str = "locale";
pub const VERSION_KEY: &str = "version";
pub const DESCRIPTION_KEY: &str = "description";
pub const DATE_KEY: &str = "date";

// ---------------------------------------------------------------------------
// Node flags

pub const MASK_CHILDREN_ADDRESS_TYPE: u8 = 0xC0;
pub const FLAG_CHILDREN_ADDRESS_TYPE_NOADDRESS: u8 = 0x00;
pub const FLAG_CHILDREN_ADDRESS_TYPE_ONEBYTE: u8 = 0x40;
pub const FLAG_CHILDREN_ADDRESS_TYPE_TWOBYTES: u8 = 0x80;
pub const FLAG_CHILDREN_ADDRESS_TYPE_THREEBYTES: u8 = 0xC0;

// In the dynamic format the top two bits record relocation state instead of
// the children address width, which is always a signed 24 bit field there.
pub const MASK_MOVE_AND_DELETE_FLAG: u8 = 0xC0;
pub const FLAG_IS_MOVED: u8 = 0x40;
pub const FLAG_IS_NOT_MOVED: u8 = 0xC0;
pub const FLAG_IS_DELETED: u8 = 0x80;

pub const FLAG_HAS_MULTIPLE_CHARS: u8 = 0x20;
pub const FLAG_IS_TERMINAL: u8 = 0x10;
pub const FLAG_HAS_SHORTCUT_TARGETS: u8 = 0x08;
pub const FLAG_HAS_BIGRAMS: u8 = 0x04;
pub const FLAG_IS_NOT_A_WORD: u8 = 0x02;
pub const FLAG_IS_BLACKLISTED: u8 = 0x01;

// ---------------------------------------------------------------------------
// Attribute (shortcut and bigram) flags

pub const FLAG_ATTRIBUTE_HAS_NEXT: u8 = 0x80;
pub const FLAG_ATTRIBUTE_OFFSET_NEGATIVE: u8 = 0x40;
pub const MASK_ATTRIBUTE_ADDRESS_TYPE: u8 = 0x30;
pub const FLAG_ATTRIBUTE_ADDRESS_TYPE_ONEBYTE: u8 = 0x10;
pub const FLAG_ATTRIBUTE_ADDRESS_TYPE_TWOBYTES: u8 = 0x20;
pub const FLAG_ATTRIBUTE_ADDRESS_TYPE_THREEBYTES: u8 = 0x30;
pub const MASK_ATTRIBUTE_FREQUENCY: u8 = 0x0F;

// ---------------------------------------------------------------------------
// Field sizes

pub const NODE_FLAGS_SIZE: usize = 1;
pub const NODE_FREQUENCY_SIZE: usize = 1;
pub const NODE_TERMINAL_ID_SIZE: usize = 4;
pub const PARENT_ADDRESS_SIZE: usize = 3;
pub const FORWARD_LINK_ADDRESS_SIZE: usize = 3;
pub const SIGNED_CHILDREN_ADDRESS_SIZE: usize = 3;
pub const NODE_MAX_ADDRESS_SIZE: usize = 3;
pub const NODE_ATTRIBUTE_FLAGS_SIZE: usize = 1;
pub const NODE_ATTRIBUTE_MAX_ADDRESS_SIZE: usize = 3;
pub const SHORTCUT_LIST_SIZE_SIZE: usize = 2;

// ---------------------------------------------------------------------------
// Limits and sentinels

pub const NO_PARENT_ADDRESS: i32 = 0;
pub const NO_FORWARD_LINK_ADDRESS: i32 = 0;
pub const INVALID_CHARACTER: u32 = 0x1F;

pub const MAX_PTNODES_FOR_ONE_BYTE_PTNODE_COUNT: usize = 0x7F;
pub const MAX_PTNODES_IN_A_PT_NODE_ARRAY: usize = 0x7FFF;
pub const MAX_BIGRAMS_IN_A_PTNODE: usize = 10_000;
pub const MAX_SHORTCUT_LIST_SIZE_IN_A_PTNODE: usize = 0xFFFF;

pub const MAX_TERMINAL_FREQUENCY: u32 = 255;
pub const MAX_BIGRAM_FREQUENCY: u32 = 15;
pub const SHORTCUT_WHITELIST_FREQUENCY: u32 = 15;

/// Longest word, in code points, the format stores. Longer input is dropped.
pub const MAX_WORD_LENGTH: usize = 48;

/// Ceiling on compression passes before the layout is declared divergent.
pub const MAX_PASSES: usize = 24;
/// Ceiling on forward-link and moved-node hops. In-place updates append one
/// linked array per change, so chains grow with the update history.
pub const MAX_JUMPS: usize = 10_000;

// ---------------------------------------------------------------------------
// Split (version 4) container

pub const TRIE_EXTENSION: &str = ".trie";
pub const FREQ_EXTENSION: &str = ".freq";
pub const TERMINAL_ADDRESS_TABLE_EXTENSION: &str = ".tat";
pub const BIGRAM_EXTENSION: &str = ".bigram";
pub const SHORTCUT_EXTENSION: &str = ".shortcut";
pub const LOOKUP_TABLE_EXTENSION: &str = ".lookup";
pub const ADDRESS_TABLE_EXTENSION: &str = ".addr";
pub const CONTENT_EXTENSION: &str = ".content";
pub const BIGRAM_FREQ_CONTENT_ID: &str = "_freq";
pub const SHORTCUT_CONTENT_ID: &str = "_shortcut";

pub const BIGRAM_ADDRESS_TABLE_BLOCK_SIZE: usize = 4;
pub const SHORTCUT_ADDRESS_TABLE_BLOCK_SIZE: usize = 64;
pub const FREQUENCY_AND_FLAGS_SIZE: usize = 2;
pub const TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE: usize = 3;

/// Sentinel stored in sparse and dense side tables for absent entries.
pub const NOT_EXIST: i32 = -1;
