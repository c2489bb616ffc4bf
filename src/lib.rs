//! Compact binary dictionaries for on-device word prediction.
//!
//! A [`Dictionary`] is a Patricia trie of words with frequencies, shortcut
//! targets and bigram successors. [`encode`] lays it out as a single blob
//! (versions 2 and 3) and [`decode`] reads one back. Version 4 splits the
//! terminal data into side tables; see [`container`].

pub mod address;
pub mod bigram;
pub mod buffer;
pub mod char_codec;
pub mod combined;
pub mod compress;
pub mod config;
pub mod container;
pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod format;
pub mod header;
pub mod io_utils;
pub mod sparse_table;
pub mod stats;
pub mod updater;
pub mod word;

pub use config::{ContainerKind, DictionaryOptions, FormatOptions};
pub use container::{Encoded, SplitDictionary};
pub use decoder::{
    decode, decode_file_or_delete, is_valid_file, load_file, read_unigrams_and_bigrams,
    terminal_position, UnigramsAndBigrams,
};
pub use dictionary::{Dictionary, Entry, WeightedString};
pub use encoder::encode;
pub use error::{DictError, InvariantViolation, Result};
pub use header::{is_valid_format, read_header, FileHeader};
pub use updater::{delete_word, insert_word, lookup};
pub use word::Word;
