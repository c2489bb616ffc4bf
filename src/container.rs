//! Version 4 split container.
//!
//! The trie file stores a 4-byte terminal id on each terminal node instead
//! of inline data. Everything else is looked up by that id:
//!
//! ```text
//! <name>.trie                      header + trie body
//! <name>.freq                      [flags u8][frequency u8] per id
//! <name>.tat                       [body address u24] per id
//! <name>.bigram.lookup             sparse table, block size 4
//! <name>.bigram_freq.addr
//! <name>.bigram_freq.content       [flags u8][target id u24]*
//! <name>.shortcut.lookup           sparse table, block size 64
//! <name>.shortcut_shortcut.addr
//! <name>.shortcut_shortcut.content [flags u8][string]*
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::address::{self, UINT24_MAX};
use crate::bigram;
use crate::buffer::ByteReader;
use crate::char_codec;
use crate::config::{ContainerKind, FormatOptions};
use crate::decoder::{self, TerminalSource};
use crate::dictionary::{Dictionary, WeightedString};
use crate::encoder;
use crate::error::{DictError, InvariantViolation, Result};
use crate::format::{
    BIGRAM_ADDRESS_TABLE_BLOCK_SIZE, BIGRAM_EXTENSION, BIGRAM_FREQ_CONTENT_ID, CONTENT_EXTENSION,
    FLAG_ATTRIBUTE_HAS_NEXT, FLAG_IS_BLACKLISTED, FLAG_IS_NOT_A_WORD, FREQUENCY_AND_FLAGS_SIZE,
    FREQ_EXTENSION, MASK_ATTRIBUTE_FREQUENCY, MAX_BIGRAMS_IN_A_PTNODE, NOT_EXIST,
    SHORTCUT_ADDRESS_TABLE_BLOCK_SIZE, SHORTCUT_CONTENT_ID, SHORTCUT_EXTENSION,
    TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE, TERMINAL_ADDRESS_TABLE_EXTENSION, TRIE_EXTENSION,
};
use crate::header;
use crate::io_utils::io_error;
use crate::sparse_table::SparseTable;

/// Per-terminal data kept outside the trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideTables {
    frequencies: Vec<u8>,
    terminal_addresses: Vec<u8>,
    bigrams: SparseTable,
    bigram_content: Vec<u8>,
    shortcuts: SparseTable,
    shortcut_content: Vec<u8>,
}

impl SideTables {
    fn new() -> Result<Self> {
        Ok(Self {
            frequencies: Vec::new(),
            terminal_addresses: Vec::new(),
            bigrams: SparseTable::new(BIGRAM_ADDRESS_TABLE_BLOCK_SIZE, 1)?,
            bigram_content: Vec::new(),
            shortcuts: SparseTable::new(SHORTCUT_ADDRESS_TABLE_BLOCK_SIZE, 1)?,
            shortcut_content: Vec::new(),
        })
    }

    pub fn terminal_count(&self) -> usize {
        self.frequencies.len() / FREQUENCY_AND_FLAGS_SIZE
    }

    fn check_id(&self, id: u32) -> Result<usize> {
        let id = id as usize;
        if id >= self.terminal_count() {
            return Err(DictError::Malformed(format!(
                "terminal id {id} outside the {} entry frequency table",
                self.terminal_count()
            )));
        }
        Ok(id)
    }

    pub(crate) fn frequency(&self, id: u32) -> Result<u8> {
        let id = self.check_id(id)?;
        Ok(self.frequencies[id * FREQUENCY_AND_FLAGS_SIZE + 1])
    }

    /// Body address of the terminal node numbered `id`.
    pub(crate) fn terminal_address(&self, id: u32) -> Result<usize> {
        let id = self.check_id(id)?;
        let mut r = ByteReader::at(&self.terminal_addresses, id * TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE);
        Ok(r.read_u24()? as usize)
    }

    /// `(quantized frequency, target id)` pairs.
    pub(crate) fn bigrams(&self, id: u32) -> Result<Vec<(u8, u32)>> {
        let offset = self.bigrams.get(0, id);
        if offset == NOT_EXIST {
            return Ok(Vec::new());
        }
        let mut r = ByteReader::at(&self.bigram_content, offset as usize);
        let mut out = Vec::new();
        for _ in 0..MAX_BIGRAMS_IN_A_PTNODE {
            let flags = r.read_u8()?;
            out.push((flags & MASK_ATTRIBUTE_FREQUENCY, r.read_u24()?));
            if flags & FLAG_ATTRIBUTE_HAS_NEXT == 0 {
                return Ok(out);
            }
        }
        Err(DictError::Malformed(format!("bigram list of terminal {id} has no end")))
    }

    pub(crate) fn shortcuts(&self, id: u32) -> Result<Vec<WeightedString>> {
        let offset = self.shortcuts.get(0, id);
        if offset == NOT_EXIST {
            return Ok(Vec::new());
        }
        let mut r = ByteReader::at(&self.shortcut_content, offset as usize);
        let mut out = Vec::new();
        loop {
            let flags = r.read_u8()?;
            let word = char_codec::read_string(&mut r)?;
            out.push(WeightedString::new(word, u32::from(flags & MASK_ATTRIBUTE_FREQUENCY)));
            if flags & FLAG_ATTRIBUTE_HAS_NEXT == 0 {
                return Ok(out);
            }
        }
    }
}

/// A version 4 dictionary in memory, one buffer per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDictionary {
    pub trie: Vec<u8>,
    pub tables: SideTables,
}

/// Output of [`encode`], shaped by the container kind of the version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Blob(Vec<u8>),
    Split(SplitDictionary),
}

pub fn encode(dict: &Dictionary, options: &FormatOptions) -> Result<Encoded> {
    match options.container() {
        ContainerKind::Blob => encoder::encode(dict, options).map(Encoded::Blob),
        ContainerKind::Split => encode_split(dict, options).map(Encoded::Split),
    }
}

pub fn encode_split(dict: &Dictionary, options: &FormatOptions) -> Result<SplitDictionary> {
    if options.container() != ContainerKind::Split {
        return Err(DictError::InvalidInput(format!(
            "version {} is not a split container",
            options.version
        )));
    }
    let mut trie = header::write_header(&dict.options, options, dict.has_bigrams())?;
    let (body, layout) = encoder::encode_body(dict, options)?;
    trie.extend_from_slice(&body);

    let count = layout.terminal_count();
    let mut tables = SideTables::new()?;
    tables.frequencies = vec![0; count * FREQUENCY_AND_FLAGS_SIZE];
    tables.terminal_addresses = vec![0; count * TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE];

    for &array in layout.order() {
        for &id in dict.array(array).nodes() {
            let Some(terminal) = layout.terminal_id(id) else {
                continue;
            };
            let node = dict.node(id);
            let slot = terminal as usize;

            let mut flags = 0;
            if node.is_not_a_word() {
                flags |= FLAG_IS_NOT_A_WORD;
            }
            if node.is_blacklisted() {
                flags |= FLAG_IS_BLACKLISTED;
            }
            tables.frequencies[slot * FREQUENCY_AND_FLAGS_SIZE] = flags;
            tables.frequencies[slot * FREQUENCY_AND_FLAGS_SIZE + 1] = node.frequency().unwrap_or(0);

            let position = layout.node_placement(id).address_after_update;
            if position as u32 > UINT24_MAX {
                return Err(InvariantViolation::AddressSize(position as i64).into());
            }
            let mut entry = Vec::with_capacity(TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE);
            address::write_uint(&mut entry, position as u32, TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE);
            let at = slot * TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE;
            tables.terminal_addresses[at..at + TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE].copy_from_slice(&entry);

            if !node.bigrams().is_empty() {
                tables
                    .bigrams
                    .set(0, terminal, tables.bigram_content.len() as i32)?;
                for (i, b) in node.bigrams().iter().enumerate() {
                    let target = dict
                        .find_word(&b.word)
                        .ok_or_else(|| InvariantViolation::UnplacedBigramTarget(b.word.clone()))?;
                    let target_id = layout
                        .terminal_id(target)
                        .ok_or(InvariantViolation::MissingTerminalId(target.0))?;
                    let unigram = dict.node(target).frequency().map_or(0, u32::from);
                    let mut flags = bigram::quantize(unigram, b.frequency, &b.word);
                    if i + 1 < node.bigrams().len() {
                        flags |= FLAG_ATTRIBUTE_HAS_NEXT;
                    }
                    tables.bigram_content.push(flags);
                    address::write_uint(&mut tables.bigram_content, target_id, 3);
                }
            }

            if !node.shortcuts().is_empty() {
                tables
                    .shortcuts
                    .set(0, terminal, tables.shortcut_content.len() as i32)?;
                for (i, s) in node.shortcuts().iter().enumerate() {
                    let mut flags = encoder::shortcut_frequency(s.frequency);
                    if i + 1 < node.shortcuts().len() {
                        flags |= FLAG_ATTRIBUTE_HAS_NEXT;
                    }
                    tables.shortcut_content.push(flags);
                    char_codec::write_string(&mut tables.shortcut_content, &s.word);
                }
            }
        }
    }
    info!("split dictionary with {count} terminals");
    Ok(SplitDictionary { trie, tables })
}

pub fn decode_split(split: &SplitDictionary) -> Result<Dictionary> {
    let header = header::read_header(&split.trie)?;
    if header.format_options.container() != ContainerKind::Split {
        return Err(DictError::UnsupportedFormat(format!(
            "version {} trie files are not split",
            header.format_options.version
        )));
    }
    decoder::decode_with(&split.trie, &header, TerminalSource::Split(&split.tables))
}

// ---------------------------------------------------------------------------
// Files

fn path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{name}{extension}"))
}

fn write(path: PathBuf, bytes: &[u8]) -> Result<()> {
    fs::write(&path, bytes).map_err(|e| io_error("writing", &path, e).into())
}

fn read(path: PathBuf) -> Result<Vec<u8>> {
    fs::read(&path).map_err(|e| io_error("reading", &path, e).into())
}

/// Write every file of `split` into `dir`, which is created if missing.
pub fn write_dir(split: &SplitDictionary, dir: &Path, name: &str) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| io_error("creating", dir, e))?;
    let t = &split.tables;
    write(path(dir, name, TRIE_EXTENSION), &split.trie)?;
    write(path(dir, name, FREQ_EXTENSION), &t.frequencies)?;
    write(path(dir, name, TERMINAL_ADDRESS_TABLE_EXTENSION), &t.terminal_addresses)?;

    let bigram_name = format!("{name}{BIGRAM_EXTENSION}");
    t.bigrams.write(dir, &bigram_name, &[BIGRAM_FREQ_CONTENT_ID])?;
    write(
        path(dir, &bigram_name, &format!("{BIGRAM_FREQ_CONTENT_ID}{CONTENT_EXTENSION}")),
        &t.bigram_content,
    )?;

    let shortcut_name = format!("{name}{SHORTCUT_EXTENSION}");
    t.shortcuts.write(dir, &shortcut_name, &[SHORTCUT_CONTENT_ID])?;
    write(
        path(dir, &shortcut_name, &format!("{SHORTCUT_CONTENT_ID}{CONTENT_EXTENSION}")),
        &t.shortcut_content,
    )?;
    Ok(())
}

pub fn read_dir(dir: &Path, name: &str) -> Result<SplitDictionary> {
    let trie = read(path(dir, name, TRIE_EXTENSION))?;
    let frequencies = read(path(dir, name, FREQ_EXTENSION))?;
    let terminal_addresses = read(path(dir, name, TERMINAL_ADDRESS_TABLE_EXTENSION))?;
    if frequencies.len() % FREQUENCY_AND_FLAGS_SIZE != 0
        || terminal_addresses.len() / TERMINAL_ADDRESS_TABLE_ADDRESS_SIZE
            != frequencies.len() / FREQUENCY_AND_FLAGS_SIZE
    {
        return Err(DictError::Malformed(format!(
            "{name}: frequency and terminal address tables disagree"
        )));
    }

    let bigram_name = format!("{name}{BIGRAM_EXTENSION}");
    let bigrams = SparseTable::read(
        dir,
        &bigram_name,
        &[BIGRAM_FREQ_CONTENT_ID],
        BIGRAM_ADDRESS_TABLE_BLOCK_SIZE,
    )?;
    let bigram_content = read(path(
        dir,
        &bigram_name,
        &format!("{BIGRAM_FREQ_CONTENT_ID}{CONTENT_EXTENSION}"),
    ))?;

    let shortcut_name = format!("{name}{SHORTCUT_EXTENSION}");
    let shortcuts = SparseTable::read(
        dir,
        &shortcut_name,
        &[SHORTCUT_CONTENT_ID],
        SHORTCUT_ADDRESS_TABLE_BLOCK_SIZE,
    )?;
    let shortcut_content = read(path(
        dir,
        &shortcut_name,
        &format!("{SHORTCUT_CONTENT_ID}{CONTENT_EXTENSION}"),
    ))?;

    Ok(SplitDictionary {
        trie,
        tables: SideTables {
            frequencies,
            terminal_addresses,
            bigrams,
            bigram_content,
            shortcuts,
            shortcut_content,
        },
    })
}

/// Read and decode a split dictionary directory.
pub fn load_dir(dir: &Path, name: &str) -> Result<Dictionary> {
    decode_split(&read_dir(dir, name)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DictionaryOptions;

    fn sample() -> Dictionary {
        let mut d = Dictionary::new(DictionaryOptions::new("split", "fr"));
        for (w, f) in [("chat", 120), ("chien", 110), ("chaton", 40), ("oiseau", 60)] {
            d.add(w, f, &[], false).unwrap();
        }
        d.add("stp", 10, &[WeightedString::new("s'il te pla\u{ee}t", 14)], true)
            .unwrap();
        d.set_bigram("chat", "chien", 200).unwrap();
        d.set_bigram("chat", "oiseau", 150).unwrap();
        d
    }

    #[test]
    fn split_roundtrip_in_memory() {
        let d = sample();
        let opts = FormatOptions::new(4, false).unwrap();
        let split = encode_split(&d, &opts).unwrap();
        assert_eq!(split.tables.terminal_count(), 5);
        let back = decode_split(&split).unwrap();
        let words: Vec<_> = back.words().map(|w| (w.word, w.frequency)).collect();
        let expected: Vec<_> = d.words().map(|w| (w.word, w.frequency)).collect();
        assert_eq!(words, expected);

        let chat = back.node(back.find_word("chat").unwrap());
        let targets: Vec<&str> = chat.bigrams().iter().map(|b| b.word.as_str()).collect();
        assert_eq!(targets, vec!["chien", "oiseau"]);
        let stp = back.node(back.find_word("stp").unwrap());
        assert!(stp.is_not_a_word());
        assert_eq!(stp.shortcuts()[0].word, "s'il te pla\u{ee}t");
    }

    #[test]
    fn split_roundtrip_through_files() {
        let d = sample();
        let dir = tempfile::tempdir().unwrap();
        let split = encode_split(&d, &FormatOptions::new(4, false).unwrap()).unwrap();
        write_dir(&split, dir.path(), "main").unwrap();
        for file in [
            "main.trie",
            "main.freq",
            "main.tat",
            "main.bigram.lookup",
            "main.bigram_freq.addr",
            "main.bigram_freq.content",
            "main.shortcut.lookup",
            "main.shortcut_shortcut.addr",
            "main.shortcut_shortcut.content",
        ] {
            assert!(dir.path().join(file).exists(), "{file}");
        }
        assert_eq!(read_dir(dir.path(), "main").unwrap(), split);
        assert_eq!(load_dir(dir.path(), "main").unwrap().words().count(), 5);
    }

    #[test]
    fn extra_address_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let split = encode_split(&sample(), &FormatOptions::new(4, false).unwrap()).unwrap();
        write_dir(&split, dir.path(), "main").unwrap();
        fs::write(dir.path().join("main.bigram_other.addr"), []).unwrap();
        assert!(matches!(
            read_dir(dir.path(), "main"),
            Err(DictError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn encode_dispatches_on_container() {
        let d = sample();
        assert!(matches!(
            encode(&d, &FormatOptions::new(3, false).unwrap()).unwrap(),
            Encoded::Blob(_)
        ));
        assert!(matches!(
            encode(&d, &FormatOptions::new(4, false).unwrap()).unwrap(),
            Encoded::Split(_)
        ));
        assert!(encode_split(&d, &FormatOptions::default()).is_err());
    }

    #[test]
    fn blob_trie_is_not_a_split_dictionary() {
        let d = sample();
        let split = SplitDictionary {
            trie: encoder::encode(&d, &FormatOptions::default()).unwrap(),
            tables: SideTables::new().unwrap(),
        };
        assert!(matches!(decode_split(&split), Err(DictError::UnsupportedFormat(_))));
    }
}
